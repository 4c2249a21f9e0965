//! Application Startup
//!
//! Application building and server initialization.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::http::HeaderValue;
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::application::{ChatService, ChatServiceImpl};
use crate::config::Settings;
use crate::domain::{IdentityVerifier, MembershipStore};
use crate::infrastructure::repositories::{
    PgConversationRepository, PgMembershipStore, PgMessageRepository,
};
use crate::infrastructure::{database, JwtVerifier};
use crate::presentation::http::routes;
use crate::presentation::ws::{ConnectionRegistry, Dispatcher, RoomManager};
use crate::shared::snowflake::SnowflakeGenerator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub dispatcher: Arc<Dispatcher>,
    pub chat: Arc<dyn ChatService>,
    pub verifier: Arc<dyn IdentityVerifier>,
    pub settings: Arc<Settings>,
}

/// Application instance
pub struct Application {
    listener: TcpListener,
    router: Router,
}

impl Application {
    /// Build the application from settings
    pub async fn build(settings: Settings) -> Result<Self> {
        // Create database pool
        let db = database::create_pool(&settings.database).await?;
        tracing::info!("Database connection pool created");

        // Create snowflake generator
        let snowflake = Arc::new(SnowflakeGenerator::new(settings.snowflake.machine_id as u64));

        // Repositories and collaborators
        let messages = Arc::new(PgMessageRepository::new(db.clone()));
        let conversations = Arc::new(PgConversationRepository::new(db.clone()));
        let membership = Arc::new(PgMembershipStore::new(db.clone()));
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(&settings.jwt.secret));

        let chat: Arc<dyn ChatService> = Arc::new(ChatServiceImpl::new(
            messages,
            conversations,
            Arc::clone(&membership),
            snowflake,
        ));

        // Real-time core
        let dispatcher = Arc::new(Dispatcher::new(
            Arc::new(ConnectionRegistry::new()),
            Arc::new(RoomManager::new()),
            Arc::clone(&chat),
            membership as Arc<dyn MembershipStore>,
            Arc::clone(&verifier),
        ));

        // Create app state
        let state = AppState {
            db,
            dispatcher,
            chat,
            verifier,
            settings: Arc::new(settings.clone()),
        };

        // Build router with middleware
        let router = routes::create_router(state)
            .layer(TraceLayer::new_for_http())
            .layer(build_cors_layer(&settings));

        // Bind to address
        let addr = SocketAddr::from(([0, 0, 0, 0], settings.server.port));
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Listening on {}", addr);

        Ok(Self { listener, router })
    }

    /// Run the server until stopped
    pub async fn run_until_stopped(self) -> Result<()> {
        axum::serve(self.listener, self.router).await?;
        Ok(())
    }

    /// Get the bound address
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }
}

fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<HeaderValue> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
