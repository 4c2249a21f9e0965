//! # Chat Relay Library
//!
//! A real-time chat backend: direct and group messaging over a WebSocket
//! gateway, with PostgreSQL-backed conversation and message persistence.
//!
//! ## Architecture
//!
//! The crate follows Clean Architecture principles:
//!
//! - **Domain Layer**: Core entities, repository traits, and the external
//!   collaborator capabilities the core consumes
//! - **Application Layer**: Persistence orchestration and pagination
//! - **Infrastructure Layer**: PostgreSQL repositories and JWT verification
//! - **Presentation Layer**: The WebSocket gateway and a thin HTTP surface
//!
//! ## Module Structure
//!
//! ```text
//! chat_relay/
//! +-- config/         Configuration management
//! +-- domain/         Entities, repository and collaborator traits
//! +-- application/    Chat service (append, find-or-create, pagination)
//! +-- infrastructure/ Database and auth implementations
//! +-- presentation/   HTTP routes and the WebSocket gateway
//! +-- shared/         Common utilities (errors, snowflake IDs)
//! ```

// Configuration module
pub mod config;

// Domain layer - Core business logic
pub mod domain;

// Application layer - Business services
pub mod application;

// Infrastructure layer - External implementations
pub mod infrastructure;

// Presentation layer - HTTP and WebSocket handlers
pub mod presentation;

// Shared utilities
pub mod shared;

// Application startup and state management
pub mod startup;

// Telemetry and observability
pub mod telemetry;
