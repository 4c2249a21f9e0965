//! Infrastructure Layer
//!
//! PostgreSQL repositories, the connection pool, and the JWT identity
//! verifier.

pub mod auth;
pub mod database;
pub mod repositories;

pub use auth::JwtVerifier;
