//! Thin HTTP surface: health check, gateway upgrade, history retrieval.

pub mod handlers;
pub mod routes;
