//! Presentation Layer
//!
//! HTTP routes and the WebSocket gateway.

pub mod http;
pub mod ws;
