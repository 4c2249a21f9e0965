//! # Application Layer
//!
//! Services orchestrating domain repositories on behalf of the
//! presentation layer.

pub mod services;

pub use services::*;
