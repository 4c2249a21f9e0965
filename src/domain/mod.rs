//! # Domain Layer
//!
//! Core business entities of the chat backend and the traits the rest of
//! the system programs against. No dependencies on infrastructure or
//! presentation layers; repository traits define the data access contracts
//! and collaborator traits type the external capabilities the core consumes.

pub mod collaborators;
pub mod entities;

pub use collaborators::{IdentityVerifier, MembershipStore};
pub use entities::*;
