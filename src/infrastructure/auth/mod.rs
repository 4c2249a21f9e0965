//! JWT Identity Verifier
//!
//! Token issuance lives elsewhere; this only implements the "verify token
//! -> identity" capability the core consumes.

use async_trait::async_trait;
use jsonwebtoken::{decode, DecodingKey, Validation};

use crate::domain::IdentityVerifier;
use crate::shared::error::AppError;

/// JWT claims carried by access tokens
#[derive(Debug, serde::Deserialize)]
struct Claims {
    sub: String,
    #[allow(dead_code)]
    exp: usize,
}

/// JWT-backed identity verifier.
pub struct JwtVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
        }
    }
}

#[async_trait]
impl IdentityVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<i64, AppError> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| AppError::Authentication(format!("Invalid token: {}", e)))?;

        data.claims
            .sub
            .parse::<i64>()
            .map_err(|_| AppError::Authentication("Invalid user ID in token".into()))
    }
}
