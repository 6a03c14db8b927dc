//! HS256 token minting and validation.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use thiserror::Error;

use crate::claims::{Claims, TokenValidationError, validate_claims};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JwtError {
    /// Signature mismatch, malformed token, or undecodable claims.
    #[error("token is malformed or its signature is invalid")]
    Invalid,
    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Validates a bearer token into [`Claims`].
///
/// Trait object so the HTTP middleware can be tested with a stub and the
/// binary wired with [`Hs256JwtValidator`].
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError>;
}

/// Symmetric HS256 validator backed by a shared firm secret.
pub struct Hs256JwtValidator {
    decoding: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: &str) -> Self {
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, JwtError> {
        // Claims carry a chrono validity window instead of numeric exp/iat,
        // so the library's registered-claim checks are disabled and
        // validate_claims owns the time window.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &validation)
            .map_err(|_| JwtError::Invalid)?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

/// Sign `claims` into a compact HS256 token.
pub fn mint_token(secret: &str, claims: &Claims) -> Result<String, JwtError> {
    jsonwebtoken::encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| JwtError::Invalid)
}
