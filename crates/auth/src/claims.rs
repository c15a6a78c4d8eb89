use std::collections::HashSet;

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use siteforge_core::PrincipalId;

use crate::Principal;

/// Session token claims (transport-agnostic).
///
/// This is the minimal set of claims expected once a session token has been
/// issued by the authentication provider's token exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject / principal identifier.
    pub sub: PrincipalId,

    pub email: String,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration, seconds since the Unix epoch.
    pub exp: i64,
}

impl SessionClaims {
    pub fn new(principal: &Principal, issued_at: DateTime<Utc>, expires_at: DateTime<Utc>) -> Self {
        Self {
            sub: principal.id.clone(),
            email: principal.email.clone(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        }
    }

    pub fn principal(&self) -> Principal {
        Principal::new(self.sub.clone(), self.email.clone())
    }

    fn instant(secs: i64) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(secs, 0).single()
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("malformed or unsigned token: {0}")]
    Malformed(String),

    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (issued_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= issued_at)")]
    InvalidTimeWindow,
}

/// Deterministically validate session claims against `now`.
///
/// Signature verification / decoding happens before this, in the validator.
pub fn validate_claims(claims: &SessionClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let (Some(issued_at), Some(expires_at)) = (SessionClaims::instant(claims.iat), SessionClaims::instant(claims.exp))
    else {
        return Err(TokenValidationError::InvalidTimeWindow);
    };
    if expires_at <= issued_at {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < issued_at {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= expires_at {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// Turns a bearer token into validated claims.
pub trait SessionValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenValidationError>;
}

/// HS256 session tokens with a shared secret.
pub struct Hs256SessionValidator {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl Hs256SessionValidator {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign claims (dev tooling and tests; production tokens come from the
    /// provider's token exchange).
    pub fn issue(&self, claims: &SessionClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.encoding)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

impl SessionValidator for Hs256SessionValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<SessionClaims, TokenValidationError> {
        // Time checks run against the caller's clock in `validate_claims`.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::new();

        let data = jsonwebtoken::decode::<SessionClaims>(token, &self.decoding, &validation)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}
