//! Credential re-authentication before destructive operations.
//!
//! A valid session is not enough to close an account: the principal must
//! present its credential again, and only then is a [`DeletionProof`] issued.
//! The proof is bound to one principal, expires quickly and is consumed by
//! value, so it can be used at most once.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use siteforge_core::PrincipalId;

use crate::Principal;

/// A credential supplied by the user. `Debug` never prints the value.
#[derive(Clone)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Debug for Secret {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("Secret(***)")
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthServiceError {
    #[error("wrong credential")]
    WrongCredential,

    #[error("too many attempts")]
    RateLimited,

    #[error("principal not found")]
    NotFound,

    #[error("authentication service unavailable: {0}")]
    Unavailable(String),
}

/// The external authentication provider.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Check a freshly supplied credential for `principal`.
    async fn reauthenticate(&self, principal: &Principal, secret: &Secret) -> Result<(), AuthServiceError>;

    /// Remove the principal from the provider.
    async fn delete_principal(&self, principal: &PrincipalId) -> Result<(), AuthServiceError>;
}

#[async_trait]
impl<A> AuthService for std::sync::Arc<A>
where
    A: AuthService + ?Sized,
{
    async fn reauthenticate(&self, principal: &Principal, secret: &Secret) -> Result<(), AuthServiceError> {
        (**self).reauthenticate(principal, secret).await
    }

    async fn delete_principal(&self, principal: &PrincipalId) -> Result<(), AuthServiceError> {
        (**self).delete_principal(principal).await
    }
}

/// Why re-authentication did not produce a proof.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReauthError {
    #[error("wrong credential")]
    WrongCredential,

    #[error("too many attempts, retry later")]
    RateLimited,

    #[error("re-authentication failed: {0}")]
    Other(String),
}

impl ReauthError {
    /// Whether the caller should keep the destructive action pending and let
    /// the user try again. Rate limiting and provider failures abort the flow.
    pub fn keeps_action_pending(&self) -> bool {
        matches!(self, ReauthError::WrongCredential)
    }
}

impl From<AuthServiceError> for ReauthError {
    fn from(value: AuthServiceError) -> Self {
        match value {
            // An unknown principal cannot prove a credential; do not reveal which.
            AuthServiceError::WrongCredential | AuthServiceError::NotFound => ReauthError::WrongCredential,
            AuthServiceError::RateLimited => ReauthError::RateLimited,
            AuthServiceError::Unavailable(msg) => ReauthError::Other(msg),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProofError {
    #[error("proof expired")]
    Expired,

    #[error("proof was issued for a different principal")]
    PrincipalMismatch,
}

/// Short-lived, single-use capability authorizing account deletion.
///
/// Not `Clone`: redeeming it moves it.
#[derive(Debug)]
pub struct DeletionProof {
    proof_id: Uuid,
    principal_id: PrincipalId,
    issued_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl DeletionProof {
    pub fn proof_id(&self) -> Uuid {
        self.proof_id
    }

    pub fn principal_id(&self) -> &PrincipalId {
        &self.principal_id
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.expires_at
    }

    /// Consume the proof for `principal` at `now`.
    pub fn redeem(self, principal: &PrincipalId, now: DateTime<Utc>) -> Result<Uuid, ProofError> {
        if &self.principal_id != principal {
            return Err(ProofError::PrincipalMismatch);
        }
        if now >= self.expires_at {
            return Err(ProofError::Expired);
        }
        Ok(self.proof_id)
    }
}

pub const DEFAULT_PROOF_TTL_SECS: i64 = 300;

/// Issues [`DeletionProof`]s after a successful credential check.
pub struct CredentialReauthGate<A> {
    auth: A,
    proof_ttl: Duration,
}

impl<A: AuthService> CredentialReauthGate<A> {
    pub fn new(auth: A) -> Self {
        Self {
            auth,
            proof_ttl: Duration::seconds(DEFAULT_PROOF_TTL_SECS),
        }
    }

    pub fn with_proof_ttl(mut self, ttl: Duration) -> Self {
        self.proof_ttl = ttl;
        self
    }

    pub fn auth_service(&self) -> &A {
        &self.auth
    }

    pub async fn reauthenticate(&self, principal: &Principal, secret: &Secret) -> Result<DeletionProof, ReauthError> {
        if let Err(e) = self.auth.reauthenticate(principal, secret).await {
            let err = ReauthError::from(e);
            warn!(principal_id = %principal.id, error = %err, "re-authentication refused");
            return Err(err);
        }

        let issued_at = Utc::now();
        let proof = DeletionProof {
            proof_id: Uuid::now_v7(),
            principal_id: principal.id.clone(),
            issued_at,
            expires_at: issued_at + self.proof_ttl,
        };
        info!(principal_id = %principal.id, proof_id = %proof.proof_id, "deletion proof issued");
        Ok(proof)
    }
}
