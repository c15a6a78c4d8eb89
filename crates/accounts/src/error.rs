//! Account deletion error taxonomy.
//!
//! Credential and proof errors abort before any mutation and are returned as
//! `Err`. Everything else is recorded per item inside the `DeletionResult` and
//! never stops the run.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use siteforge_auth::{ProofError, ReauthError};

#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AccountError {
    #[error("wrong credential")]
    WrongCredential,

    #[error("too many attempts, retry later")]
    RateLimited,

    #[error("re-authentication unavailable: {reason}")]
    ReauthUnavailable { reason: String },

    #[error("deletion proof rejected: {reason}")]
    ProofRejected { reason: String },

    #[error("lookup on '{target}' failed: {reason}")]
    LookupUnavailable { target: String, reason: String },

    #[error("delete of '{collection}/{id}' failed: {reason}")]
    CollectionDeleteFailed {
        collection: String,
        id: String,
        reason: String,
    },

    #[error("delete of blob '{path}' under '{prefix}' failed: {reason}")]
    BlobDeleteFailed {
        prefix: String,
        path: String,
        reason: String,
    },

    #[error("verification found '{id}' still present in '{collection}'")]
    VerificationAnomaly { collection: String, id: String },

    #[error("removing the principal from the authentication provider failed: {reason}")]
    PrincipalDeleteFailed { reason: String },

    #[error("deletion task aborted: {reason}")]
    Aborted { reason: String },
}

impl AccountError {
    /// Whether the caller should keep the deletion pending and let the user
    /// re-enter the credential.
    pub fn keeps_action_pending(&self) -> bool {
        matches!(self, AccountError::WrongCredential)
    }

    /// Errors that stop a run before it mutates anything.
    pub fn is_pre_mutation(&self) -> bool {
        matches!(
            self,
            AccountError::WrongCredential
                | AccountError::RateLimited
                | AccountError::ReauthUnavailable { .. }
                | AccountError::ProofRejected { .. }
        )
    }
}

impl From<ReauthError> for AccountError {
    fn from(value: ReauthError) -> Self {
        match value {
            ReauthError::WrongCredential => AccountError::WrongCredential,
            ReauthError::RateLimited => AccountError::RateLimited,
            ReauthError::Other(reason) => AccountError::ReauthUnavailable { reason },
        }
    }
}

impl From<ProofError> for AccountError {
    fn from(value: ProofError) -> Self {
        AccountError::ProofRejected {
            reason: value.to_string(),
        }
    }
}
