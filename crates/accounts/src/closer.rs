use std::sync::Arc;

use tracing::{error, info, warn};

use siteforge_auth::{AuthService, CredentialReauthGate, Principal, Secret};
use siteforge_infra::{BlobStore, DocumentStore};

use crate::{AccountError, DeletionOrchestrator, DeletionResult, OrchestratorConfig};

/// Entry point for "close my account": re-authentication chained with the
/// deletion cascade.
///
/// The cascade runs on its own task. A caller that goes away after the proof
/// was issued does not cancel a deletion half way through.
pub struct AccountCloser {
    gate: CredentialReauthGate<Arc<dyn AuthService>>,
    orchestrator: DeletionOrchestrator,
}

impl AccountCloser {
    pub fn new(store: Arc<dyn DocumentStore>, blobs: Arc<dyn BlobStore>, auth: Arc<dyn AuthService>) -> Self {
        Self {
            gate: CredentialReauthGate::new(Arc::clone(&auth)),
            orchestrator: DeletionOrchestrator::new(store, blobs, auth),
        }
    }

    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.orchestrator = self.orchestrator.with_config(config);
        self
    }

    pub fn with_proof_ttl(mut self, ttl: chrono::Duration) -> Self {
        self.gate = self.gate.with_proof_ttl(ttl);
        self
    }

    pub fn orchestrator(&self) -> &DeletionOrchestrator {
        &self.orchestrator
    }

    /// Re-authenticate `principal` with `secret`, then delete everything it
    /// owns.
    ///
    /// Credential failures return `Err` before any mutation;
    /// `AccountError::keeps_action_pending` tells the caller whether to ask
    /// again. Once the cascade starts, failures are reported inside the
    /// returned `DeletionResult`.
    pub async fn delete_account(&self, principal: &Principal, secret: &Secret) -> Result<DeletionResult, AccountError> {
        let limit = self.orchestrator_timeout();
        let proof = match tokio::time::timeout(limit, self.gate.reauthenticate(principal, secret)).await {
            Ok(Ok(proof)) => proof,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                warn!(principal_id = %principal.id, "re-authentication timed out");
                return Err(AccountError::ReauthUnavailable {
                    reason: format!("timed out after {}ms", limit.as_millis()),
                });
            }
        };

        info!(principal_id = %principal.id, proof_id = %proof.proof_id(), "starting account deletion");

        let orchestrator = self.orchestrator.clone();
        let owned = principal.clone();
        let handle = tokio::spawn(async move { orchestrator.delete_account(&owned, proof).await });

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!(principal_id = %principal.id, error = %e, "account deletion task failed");
                Err(AccountError::Aborted { reason: e.to_string() })
            }
        }
    }

    fn orchestrator_timeout(&self) -> std::time::Duration {
        self.orchestrator.config().call_timeout
    }
}
