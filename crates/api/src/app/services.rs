use std::sync::Arc;

use siteforge_accounts::AccountCloser;
use siteforge_auth::{AuthService, PermissionClassifier, TenantResolver};
use siteforge_infra::{
    BlobStore, DocumentStore, InMemoryAuthService, InMemoryBlobStore, InMemoryDocumentStore, StoreMembershipDirectory,
};

use crate::ApiConfig;

pub type StoreClassifier = PermissionClassifier<StoreMembershipDirectory<Arc<dyn DocumentStore>>>;

/// Everything the handlers need, built once at startup.
pub struct AppServices {
    pub resolver: TenantResolver,
    pub classifier: StoreClassifier,
    pub closer: AccountCloser,
}

impl AppServices {
    pub fn new(
        config: &ApiConfig,
        store: Arc<dyn DocumentStore>,
        blobs: Arc<dyn BlobStore>,
        auth: Arc<dyn AuthService>,
    ) -> Self {
        let classifier = PermissionClassifier::new(
            config.admin.clone(),
            StoreMembershipDirectory::new(Arc::clone(&store)),
        )
        .with_lookup_timeout(config.store_timeout);

        let closer = AccountCloser::new(store, blobs, auth)
            .with_config(config.orchestrator())
            .with_proof_ttl(config.proof_ttl());

        Self {
            resolver: config.resolver(),
            classifier,
            closer,
        }
    }
}

/// In-memory collaborators (dev/test). Handles stay shared with the app so
/// callers can seed data and inspect the aftermath.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackends {
    pub store: Arc<InMemoryDocumentStore>,
    pub blobs: Arc<InMemoryBlobStore>,
    pub auth: Arc<InMemoryAuthService>,
}

impl InMemoryBackends {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn services(&self, config: &ApiConfig) -> AppServices {
        AppServices::new(config, self.store.clone(), self.blobs.clone(), self.auth.clone())
    }
}
