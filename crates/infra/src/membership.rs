//! Membership lookups backed by the document store.

use async_trait::async_trait;

use siteforge_auth::{LookupError, MembershipDirectory, MembershipProbe};
use siteforge_core::layout::{SITE_NAME_FIELD, SITE_USER_INDEX, TENANT_USERS};
use siteforge_core::{CollectionName, DocumentId, PrincipalId, TenantName};

use crate::document_store::{DocumentStore, StoreError};

/// Reads a tenant's `{tenant}_users` table and the global `siteUserIndex`.
pub struct StoreMembershipDirectory<S> {
    store: S,
}

impl<S> StoreMembershipDirectory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

fn lookup_error(e: StoreError) -> LookupError {
    match e {
        StoreError::Timeout => LookupError::Timeout,
        other => LookupError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl<S: DocumentStore> MembershipDirectory for StoreMembershipDirectory<S> {
    async fn is_member(&self, tenant: &TenantName, principal: &PrincipalId) -> Result<bool, LookupError> {
        let users = CollectionName::tenant_scoped(tenant, TENANT_USERS);
        let found = self
            .store
            .get(&users, &DocumentId::from(principal.clone()))
            .await
            .map_err(lookup_error)?;
        Ok(found.is_some())
    }

    async fn tenant_of(&self, principal: &PrincipalId) -> Result<MembershipProbe, LookupError> {
        let index = CollectionName::global(SITE_USER_INDEX);
        let Some(entry) = self
            .store
            .get(&index, &DocumentId::from(principal.clone()))
            .await
            .map_err(lookup_error)?
        else {
            return Ok(MembershipProbe::NotMember);
        };

        // A present but unreadable entry must not be mistaken for "not a member".
        let name = entry
            .field_str(SITE_NAME_FIELD)
            .ok_or_else(|| LookupError::Unavailable(format!("{SITE_USER_INDEX}/{principal}: missing {SITE_NAME_FIELD}")))?;
        let tenant = TenantName::new(name).map_err(|e| LookupError::Unavailable(e.to_string()))?;
        Ok(MembershipProbe::Member(tenant))
    }
}
