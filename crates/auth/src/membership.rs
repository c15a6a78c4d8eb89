//! Tenant-user membership lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use siteforge_core::{PrincipalId, TenantName};

/// Answer to "is this principal a site user of any tenant?".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tenant", rename_all = "snake_case")]
pub enum MembershipProbe {
    Member(TenantName),
    NotMember,
    /// The directory cannot answer cross-tenant questions.
    Unknowable,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("membership lookup unavailable: {0}")]
    Unavailable(String),

    #[error("membership lookup timed out")]
    Timeout,
}

/// Read access to tenants' user tables.
#[async_trait]
pub trait MembershipDirectory: Send + Sync {
    /// Whether the principal has a record in `tenant`'s user table.
    async fn is_member(&self, tenant: &TenantName, principal: &PrincipalId) -> Result<bool, LookupError>;

    /// Which tenant's user table (if any) holds the principal.
    async fn tenant_of(&self, principal: &PrincipalId) -> Result<MembershipProbe, LookupError>;
}

#[async_trait]
impl<D> MembershipDirectory for std::sync::Arc<D>
where
    D: MembershipDirectory + ?Sized,
{
    async fn is_member(&self, tenant: &TenantName, principal: &PrincipalId) -> Result<bool, LookupError> {
        (**self).is_member(tenant, principal).await
    }

    async fn tenant_of(&self, principal: &PrincipalId) -> Result<MembershipProbe, LookupError> {
        (**self).tenant_of(principal).await
    }
}
