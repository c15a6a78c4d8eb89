//! Physical collection naming.

use serde::{Deserialize, Serialize};

use crate::TenantName;

/// Separator between tenant name and logical collection name.
///
/// Tenant names never contain it, so `"{tenant}_{name}"` is unambiguous.
pub const TENANT_SEPARATOR: char = '_';

/// Physical name of a collection in the document store.
///
/// Global collections use their logical name verbatim. Tenant-scoped
/// collections are named `"{tenant}_{logical}"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn global(logical: &str) -> Self {
        Self(logical.to_string())
    }

    pub fn tenant_scoped(tenant: &TenantName, logical: &str) -> Self {
        Self(format!("{tenant}{TENANT_SEPARATOR}{logical}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Tenant prefix of this collection, if it is tenant-scoped.
    pub fn tenant(&self) -> Option<TenantName> {
        let (prefix, _) = self.0.split_once(TENANT_SEPARATOR)?;
        TenantName::new(prefix).ok()
    }

    pub fn is_scoped_to(&self, tenant: &TenantName) -> bool {
        self.tenant().as_ref() == Some(tenant)
    }
}

impl core::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
