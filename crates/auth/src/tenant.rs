//! Tenant resolution from request paths.
//!
//! The caller threads the path explicitly; nothing here reads ambient
//! location state.

use serde::{Deserialize, Serialize};

use siteforge_core::TenantName;

/// Default reserved first segment of the site area (`/site/{tenant}/...`).
pub const DEFAULT_SITE_PREFIX: &str = "site";

/// Derives a tenant from a URL path.
///
/// `resolve` is pure and total: a path without a tenant is a valid input, and
/// a segment that is not a valid [`TenantName`] resolves to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantResolver {
    site_prefix: String,
}

impl Default for TenantResolver {
    fn default() -> Self {
        Self::new(DEFAULT_SITE_PREFIX)
    }
}

impl TenantResolver {
    pub fn new(site_prefix: impl Into<String>) -> Self {
        let site_prefix: String = site_prefix.into();
        Self {
            site_prefix: site_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn site_prefix(&self) -> &str {
        &self.site_prefix
    }

    pub fn resolve(&self, path: &str) -> Option<TenantName> {
        self.site_segment(path).and_then(|s| TenantName::new(s).ok())
    }

    /// Realm implied by a path: a tenant's site area, or the admin area.
    ///
    /// A path in the site area whose tenant segment is not a valid name is
    /// [`Realm::UnknownTenant`], never the admin area.
    pub fn realm_for(&self, path: &str) -> Realm {
        match self.site_segment(path) {
            None => Realm::AdminArea,
            Some(segment) => match TenantName::new(segment) {
                Ok(tenant) => Realm::Tenant(tenant),
                Err(_) => Realm::UnknownTenant(segment.to_string()),
            },
        }
    }

    /// Raw segment following the site prefix, if the path is in the site area.
    fn site_segment<'a>(&self, path: &'a str) -> Option<&'a str> {
        let path = path
            .split(['?', '#'])
            .next()
            .unwrap_or_default();

        let mut segments = path.split('/').filter(|s| !s.is_empty());
        if segments.next()? != self.site_prefix {
            return None;
        }
        segments.next()
    }
}

/// Access context implied by a URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "tenant", rename_all = "snake_case")]
pub enum Realm {
    /// The platform's admin area (storefront builders).
    AdminArea,
    /// A specific tenant's storefront; requires membership in its user table.
    Tenant(TenantName),
    /// A site-area path naming no valid tenant. Nobody is admitted.
    UnknownTenant(String),
}

impl Realm {
    pub fn tenant(&self) -> Option<&TenantName> {
        match self {
            Realm::Tenant(t) => Some(t),
            Realm::AdminArea | Realm::UnknownTenant(_) => None,
        }
    }
}
