//! Logical names of the collections and fields shared across crates.
//!
//! The store has no schema; these constants are the only place the names the
//! storefront builder writes are spelled out.

/// Global: site configuration keyed by the owning principal's id.
pub const SITE_DATA: &str = "siteData";

/// Global: admin profile keyed by principal id.
pub const ADMIN_PROFILES: &str = "users";

/// Global: keyed by principal id, names the tenant whose user table holds it.
pub const SITE_USER_INDEX: &str = "siteUserIndex";

/// Tenant-scoped: the tenant's site users, keyed by principal id.
pub const TENANT_USERS: &str = "users";

/// Field of [`SITE_DATA`] and [`SITE_USER_INDEX`] documents holding a tenant name.
pub const SITE_NAME_FIELD: &str = "siteName";
