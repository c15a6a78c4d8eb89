//! Strongly-typed identifiers used across the platform.
//!
//! Identifiers issued by the authentication provider and the document store are
//! opaque strings (not UUIDs), so the newtypes here wrap `String` and only
//! reject values that would be ambiguous when embedded in a storage path.

use core::str::FromStr;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Identifier of an authenticated principal (admin or site user).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PrincipalId(String);

/// Identifier of a document inside one collection.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

fn validate_opaque(value: &str, name: &str) -> Result<(), DomainError> {
    if value.is_empty() {
        return Err(DomainError::invalid_id(format!("{name}: empty")));
    }
    if value.contains('/') {
        return Err(DomainError::invalid_id(format!("{name}: contains '/'")));
    }
    if value.chars().any(char::is_control) {
        return Err(DomainError::invalid_id(format!("{name}: contains control characters")));
    }
    Ok(())
}

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal, $validate:path) => {
        impl $t {
            /// Parse and validate an identifier.
            pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
                let value = value.into();
                $validate(&value, $name)?;
                Ok(Self(value))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl TryFrom<String> for $t {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::new(value)
            }
        }

        impl From<$t> for String {
            fn from(value: $t) -> Self {
                value.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::new(s)
            }
        }
    };
}

impl_string_newtype!(PrincipalId, "PrincipalId", validate_opaque);
impl_string_newtype!(DocumentId, "DocumentId", validate_opaque);
impl_string_newtype!(TenantName, "TenantName", validate_tenant_name);

impl From<PrincipalId> for DocumentId {
    /// Documents keyed by their owner reuse the principal id verbatim.
    fn from(value: PrincipalId) -> Self {
        Self(value.0)
    }
}

impl PartialEq<PrincipalId> for DocumentId {
    fn eq(&self, other: &PrincipalId) -> bool {
        self.0 == other.0
    }
}

/// Name of a tenant (storefront), taken from the site-area URL segment.
///
/// Valid names are 1-63 characters of lowercase ASCII letters, digits and `-`,
/// not starting or ending with `-`. The underscore is excluded because it is
/// the separator of tenant-scoped collection names (see [`crate::CollectionName`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantName(String);

pub const MAX_TENANT_NAME_LEN: usize = 63;

fn validate_tenant_name(value: &str, name: &str) -> Result<(), DomainError> {
    if value.is_empty() || value.len() > MAX_TENANT_NAME_LEN {
        return Err(DomainError::invalid_id(format!(
            "{name}: length must be 1..={MAX_TENANT_NAME_LEN}"
        )));
    }
    if value.starts_with('-') || value.ends_with('-') {
        return Err(DomainError::invalid_id(format!("{name}: leading or trailing '-'")));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(DomainError::invalid_id(format!(
            "{name}: only [a-z0-9-] allowed, got '{value}'"
        )));
    }
    Ok(())
}
