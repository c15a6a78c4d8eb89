use serde::{Deserialize, Serialize};

use siteforge_core::PrincipalId;

/// An authenticated actor, admin or site user.
///
/// Not owned by any component: it is supplied per request by whatever layer
/// validated the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: PrincipalId,
    pub email: String,
}

impl Principal {
    pub fn new(id: PrincipalId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
        }
    }

    /// Email normalized for comparisons (trimmed, ASCII-lowercased).
    pub fn normalized_email(&self) -> String {
        self.email.trim().to_ascii_lowercase()
    }
}
