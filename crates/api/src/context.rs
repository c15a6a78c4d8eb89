use siteforge_auth::Principal;

/// Authenticated identity for a request.
///
/// Inserted by the session middleware only when a valid bearer token was
/// presented; its absence means the caller is anonymous.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrincipalContext {
    principal: Principal,
}

impl PrincipalContext {
    pub fn new(principal: Principal) -> Self {
        Self { principal }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }
}
