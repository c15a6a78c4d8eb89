use serde::{Deserialize, Serialize};

use siteforge_auth::{PermissionDecision, Realm};
use siteforge_core::TenantName;

#[derive(Debug, Deserialize)]
pub struct AccessQuery {
    /// Current URL path, e.g. `/site/shopa/cart`.
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct AccessResponse {
    pub tenant: Option<TenantName>,
    pub realm: Realm,
    pub decision: PermissionDecision,
}

#[derive(Debug, Deserialize)]
pub struct DeleteAccountRequest {
    pub secret: String,
}

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub principal_id: String,
    pub email: String,
}
