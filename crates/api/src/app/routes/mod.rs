use axum::{
    Router,
    routing::{get, post},
};

pub mod access;
pub mod account;
pub mod system;

/// Router for the `/v1` endpoints. Session is optional at this level; each
/// handler decides whether it needs one.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/access", get(access::classify))
        .route("/account/delete", post(account::delete_account))
}
