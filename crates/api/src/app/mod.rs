//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: collaborator wiring (store, blobs, auth provider, classifier, closer)
//! - `routes/`: HTTP routes + handlers
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use siteforge_auth::Hs256SessionValidator;

use crate::{ApiConfig, middleware};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, InMemoryBackends};

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig, services: AppServices) -> Router {
    let sessions = Arc::new(Hs256SessionValidator::new(config.session_secret.as_bytes()));
    let auth_state = middleware::AuthState { sessions };

    let api = routes::router()
        .layer(Extension(Arc::new(services)))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::session_middleware,
        ));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/v1", api)
        .layer(ServiceBuilder::new())
}
