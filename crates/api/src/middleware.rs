use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use siteforge_auth::SessionValidator;

use crate::context::PrincipalContext;

#[derive(Clone)]
pub struct AuthState {
    pub sessions: Arc<dyn SessionValidator>,
}

/// Attach a [`PrincipalContext`] when a bearer token is present.
///
/// No `Authorization` header: the request continues anonymously.
/// A header that is malformed, unsigned or expired: 401.
pub async fn session_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if let Some(token) = extract_bearer(req.headers())? {
        let claims = state.sessions.validate(token, Utc::now()).map_err(|e| {
            debug!(error = %e, "session token rejected");
            StatusCode::UNAUTHORIZED
        })?;
        req.extensions_mut().insert(PrincipalContext::new(claims.principal()));
    }

    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, StatusCode> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?;

    let header = header
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = header.trim();
    if token.is_empty() {
        return Err(StatusCode::UNAUTHORIZED);
    }

    Ok(Some(token))
}
