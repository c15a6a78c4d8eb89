use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use siteforge_accounts::AccountError;

pub fn account_error_to_response(err: AccountError) -> axum::response::Response {
    let retryable = err.keeps_action_pending();
    let (status, code) = match &err {
        AccountError::WrongCredential => (StatusCode::UNAUTHORIZED, "wrong_credential"),
        AccountError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, "rate_limited"),
        AccountError::ReauthUnavailable { .. } => (StatusCode::SERVICE_UNAVAILABLE, "reauth_unavailable"),
        AccountError::ProofRejected { .. } => (StatusCode::UNAUTHORIZED, "proof_rejected"),
        AccountError::Aborted { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "aborted"),
        // Per-item errors live inside a DeletionResult; reaching here is a bug.
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "deletion_error"),
    };

    (
        status,
        axum::Json(json!({
            "error": code,
            "message": err.to_string(),
            "retryable": retryable,
        })),
    )
        .into_response()
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn unauthenticated() -> axum::response::Response {
    json_error(StatusCode::UNAUTHORIZED, "unauthenticated", "a valid session token is required")
}
