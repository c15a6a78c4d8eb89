use axum::{Json, extract::Extension, http::StatusCode, response::IntoResponse};

use crate::app::{dto::WhoAmIResponse, errors};
use crate::context::PrincipalContext;

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(principal: Option<Extension<PrincipalContext>>) -> axum::response::Response {
    let Some(Extension(ctx)) = principal else {
        return errors::unauthenticated();
    };
    let principal = ctx.principal();
    Json(WhoAmIResponse {
        principal_id: principal.id.to_string(),
        email: principal.email.clone(),
    })
    .into_response()
}
