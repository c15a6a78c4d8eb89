use std::sync::Arc;

use axum::{
    Json,
    extract::Extension,
    response::{IntoResponse, Response},
};
use tracing::info;

use siteforge_auth::Secret;

use crate::app::dto::DeleteAccountRequest;
use crate::app::errors;
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Close the caller's account after re-checking its credential.
///
/// Responds 200 with the full deletion result even when some targets failed;
/// the result is the audit record.
pub async fn delete_account(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Json(body): Json<DeleteAccountRequest>,
) -> Response {
    let Some(Extension(ctx)) = principal else {
        return errors::unauthenticated();
    };

    let secret = Secret::new(body.secret);
    match services.closer.delete_account(ctx.principal(), &secret).await {
        Ok(result) => {
            info!(
                principal_id = %result.principal_id,
                run_id = %result.run_id,
                complete = result.is_complete(),
                "account deletion request served"
            );
            Json(result).into_response()
        }
        Err(e) => errors::account_error_to_response(e),
    }
}
