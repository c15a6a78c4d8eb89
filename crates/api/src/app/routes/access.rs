use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
};
use tracing::debug;

use crate::app::dto::{AccessQuery, AccessResponse};
use crate::app::services::AppServices;
use crate::context::PrincipalContext;

/// Classify the caller against the realm implied by `path`.
///
/// Always 200: a denial is a decision, not an error.
pub async fn classify(
    Extension(services): Extension<Arc<AppServices>>,
    principal: Option<Extension<PrincipalContext>>,
    Query(query): Query<AccessQuery>,
) -> Json<AccessResponse> {
    let realm = services.resolver.realm_for(&query.path);
    let principal = principal.as_ref().map(|Extension(ctx)| ctx.principal());
    let decision = services.classifier.classify(principal, &realm).await;

    debug!(
        path = %query.path,
        can_access = decision.can_access,
        role = ?decision.role,
        reason = ?decision.reason,
        "access classified"
    );

    Json(AccessResponse {
        tenant: realm.tenant().cloned(),
        realm,
        decision,
    })
}
