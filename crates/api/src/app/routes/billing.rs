use std::sync::Arc;

use axum::{
    Json, Router, extract::Extension, http::StatusCode, response::IntoResponse, routing::post,
};

use chancery_auth::caps;

use crate::app::errors;
use crate::app::services::AppServices;
use crate::authz;
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new().route("/sweep-overdue", post(sweep_overdue))
}

/// Run the overdue sweep on demand. The sweep is idempotent, so calling it
/// again in the same day is harmless.
pub async fn sweep_overdue(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::BILLING_SWEEP]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let report = services.sweep_overdue(ctx.actor());
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "examined": report.examined,
            "flipped_invoices": report.flipped_invoices,
            "flipped_installments": report.flipped_installments,
            "failed": report.failed,
        })),
    )
        .into_response()
}
