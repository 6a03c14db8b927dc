use std::sync::Arc;

use axum::{
    Json,
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
};

use chancery_auth::caps;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz;
use crate::context::RequestContext;

/// Pending and dispatched hearing reminders.
pub async fn reminders(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::CASES_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .reminders
        .list()
        .iter()
        .map(dto::reminder_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Firm-wide activity feed, newest first.
pub async fn activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::CASES_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let limit = query.limit.unwrap_or(50);
    let items = services
        .activity
        .recent(limit)
        .iter()
        .map(dto::activity_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}
