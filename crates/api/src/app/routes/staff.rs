use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;

use chancery_auth::{
    DeactivateStaff, RegisterStaff, StaffCommand, StaffMember, UpdateStaffContact, caps,
};
use chancery_core::{AggregateId, UserId};
use chancery_infra::streams;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{self, CmdAuth};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(register_staff).get(list_staff))
        .route("/:id/contact", post(update_contact))
        .route("/:id/deactivate", post(deactivate_staff))
}

pub async fn register_staff(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::RegisterStaffRequest>,
) -> axum::response::Response {
    let staff_id: UserId = match body.staff_id.as_deref() {
        Some(raw) => match raw.parse() {
            Ok(v) => v,
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid staff id",
                );
            }
        },
        None => UserId::new(),
    };

    let cmd = StaffCommand::RegisterStaff(RegisterStaff {
        staff_id,
        email: body.email,
        display_name: body.display_name,
        role: body.role,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });

    dispatch_staff(&services, &ctx, staff_id, cmd, StatusCode::CREATED)
}

pub async fn update_contact(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::StaffContactRequest>,
) -> axum::response::Response {
    let staff_id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid staff id");
        }
    };
    let cmd = StaffCommand::UpdateStaffContact(UpdateStaffContact {
        staff_id,
        email: body.email,
        display_name: body.display_name,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_staff(&services, &ctx, staff_id, cmd, StatusCode::OK)
}

pub async fn deactivate_staff(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::DeactivateStaffRequest>,
) -> axum::response::Response {
    let staff_id: UserId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid staff id");
        }
    };
    let cmd = StaffCommand::DeactivateStaff(DeactivateStaff {
        staff_id,
        reason: body.reason,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_staff(&services, &ctx, staff_id, cmd, StatusCode::OK)
}

pub async fn list_staff(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::STAFF_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .staff
        .list()
        .iter()
        .map(dto::staff_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_staff(
    services: &AppServices,
    ctx: &RequestContext,
    staff_id: UserId,
    cmd: StaffCommand,
    ok_status: StatusCode,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![caps::STAFF_MANAGE],
    };
    if let Err(e) = authz::authorize_command(ctx, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    // Staff streams are keyed by the member's own user id.
    let agg = AggregateId::from_uuid(*staff_id.as_uuid());
    let committed = match services.dispatch::<StaffMember>(agg, streams::STAFF, cmd_auth.inner, |id| {
        StaffMember::empty(UserId::from_uuid(*id.as_uuid()))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        ok_status,
        Json(serde_json::json!({"id": staff_id.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}
