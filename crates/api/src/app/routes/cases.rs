use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use chancery_auth::caps;
use chancery_cases::{
    AcceptCase, AddStageDocument, ApproveMemorandum, ArchiveCase, AssignLawyer, Case, CaseCommand,
    CaseId, CloseStage, DeleteCase, OpenCase, OpenStage, RecordDirectorSignature,
    RejectMemorandum, RequestDirectorSignature, ScheduleHearing, SubmitMemorandum, SubmitToCourt,
};
use chancery_core::{ClientId, StaffRole, UserId};
use chancery_infra::streams;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{self, CmdAuth};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(open_case).get(list_cases))
        .route("/:id", get(get_case).delete(delete_case))
        .route("/:id/assign-lawyer", post(assign_lawyer))
        .route("/:id/accept", post(accept_case))
        .route("/:id/request-signature", post(request_signature))
        .route("/:id/signature", post(record_signature))
        .route("/:id/archive", post(archive_case))
        .route("/:id/activity", get(case_activity))
        .route("/:id/stages", post(open_stage))
        .route("/:id/stages/:n/memorandum", post(submit_memorandum))
        .route("/:id/stages/:n/memorandum/approve", post(approve_memorandum))
        .route("/:id/stages/:n/memorandum/reject", post(reject_memorandum))
        .route("/:id/stages/:n/submit-to-court", post(submit_to_court))
        .route("/:id/stages/:n/hearing", post(schedule_hearing))
        .route("/:id/stages/:n/documents", post(add_document))
        .route("/:id/stages/:n/close", post(close_stage))
}

pub async fn open_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::OpenCaseRequest>,
) -> axum::response::Response {
    let client: ClientId = match body.client.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client id");
        }
    };

    let agg = chancery_core::AggregateId::new();
    let case_id = CaseId::new(agg);
    let case_number = services.case_numbers.next(services.current_year());

    let cmd = CaseCommand::OpenCase(OpenCase {
        case_id,
        case_number,
        client,
        case_type: body.case_type,
        title: body.title,
        court: body.court,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![caps::CASES_OPEN],
    };
    if let Err(e) = authz::authorize_command(&ctx, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Case>(agg, streams::CASE, cmd_auth.inner, |id| {
        Case::empty(CaseId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

pub async fn assign_lawyer(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::AssignLawyerRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let lawyer: UserId = match body.lawyer.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid lawyer id");
        }
    };
    let approving_lawyer: Option<UserId> = match body.approving_lawyer.as_deref() {
        Some(raw) => match raw.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                return errors::json_error(
                    StatusCode::BAD_REQUEST,
                    "invalid_id",
                    "invalid approving lawyer id",
                );
            }
        },
        None => None,
    };

    // The aggregate has no view of the staff directory, so the gateway
    // checks that the designees exist, are active and hold lawyer roles.
    if let Err(resp) = check_staff_role(
        &services,
        lawyer,
        &[StaffRole::Lawyer, StaffRole::ApprovingLawyer],
        "lawyer",
    ) {
        return resp;
    }
    if let Some(approver) = approving_lawyer {
        if let Err(resp) = check_staff_role(
            &services,
            approver,
            &[StaffRole::ApprovingLawyer],
            "approving lawyer",
        ) {
            return resp;
        }
    }

    let cmd = CaseCommand::AssignLawyer(AssignLawyer {
        case_id: CaseId::new(agg),
        lawyer,
        approving_lawyer,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });

    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_ASSIGN], StatusCode::OK)
}

pub async fn accept_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::AcceptCase(AcceptCase {
        case_id: CaseId::new(agg),
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_ACCEPT], StatusCode::OK)
}

pub async fn submit_memorandum(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, stage)): Path<(String, u32)>,
    Json(body): Json<dto::SubmitMemorandumRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let file = match errors::parse_file_ref(&body.file) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::SubmitMemorandum(SubmitMemorandum {
        case_id: CaseId::new(agg),
        stage,
        content: body.content,
        file,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_MEMORANDA], StatusCode::OK)
}

pub async fn approve_memorandum(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, stage)): Path<(String, u32)>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::ApproveMemorandum(ApproveMemorandum {
        case_id: CaseId::new(agg),
        stage,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_REVIEW], StatusCode::OK)
}

pub async fn reject_memorandum(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, stage)): Path<(String, u32)>,
    Json(body): Json<dto::RejectMemorandumRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::RejectMemorandum(RejectMemorandum {
        case_id: CaseId::new(agg),
        stage,
        feedback: body.feedback,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_REVIEW], StatusCode::OK)
}

pub async fn request_signature(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::RequestDirectorSignature(RequestDirectorSignature {
        case_id: CaseId::new(agg),
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(
        &services,
        &ctx,
        agg,
        cmd,
        vec![caps::CASES_REQUEST_SIGNATURE],
        StatusCode::OK,
    )
}

pub async fn record_signature(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordSignatureRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let file = match body.file.as_deref() {
        Some(raw) => match errors::parse_file_ref(raw) {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        },
        None => None,
    };
    let cmd = CaseCommand::RecordDirectorSignature(RecordDirectorSignature {
        case_id: CaseId::new(agg),
        file,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_SIGN], StatusCode::OK)
}

pub async fn submit_to_court(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, stage)): Path<(String, u32)>,
    Json(body): Json<dto::SubmitToCourtRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let proof = match errors::parse_file_ref(&body.proof) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::SubmitToCourt(SubmitToCourt {
        case_id: CaseId::new(agg),
        stage,
        proof,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_SUBMIT], StatusCode::OK)
}

pub async fn schedule_hearing(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, stage)): Path<(String, u32)>,
    Json(body): Json<dto::ScheduleHearingRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::ScheduleHearing(ScheduleHearing {
        case_id: CaseId::new(agg),
        stage,
        date: body.date,
        time: body.time,
        location: body.location,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_HEARINGS], StatusCode::OK)
}

pub async fn add_document(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, stage)): Path<(String, u32)>,
    Json(body): Json<dto::AddDocumentRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let file = match errors::parse_file_ref(&body.file) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::AddStageDocument(AddStageDocument {
        case_id: CaseId::new(agg),
        stage,
        file,
        title: body.title,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_DOCUMENTS], StatusCode::OK)
}

pub async fn open_stage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::OpenStageRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::OpenStage(OpenStage {
        case_id: CaseId::new(agg),
        kind: body.kind,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_STAGES], StatusCode::CREATED)
}

pub async fn close_stage(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path((id, stage)): Path<(String, u32)>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::CloseStage(CloseStage {
        case_id: CaseId::new(agg),
        stage,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_STAGES], StatusCode::OK)
}

pub async fn archive_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::ArchiveCase(ArchiveCase {
        case_id: CaseId::new(agg),
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_ARCHIVE], StatusCode::OK)
}

pub async fn delete_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = CaseCommand::DeleteCase(DeleteCase {
        case_id: CaseId::new(agg),
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_case(&services, &ctx, agg, cmd, vec![caps::CASES_DELETE], StatusCode::OK)
}

pub async fn get_case(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::CASES_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.cases.get(&CaseId::new(agg)) {
        Some(case) if !case.is_deleted() => {
            (StatusCode::OK, Json(dto::case_to_json(&case))).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "case not found"),
    }
}

pub async fn list_cases(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::CASES_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .cases
        .list()
        .iter()
        .filter(|c| !c.is_deleted())
        .map(dto::case_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn case_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Query(query): Query<dto::LimitQuery>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::CASES_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match errors::parse_aggregate_id(&id, "case") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let limit = query.limit.unwrap_or(50);
    let items = services
        .activity
        .for_case(&CaseId::new(agg), limit)
        .iter()
        .map(dto::activity_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

/// Authorize and dispatch a case command, mapping the outcome to a response.
fn dispatch_case(
    services: &AppServices,
    ctx: &RequestContext,
    agg: chancery_core::AggregateId,
    cmd: CaseCommand,
    required: Vec<chancery_auth::Capability>,
    ok_status: StatusCode,
) -> axum::response::Response {
    let cmd_auth = CmdAuth {
        inner: cmd,
        required,
    };
    if let Err(e) = authz::authorize_command(ctx, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Case>(agg, streams::CASE, cmd_auth.inner, |id| {
        Case::empty(CaseId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        ok_status,
        Json(serde_json::json!({"id": agg.to_string(), "events_committed": committed.len()})),
    )
        .into_response()
}

/// Directory check for lawyer assignment designees.
fn check_staff_role(
    services: &AppServices,
    staff_id: UserId,
    allowed: &[StaffRole],
    what: &str,
) -> Result<(), axum::response::Response> {
    match services.staff.get(&staff_id) {
        Some(member) if member.is_active() && allowed.contains(&member.role()) => Ok(()),
        Some(member) if !member.is_active() => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation",
            format!("{what} is not an active staff member"),
        )),
        Some(_) => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation",
            format!("{what} does not hold a lawyer role"),
        )),
        None => Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation",
            format!("unknown {what}"),
        )),
    }
}
