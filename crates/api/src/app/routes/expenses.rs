use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;

use chancery_auth::caps;
use chancery_billing::{Expense, ExpenseCommand, ExpenseId, RecordExpense, VoidExpense};
use chancery_infra::streams;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{self, CmdAuth};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(record_expense).get(list_expenses))
        .route("/:id", get(get_expense))
        .route("/:id/void", post(void_expense))
}

pub async fn record_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::RecordExpenseRequest>,
) -> axum::response::Response {
    let case_ref = match body.case_ref.as_deref() {
        Some(raw) => match errors::parse_aggregate_id(raw, "case") {
            Ok(v) => Some(chancery_cases::CaseId::new(v)),
            Err(resp) => return resp,
        },
        None => None,
    };
    let receipt = match body.receipt.as_deref() {
        Some(raw) => match errors::parse_file_ref(raw) {
            Ok(v) => Some(v),
            Err(resp) => return resp,
        },
        None => None,
    };

    let agg = chancery_core::AggregateId::new();
    let expense_number = services.expense_numbers.next(services.current_year());

    let cmd = ExpenseCommand::RecordExpense(RecordExpense {
        expense_id: ExpenseId::new(agg),
        expense_number,
        case_ref,
        category: body.category,
        description: body.description,
        amount: body.amount,
        receipt,
        spent_at: body.spent_at,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });

    dispatch_expense(&services, &ctx, agg, cmd, vec![caps::EXPENSES_WRITE], StatusCode::CREATED)
}

pub async fn void_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::VoidExpenseRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "expense") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = ExpenseCommand::VoidExpense(VoidExpense {
        expense_id: ExpenseId::new(agg),
        reason: body.reason,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_expense(&services, &ctx, agg, cmd, vec![caps::EXPENSES_VOID], StatusCode::OK)
}

pub async fn get_expense(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::BILLING_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match errors::parse_aggregate_id(&id, "expense") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.expenses.get(&ExpenseId::new(agg)) {
        Some(expense) => (StatusCode::OK, Json(dto::expense_to_json(&expense))).into_response(),
        None => errors::json_error(StatusCode::NOT_FOUND, "not_found", "expense not found"),
    }
}

pub async fn list_expenses(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::BILLING_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .expenses
        .list()
        .iter()
        .map(dto::expense_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_expense(
    services: &AppServices,
    ctx: &RequestContext,
    agg: chancery_core::AggregateId,
    cmd: ExpenseCommand,
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

    let committed = match services.dispatch::<Expense>(agg, streams::EXPENSE, cmd_auth.inner, |id| {
        Expense::empty(ExpenseId::new(id))
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
