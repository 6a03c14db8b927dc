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
use chancery_billing::{
    CreateInvoice, DefineInstallmentPlan, DeleteInvoice, Invoice, InvoiceCommand, InvoiceId,
    PaymentId, RecordPayment, UpdateInvoice,
};
use chancery_core::ClientId;
use chancery_infra::streams;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{self, CmdAuth};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_invoice).get(list_invoices))
        .route(
            "/:id",
            get(get_invoice).patch(update_invoice).delete(delete_invoice),
        )
        .route("/:id/installment-plan", post(define_installment_plan))
        .route("/:id/payments", post(record_payment))
}

pub async fn create_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Json(body): Json<dto::CreateInvoiceRequest>,
) -> axum::response::Response {
    let client: ClientId = match body.client.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client id");
        }
    };
    let case_ref = match body.case_ref.as_deref() {
        Some(raw) => match errors::parse_aggregate_id(raw, "case") {
            Ok(v) => Some(chancery_cases::CaseId::new(v)),
            Err(resp) => return resp,
        },
        None => None,
    };

    let agg = chancery_core::AggregateId::new();
    let invoice_id = InvoiceId::new(agg);
    let invoice_number = services.invoice_numbers.next(services.current_year());

    let cmd = InvoiceCommand::CreateInvoice(CreateInvoice {
        invoice_id,
        invoice_number,
        client,
        case_ref,
        total_amount: body.total_amount,
        due_date: body.due_date,
        installments: body.installments,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });

    dispatch_invoice(&services, &ctx, agg, cmd, vec![caps::INVOICES_CREATE], StatusCode::CREATED)
}

pub async fn update_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateInvoiceRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = InvoiceCommand::UpdateInvoice(UpdateInvoice {
        invoice_id: InvoiceId::new(agg),
        total_amount: body.total_amount,
        due_date: body.due_date,
        installments: body.installments,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_invoice(&services, &ctx, agg, cmd, vec![caps::INVOICES_UPDATE], StatusCode::OK)
}

pub async fn define_installment_plan(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::InstallmentPlanRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = InvoiceCommand::DefineInstallmentPlan(DefineInstallmentPlan {
        invoice_id: InvoiceId::new(agg),
        parts: body.parts,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_invoice(&services, &ctx, agg, cmd, vec![caps::INVOICES_UPDATE], StatusCode::OK)
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let payment_id = PaymentId::new();
    let receipt_number = services.receipt_numbers.next(services.current_year());

    let cmd = InvoiceCommand::RecordPayment(RecordPayment {
        invoice_id: InvoiceId::new(agg),
        payment_id,
        amount: body.amount,
        method: body.method,
        receipt_number: receipt_number.clone(),
        installment: body.installment,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![caps::PAYMENTS_WRITE],
    };
    if let Err(e) = authz::authorize_command(&ctx, &cmd_auth) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let committed = match services.dispatch::<Invoice>(agg, streams::INVOICE, cmd_auth.inner, |id| {
        Invoice::empty(InvoiceId::new(id))
    }) {
        Ok(c) => c,
        Err(e) => return errors::dispatch_error_to_response(e),
    };

    (
        StatusCode::CREATED,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "payment_id": payment_id.to_string(),
            "receipt_number": receipt_number,
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}

pub async fn delete_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let agg = match errors::parse_aggregate_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let cmd = InvoiceCommand::DeleteInvoice(DeleteInvoice {
        invoice_id: InvoiceId::new(agg),
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });
    dispatch_invoice(&services, &ctx, agg, cmd, vec![caps::INVOICES_DELETE], StatusCode::OK)
}

pub async fn get_invoice(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::BILLING_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let agg = match errors::parse_aggregate_id(&id, "invoice") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.invoices.get(&InvoiceId::new(agg)) {
        Some(invoice) if !invoice.is_deleted() => {
            (StatusCode::OK, Json(dto::invoice_to_json(&invoice))).into_response()
        }
        _ => errors::json_error(StatusCode::NOT_FOUND, "not_found", "invoice not found"),
    }
}

pub async fn list_invoices(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::BILLING_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .invoices
        .list()
        .iter()
        .filter(|i| !i.is_deleted())
        .map(dto::invoice_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

fn dispatch_invoice(
    services: &AppServices,
    ctx: &RequestContext,
    agg: chancery_core::AggregateId,
    cmd: InvoiceCommand,
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

    let committed = match services.dispatch::<Invoice>(agg, streams::INVOICE, cmd_auth.inner, |id| {
        Invoice::empty(InvoiceId::new(id))
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
