use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
};
use chrono::Utc;
use uuid::Uuid;

use chancery_auth::caps;
use chancery_billing::{DeletePayment, Invoice, InvoiceCommand, InvoiceId, PaymentId};
use chancery_infra::streams;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::authz::{self, CmdAuth};
use crate::context::RequestContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_receipts))
        .route("/:payment_id", delete(delete_payment))
}

pub async fn list_receipts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    if let Err(e) = authz::require(&ctx, &[caps::BILLING_READ]) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }
    let items = services
        .receipts
        .list()
        .iter()
        .filter(|r| !r.deleted)
        .map(dto::receipt_to_json)
        .collect::<Vec<_>>();
    (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
}

pub async fn delete_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(payment_id): Path<String>,
) -> axum::response::Response {
    let payment_id = match payment_id.parse::<Uuid>() {
        Ok(v) => PaymentId(v),
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid payment id");
        }
    };

    // Payments live inside invoice streams; the receipts read model maps
    // the payment back to the invoice that owns it.
    let receipt = match services.receipts.get(&payment_id) {
        Some(r) => r,
        None => return errors::json_error(StatusCode::NOT_FOUND, "not_found", "payment not found"),
    };

    let agg = receipt.invoice_id.0;
    let cmd = InvoiceCommand::DeletePayment(DeletePayment {
        invoice_id: receipt.invoice_id,
        payment_id,
        actor: ctx.actor(),
        occurred_at: Utc::now(),
    });

    let cmd_auth = CmdAuth {
        inner: cmd,
        required: vec![caps::PAYMENTS_DELETE],
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
        StatusCode::OK,
        Json(serde_json::json!({
            "id": agg.to_string(),
            "payment_id": payment_id.to_string(),
            "events_committed": committed.len(),
        })),
    )
        .into_response()
}
