//! Request DTOs and JSON mapping helpers.
//!
//! Responses are built with `serde_json::json!` from the read models so
//! the wire shape stays under the gateway's control instead of leaking
//! whatever the domain structs happen to derive.

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{Value as JsonValue, json};

use chancery_auth::StaffMember;
use chancery_billing::{Expense, Installment, InstallmentPart, Invoice, PaymentMethod, PaymentRecord};
use chancery_cases::{Case, Stage, StageKind};
use chancery_core::{AggregateRoot, StaffRole};
use chancery_infra::{ActivityEntry, ReceiptEntry, ReminderEntry};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct OpenCaseRequest {
    pub client: String,
    pub case_type: String,
    pub title: String,
    pub court: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AssignLawyerRequest {
    pub lawyer: String,
    pub approving_lawyer: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitMemorandumRequest {
    pub content: String,
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct RejectMemorandumRequest {
    pub feedback: String,
}

#[derive(Debug, Deserialize)]
pub struct RecordSignatureRequest {
    pub file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SubmitToCourtRequest {
    pub proof: String,
}

#[derive(Debug, Deserialize)]
pub struct ScheduleHearingRequest {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub location: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AddDocumentRequest {
    pub file: String,
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenStageRequest {
    pub kind: StageKind,
}

#[derive(Debug, Deserialize)]
pub struct CreateInvoiceRequest {
    pub client: String,
    pub case_ref: Option<String>,
    pub total_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub installments: Vec<InstallmentPart>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvoiceRequest {
    pub total_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub installments: Option<Vec<InstallmentPart>>,
}

#[derive(Debug, Deserialize)]
pub struct InstallmentPlanRequest {
    pub parts: Vec<InstallmentPart>,
}

#[derive(Debug, Deserialize)]
pub struct RecordPaymentRequest {
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub installment: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RecordExpenseRequest {
    pub case_ref: Option<String>,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub receipt: Option<String>,
    pub spent_at: NaiveDate,
}

#[derive(Debug, Deserialize)]
pub struct VoidExpenseRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterStaffRequest {
    /// Subject the new member will authenticate as. Generated when omitted.
    pub staff_id: Option<String>,
    pub email: String,
    pub display_name: String,
    pub role: StaffRole,
}

#[derive(Debug, Deserialize)]
pub struct StaffContactRequest {
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeactivateStaffRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn case_to_json(case: &Case) -> JsonValue {
    json!({
        "id": case.id_typed().to_string(),
        "case_number": case.case_number(),
        "client": case.client().map(|c| c.to_string()),
        "case_type": case.case_type(),
        "title": case.title(),
        "court": case.court(),
        "opened_by": case.opened_by().map(|u| u.to_string()),
        "opened_at": case.opened_at(),
        "status": case.status().as_str(),
        "assigned_lawyer": case.assigned_lawyer().map(|u| u.to_string()),
        "accepted": case.is_accepted(),
        "approving_lawyer": case.approving_lawyer().map(|u| u.to_string()),
        "director_signature": case.director_signature().map(|s| json!({
            "signed_by": s.signed_by.to_string(),
            "file": s.file.as_ref().map(|f| f.as_str()),
            "signed_at": s.signed_at,
        })),
        "current_stage": case.current_stage_index(),
        "stages": case.stages().iter().map(stage_to_json).collect::<Vec<_>>(),
        "archived": case.is_archived(),
    })
}

pub fn stage_to_json(stage: &Stage) -> JsonValue {
    json!({
        "number": stage.number,
        "kind": stage.kind.as_str(),
        "status": stage.status,
        "memorandum": stage.memorandum.as_ref().map(|m| json!({
            "content": m.content,
            "file": m.file.as_str(),
            "prepared_by": m.prepared_by.to_string(),
            "prepared_at": m.prepared_at,
            "status": m.status,
            "approved_by": m.approved_by.map(|u| u.to_string()),
            "approved_at": m.approved_at,
            "feedback": m.feedback,
        })),
        "hearing": stage.hearing.as_ref().map(|h| json!({
            "date": h.date,
            "time": h.time,
            "location": h.location,
            "scheduled_by": h.scheduled_by.to_string(),
            "remind_at": h.remind_at,
        })),
        "submission_proof": stage.submission_proof.as_ref().map(|p| json!({
            "file": p.file.as_str(),
            "submitted_by": p.submitted_by.to_string(),
            "submitted_at": p.submitted_at,
        })),
        "documents": stage.documents.iter().map(|d| json!({
            "file": d.file.as_str(),
            "title": d.title,
            "uploaded_by": d.uploaded_by.to_string(),
            "uploaded_at": d.uploaded_at,
        })).collect::<Vec<_>>(),
        "closed": stage.closed,
    })
}

pub fn invoice_to_json(invoice: &Invoice) -> JsonValue {
    json!({
        "id": invoice.id_typed().to_string(),
        "invoice_number": invoice.invoice_number(),
        "client": invoice.client().map(|c| c.to_string()),
        "case_ref": invoice.case_ref().map(|c| c.to_string()),
        "issued_by": invoice.issued_by().map(|u| u.to_string()),
        "issued_at": invoice.issued_at(),
        "status": invoice.status().as_str(),
        "due_date": invoice.due_date(),
        "total_amount": invoice.total_amount(),
        "paid_amount": invoice.paid_amount(),
        "remaining_amount": invoice.remaining_amount(),
        "installments": invoice.installments().iter().map(installment_to_json).collect::<Vec<_>>(),
        "payments": invoice.payments().iter().map(payment_to_json).collect::<Vec<_>>(),
    })
}

pub fn installment_to_json(installment: &Installment) -> JsonValue {
    json!({
        "number": installment.number,
        "amount": installment.amount,
        "due_date": installment.due_date,
        "paid_amount": installment.paid_amount,
        "status": installment.status.as_str(),
        "paid_at": installment.paid_at,
    })
}

pub fn payment_to_json(payment: &PaymentRecord) -> JsonValue {
    json!({
        "payment_id": payment.payment_id.to_string(),
        "amount": payment.amount,
        "method": payment.method,
        "receipt_number": payment.receipt_number,
        "installment": payment.installment,
        "received_by": payment.received_by.to_string(),
        "paid_at": payment.paid_at,
    })
}

pub fn receipt_to_json(receipt: &ReceiptEntry) -> JsonValue {
    json!({
        "payment_id": receipt.payment_id.to_string(),
        "invoice_id": receipt.invoice_id.to_string(),
        "amount": receipt.amount,
        "method": receipt.method,
        "receipt_number": receipt.receipt_number,
        "installment": receipt.installment,
        "received_by": receipt.received_by.user_id.to_string(),
        "paid_at": receipt.paid_at,
        "deleted": receipt.deleted,
    })
}

pub fn expense_to_json(expense: &Expense) -> JsonValue {
    json!({
        "id": expense.id_typed().to_string(),
        "expense_number": expense.expense_number(),
        "case_ref": expense.case_ref().map(|c| c.to_string()),
        "category": expense.category(),
        "description": expense.description(),
        "amount": expense.amount(),
        "receipt": expense.receipt().map(|f| f.as_str()),
        "spent_at": expense.spent_at(),
        "recorded_by": expense.recorded_by().map(|u| u.to_string()),
        "voided": expense.is_voided(),
        "void_reason": expense.void_reason(),
    })
}

pub fn staff_to_json(member: &StaffMember) -> JsonValue {
    json!({
        "id": member.id().to_string(),
        "email": member.email(),
        "display_name": member.display_name(),
        "role": member.role(),
        "status": member.status().as_str(),
        "registered_at": member.registered_at(),
    })
}

pub fn reminder_to_json(reminder: &ReminderEntry) -> JsonValue {
    json!({
        "case_id": reminder.case_id.to_string(),
        "stage": reminder.stage,
        "hearing_date": reminder.hearing_date,
        "hearing_time": reminder.hearing_time,
        "location": reminder.location,
        "remind_at": reminder.remind_at,
        "status": reminder.status,
        "dispatched_at": reminder.dispatched_at,
    })
}

pub fn activity_to_json(entry: &ActivityEntry) -> JsonValue {
    json!({
        "event_id": entry.event_id.to_string(),
        "case_ref": entry.case_ref.map(|c| c.to_string()),
        "actor": {
            "user_id": entry.actor.user_id.to_string(),
            "role": entry.actor.role,
        },
        "action": entry.action,
        "description": entry.description,
        "occurred_at": entry.occurred_at,
    })
}
