use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chancery_cases::CaseId;
use chancery_core::{
    Actor, Aggregate, AggregateId, AggregateRoot, ClientId, DomainError, UserId, ValueObject,
};
use chancery_events::Event;

use crate::policy;

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Payment identifier, unique across the firm (not per invoice).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Invoice status.
///
/// Never assigned directly by command handlers: every value is derived by
/// [`policy::invoice_status`] from paid/total/due-date facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Unpaid,
    PartiallyPaid,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Unpaid => "unpaid",
            InvoiceStatus::PartiallyPaid => "partially_paid",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }
}

impl core::fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Installment status, same derivation ladder with a `Pending` base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Pending,
    PartiallyPaid,
    Paid,
    Overdue,
}

impl InstallmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallmentStatus::Pending => "pending",
            InstallmentStatus::PartiallyPaid => "partially_paid",
            InstallmentStatus::Paid => "paid",
            InstallmentStatus::Overdue => "overdue",
        }
    }
}

/// How a payment was made.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer { reference: String },
    Card { last_four: String },
    Check { check_number: String },
}

impl ValueObject for PaymentMethod {}

/// One slice of an installment plan, as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPart {
    pub amount: Decimal,
    pub due_date: NaiveDate,
}

/// Installment tracked on the invoice. Numbers are contiguous from 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub number: u32,
    pub amount: Decimal,
    pub due_date: NaiveDate,
    pub paid_amount: Decimal,
    pub status: InstallmentStatus,
    /// Set when the installment reaches its full amount; cleared if a
    /// payment deletion drops it back below.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Payment on record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub receipt_number: String,
    /// Targeted installment number, if the invoice has a plan.
    pub installment: Option<u32>,
    pub received_by: UserId,
    pub paid_at: DateTime<Utc>,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    invoice_number: String,
    client: Option<ClientId>,
    case_ref: Option<CaseId>,
    issued_by: Option<UserId>,
    issued_at: Option<DateTime<Utc>>,
    total_amount: Decimal,
    paid_amount: Decimal,
    due_date: Option<NaiveDate>,
    status: InvoiceStatus,
    installments: Vec<Installment>,
    payments: Vec<PaymentRecord>,
    deleted: bool,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            invoice_number: String::new(),
            client: None,
            case_ref: None,
            issued_by: None,
            issued_at: None,
            total_amount: Decimal::ZERO,
            paid_amount: Decimal::ZERO,
            due_date: None,
            status: InvoiceStatus::Unpaid,
            installments: Vec::new(),
            payments: Vec::new(),
            deleted: false,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn client(&self) -> Option<ClientId> {
        self.client
    }

    pub fn case_ref(&self) -> Option<CaseId> {
        self.case_ref
    }

    pub fn issued_by(&self) -> Option<UserId> {
        self.issued_by
    }

    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }

    pub fn due_date(&self) -> Option<NaiveDate> {
        self.due_date
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn paid_amount(&self) -> Decimal {
        self.paid_amount
    }

    pub fn remaining_amount(&self) -> Decimal {
        self.total_amount - self.paid_amount
    }

    pub fn installments(&self) -> &[Installment] {
        &self.installments
    }

    pub fn payments(&self) -> &[PaymentRecord] {
        &self.payments
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateInvoice {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub client: ClientId,
    pub case_ref: Option<CaseId>,
    pub total_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    /// Installment plan; empty means the invoice is due as one amount.
    pub installments: Vec<InstallmentPart>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateInvoice. Only legal before any payment is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoice {
    pub invoice_id: InvoiceId,
    pub total_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub installments: Option<Vec<InstallmentPart>>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DefineInstallmentPlan. Replaces any prior plan; only legal
/// before any payment is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefineInstallmentPlan {
    pub invoice_id: InvoiceId,
    pub parts: Vec<InstallmentPart>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: RecordPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPayment {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub receipt_number: String,
    pub installment: Option<u32>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeletePayment (reverses a recorded payment).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePayment {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: MarkOverdue, dispatched by the periodic sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkOverdue {
    pub invoice_id: InvoiceId,
    pub as_of: NaiveDate,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeleteInvoice. Only legal while nothing has been paid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteInvoice {
    pub invoice_id: InvoiceId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    CreateInvoice(CreateInvoice),
    UpdateInvoice(UpdateInvoice),
    DefineInstallmentPlan(DefineInstallmentPlan),
    RecordPayment(RecordPayment),
    DeletePayment(DeletePayment),
    MarkOverdue(MarkOverdue),
    DeleteInvoice(DeleteInvoice),
}

/// Event: InvoiceCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceCreated {
    pub invoice_id: InvoiceId,
    pub invoice_number: String,
    pub client: ClientId,
    pub case_ref: Option<CaseId>,
    pub total_amount: Decimal,
    pub due_date: Option<NaiveDate>,
    pub installments: Vec<InstallmentPart>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceUpdated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceUpdated {
    pub invoice_id: InvoiceId,
    pub total_amount: Option<Decimal>,
    pub due_date: Option<NaiveDate>,
    pub installments: Option<Vec<InstallmentPart>>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InstallmentPlanDefined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentPlanDefined {
    pub invoice_id: InvoiceId,
    pub parts: Vec<InstallmentPart>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecorded {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub receipt_number: String,
    pub installment: Option<u32>,
    pub new_paid_amount: Decimal,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDeleted {
    pub invoice_id: InvoiceId,
    pub payment_id: PaymentId,
    pub amount: Decimal,
    pub new_paid_amount: Decimal,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceMarkedOverdue. Emitted only when something actually flips.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceMarkedOverdue {
    pub invoice_id: InvoiceId,
    pub as_of: NaiveDate,
    pub invoice_flipped: bool,
    /// Installment numbers that newly became overdue.
    pub installments: Vec<u32>,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceDeleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDeleted {
    pub invoice_id: InvoiceId,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceCreated(InvoiceCreated),
    InvoiceUpdated(InvoiceUpdated),
    InstallmentPlanDefined(InstallmentPlanDefined),
    PaymentRecorded(PaymentRecorded),
    PaymentDeleted(PaymentDeleted),
    InvoiceMarkedOverdue(InvoiceMarkedOverdue),
    InvoiceDeleted(InvoiceDeleted),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceCreated(_) => "billing.invoice.created",
            InvoiceEvent::InvoiceUpdated(_) => "billing.invoice.updated",
            InvoiceEvent::InstallmentPlanDefined(_) => "billing.invoice.plan_defined",
            InvoiceEvent::PaymentRecorded(_) => "billing.invoice.payment_recorded",
            InvoiceEvent::PaymentDeleted(_) => "billing.invoice.payment_deleted",
            InvoiceEvent::InvoiceMarkedOverdue(_) => "billing.invoice.marked_overdue",
            InvoiceEvent::InvoiceDeleted(_) => "billing.invoice.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.occurred_at,
            InvoiceEvent::InvoiceUpdated(e) => e.occurred_at,
            InvoiceEvent::InstallmentPlanDefined(e) => e.occurred_at,
            InvoiceEvent::PaymentRecorded(e) => e.occurred_at,
            InvoiceEvent::PaymentDeleted(e) => e.occurred_at,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.occurred_at,
            InvoiceEvent::InvoiceDeleted(e) => e.occurred_at,
        }
    }

    fn actor(&self) -> Actor {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.actor,
            InvoiceEvent::InvoiceUpdated(e) => e.actor,
            InvoiceEvent::InstallmentPlanDefined(e) => e.actor,
            InvoiceEvent::PaymentRecorded(e) => e.actor,
            InvoiceEvent::PaymentDeleted(e) => e.actor,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.actor,
            InvoiceEvent::InvoiceDeleted(e) => e.actor,
        }
    }
}

impl InvoiceEvent {
    pub fn invoice_id(&self) -> InvoiceId {
        match self {
            InvoiceEvent::InvoiceCreated(e) => e.invoice_id,
            InvoiceEvent::InvoiceUpdated(e) => e.invoice_id,
            InvoiceEvent::InstallmentPlanDefined(e) => e.invoice_id,
            InvoiceEvent::PaymentRecorded(e) => e.invoice_id,
            InvoiceEvent::PaymentDeleted(e) => e.invoice_id,
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.invoice_id,
            InvoiceEvent::InvoiceDeleted(e) => e.invoice_id,
        }
    }
}

fn build_installments(parts: &[InstallmentPart]) -> Vec<Installment> {
    parts
        .iter()
        .enumerate()
        .map(|(idx, part)| Installment {
            number: idx as u32 + 1,
            amount: part.amount,
            due_date: part.due_date,
            paid_amount: Decimal::ZERO,
            status: InstallmentStatus::Pending,
            paid_at: None,
        })
        .collect()
}

fn validate_plan(parts: &[InstallmentPart], total: Decimal) -> Result<(), DomainError> {
    if parts.is_empty() {
        return Err(DomainError::validation(
            "installment plan requires at least one installment",
        ));
    }
    let mut sum = Decimal::ZERO;
    for part in parts {
        if part.amount <= Decimal::ZERO {
            return Err(DomainError::validation(
                "installment amount must be positive",
            ));
        }
        sum = sum
            .checked_add(part.amount)
            .ok_or_else(|| DomainError::validation("installment plan amount overflow"))?;
    }
    if sum != total {
        return Err(DomainError::installment_sum(total, sum));
    }
    Ok(())
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceCreated(e) => {
                self.id = e.invoice_id;
                self.invoice_number = e.invoice_number.clone();
                self.client = Some(e.client);
                self.case_ref = e.case_ref;
                self.issued_by = Some(e.actor.user_id);
                self.issued_at = Some(e.occurred_at);
                self.total_amount = e.total_amount;
                self.paid_amount = Decimal::ZERO;
                self.due_date = e.due_date;
                self.installments = build_installments(&e.installments);
                self.created = true;
            }
            InvoiceEvent::InvoiceUpdated(e) => {
                if let Some(total) = e.total_amount {
                    self.total_amount = total;
                }
                if let Some(due) = e.due_date {
                    self.due_date = Some(due);
                }
                if let Some(parts) = &e.installments {
                    self.installments = build_installments(parts);
                }
            }
            InvoiceEvent::InstallmentPlanDefined(e) => {
                self.installments = build_installments(&e.parts);
            }
            InvoiceEvent::PaymentRecorded(e) => {
                self.paid_amount = e.new_paid_amount;
                if let Some(number) = e.installment {
                    if let Some(inst) =
                        self.installments.iter_mut().find(|i| i.number == number)
                    {
                        inst.paid_amount += e.amount;
                        if inst.paid_amount >= inst.amount && inst.paid_at.is_none() {
                            inst.paid_at = Some(e.occurred_at);
                        }
                    }
                }
                self.payments.push(PaymentRecord {
                    payment_id: e.payment_id,
                    amount: e.amount,
                    method: e.method.clone(),
                    receipt_number: e.receipt_number.clone(),
                    installment: e.installment,
                    received_by: e.actor.user_id,
                    paid_at: e.occurred_at,
                });
            }
            InvoiceEvent::PaymentDeleted(e) => {
                self.paid_amount = e.new_paid_amount;
                if let Some(pos) = self
                    .payments
                    .iter()
                    .position(|p| p.payment_id == e.payment_id)
                {
                    let record = self.payments.remove(pos);
                    if let Some(number) = record.installment {
                        if let Some(inst) =
                            self.installments.iter_mut().find(|i| i.number == number)
                        {
                            inst.paid_amount -= record.amount;
                            if inst.paid_amount < inst.amount {
                                inst.paid_at = None;
                            }
                        }
                    }
                }
            }
            InvoiceEvent::InvoiceMarkedOverdue(_) => {
                // Nothing to mutate by hand: recompute below derives the
                // overdue statuses from the event's as_of date.
            }
            InvoiceEvent::InvoiceDeleted(_) => {
                self.deleted = true;
            }
        }

        let as_of = match event {
            InvoiceEvent::InvoiceMarkedOverdue(e) => e.as_of,
            other => other.occurred_at().date_naive(),
        };
        self.recompute(as_of);

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::CreateInvoice(cmd) => self.handle_create(cmd),
            InvoiceCommand::UpdateInvoice(cmd) => self.handle_update(cmd),
            InvoiceCommand::DefineInstallmentPlan(cmd) => self.handle_define_plan(cmd),
            InvoiceCommand::RecordPayment(cmd) => self.handle_record_payment(cmd),
            InvoiceCommand::DeletePayment(cmd) => self.handle_delete_payment(cmd),
            InvoiceCommand::MarkOverdue(cmd) => self.handle_mark_overdue(cmd),
            InvoiceCommand::DeleteInvoice(cmd) => self.handle_delete(cmd),
        }
    }
}

impl Invoice {
    /// Re-derive invoice and installment statuses from current facts.
    ///
    /// Runs at the end of every `apply` with that event's date, so replaying
    /// a stream always lands on the same statuses regardless of when the
    /// replay happens.
    fn recompute(&mut self, as_of: NaiveDate) {
        for inst in &mut self.installments {
            inst.status =
                policy::installment_status(inst.paid_amount, inst.amount, inst.due_date, as_of);
        }
        self.status =
            policy::invoice_status(self.paid_amount, self.total_amount, self.due_date, as_of);
    }

    fn ensure_exists(&self) -> Result<(), DomainError> {
        if !self.created || self.deleted {
            return Err(DomainError::not_found("invoice"));
        }
        Ok(())
    }

    fn ensure_invoice_id(&self, invoice_id: InvoiceId) -> Result<(), DomainError> {
        if self.id != invoice_id {
            return Err(DomainError::validation("invoice_id mismatch"));
        }
        Ok(())
    }

    fn ensure_no_payments(&self, what: &str) -> Result<(), DomainError> {
        if !self.payments.is_empty() {
            return Err(DomainError::conflict(format!(
                "cannot {what} an invoice with recorded payments"
            )));
        }
        Ok(())
    }

    fn plan_total(&self) -> Decimal {
        self.installments.iter().map(|i| i.amount).sum()
    }

    fn handle_create(&self, cmd: &CreateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("invoice already exists"));
        }
        if cmd.invoice_number.trim().is_empty() {
            return Err(DomainError::validation("invoice_number must not be empty"));
        }
        if cmd.total_amount < Decimal::ZERO {
            return Err(DomainError::validation(
                "total_amount must not be negative",
            ));
        }
        if !cmd.installments.is_empty() {
            validate_plan(&cmd.installments, cmd.total_amount)?;
        }

        Ok(vec![InvoiceEvent::InvoiceCreated(InvoiceCreated {
            invoice_id: cmd.invoice_id,
            invoice_number: cmd.invoice_number.clone(),
            client: cmd.client,
            case_ref: cmd.case_ref,
            total_amount: cmd.total_amount,
            due_date: cmd.due_date,
            installments: cmd.installments.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update(&self, cmd: &UpdateInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_invoice_id(cmd.invoice_id)?;
        self.ensure_no_payments("edit")?;

        if cmd.total_amount.is_none() && cmd.due_date.is_none() && cmd.installments.is_none() {
            return Err(DomainError::validation("nothing to update"));
        }
        if let Some(total) = cmd.total_amount {
            if total < Decimal::ZERO {
                return Err(DomainError::validation(
                    "total_amount must not be negative",
                ));
            }
        }

        let effective_total = cmd.total_amount.unwrap_or(self.total_amount);
        if let Some(parts) = &cmd.installments {
            validate_plan(parts, effective_total)?;
        } else if !self.installments.is_empty() && effective_total != self.total_amount {
            // Changing the total invalidates the existing plan unless a
            // matching replacement comes with it.
            return Err(DomainError::installment_sum(
                effective_total,
                self.plan_total(),
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceUpdated(InvoiceUpdated {
            invoice_id: cmd.invoice_id,
            total_amount: cmd.total_amount,
            due_date: cmd.due_date,
            installments: cmd.installments.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_define_plan(
        &self,
        cmd: &DefineInstallmentPlan,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_invoice_id(cmd.invoice_id)?;
        self.ensure_no_payments("replan")?;
        validate_plan(&cmd.parts, self.total_amount)?;

        Ok(vec![InvoiceEvent::InstallmentPlanDefined(
            InstallmentPlanDefined {
                invoice_id: cmd.invoice_id,
                parts: cmd.parts.clone(),
                actor: cmd.actor,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_record_payment(
        &self,
        cmd: &RecordPayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::validation("payment amount must be positive"));
        }
        if cmd.receipt_number.trim().is_empty() {
            return Err(DomainError::validation("receipt_number must not be empty"));
        }
        if self.payments.iter().any(|p| p.payment_id == cmd.payment_id) {
            return Err(DomainError::conflict("payment already recorded"));
        }

        let remaining = self.remaining_amount();
        if cmd.amount > remaining {
            return Err(DomainError::overpayment(cmd.amount, remaining));
        }

        if let Some(number) = cmd.installment {
            let Some(inst) = self.installments.iter().find(|i| i.number == number) else {
                return Err(DomainError::not_found("installment"));
            };
            let inst_remaining = inst.amount - inst.paid_amount;
            if cmd.amount > inst_remaining {
                return Err(DomainError::overpayment(cmd.amount, inst_remaining));
            }
        } else if !self.installments.is_empty() {
            return Err(DomainError::validation(
                "invoice has an installment plan; payment must target an installment",
            ));
        }

        let new_paid_amount = self
            .paid_amount
            .checked_add(cmd.amount)
            .ok_or_else(|| DomainError::validation("paid amount overflow"))?;

        Ok(vec![InvoiceEvent::PaymentRecorded(PaymentRecorded {
            invoice_id: cmd.invoice_id,
            payment_id: cmd.payment_id,
            amount: cmd.amount,
            method: cmd.method.clone(),
            receipt_number: cmd.receipt_number.clone(),
            installment: cmd.installment,
            new_paid_amount,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete_payment(
        &self,
        cmd: &DeletePayment,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        let Some(record) = self
            .payments
            .iter()
            .find(|p| p.payment_id == cmd.payment_id)
        else {
            return Err(DomainError::not_found("payment"));
        };

        Ok(vec![InvoiceEvent::PaymentDeleted(PaymentDeleted {
            invoice_id: cmd.invoice_id,
            payment_id: cmd.payment_id,
            amount: record.amount,
            new_paid_amount: self.paid_amount - record.amount,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_mark_overdue(&self, cmd: &MarkOverdue) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        let invoice_flipped = self.status != InvoiceStatus::Overdue
            && policy::invoice_status(self.paid_amount, self.total_amount, self.due_date, cmd.as_of)
                == InvoiceStatus::Overdue;
        let installments: Vec<u32> = self
            .installments
            .iter()
            .filter(|inst| {
                inst.status != InstallmentStatus::Overdue
                    && policy::installment_status(
                        inst.paid_amount,
                        inst.amount,
                        inst.due_date,
                        cmd.as_of,
                    ) == InstallmentStatus::Overdue
            })
            .map(|inst| inst.number)
            .collect();

        // Nothing newly overdue: the sweep is a no-op for this invoice.
        if !invoice_flipped && installments.is_empty() {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceEvent::InvoiceMarkedOverdue(
            InvoiceMarkedOverdue {
                invoice_id: cmd.invoice_id,
                as_of: cmd.as_of,
                invoice_flipped,
                installments,
                actor: cmd.actor,
                occurred_at: cmd.occurred_at,
            },
        )])
    }

    fn handle_delete(&self, cmd: &DeleteInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        self.ensure_exists()?;
        self.ensure_invoice_id(cmd.invoice_id)?;

        if self.paid_amount > Decimal::ZERO {
            return Err(DomainError::conflict(
                "cannot delete an invoice that has received payments",
            ));
        }

        Ok(vec![InvoiceEvent::InvoiceDeleted(InvoiceDeleted {
            invoice_id: cmd.invoice_id,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}
