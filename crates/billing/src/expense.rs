use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use chancery_cases::CaseId;
use chancery_core::{Actor, Aggregate, AggregateId, AggregateRoot, DomainError, FileRef, UserId};
use chancery_events::Event;

/// Expense identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExpenseId(pub AggregateId);

impl ExpenseId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Aggregate root: Expense.
///
/// Firm spending records: court fees, expert fees, travel and the like,
/// optionally tied to a case. Expenses are append-only; a wrong entry is
/// voided, never edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expense {
    id: ExpenseId,
    expense_number: String,
    case_ref: Option<CaseId>,
    category: String,
    description: String,
    amount: Decimal,
    receipt: Option<FileRef>,
    spent_at: Option<NaiveDate>,
    recorded_by: Option<UserId>,
    recorded_at: Option<DateTime<Utc>>,
    voided: bool,
    void_reason: Option<String>,
    version: u64,
    created: bool,
}

impl Expense {
    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: ExpenseId) -> Self {
        Self {
            id,
            expense_number: String::new(),
            case_ref: None,
            category: String::new(),
            description: String::new(),
            amount: Decimal::ZERO,
            receipt: None,
            spent_at: None,
            recorded_by: None,
            recorded_at: None,
            voided: false,
            void_reason: None,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> ExpenseId {
        self.id
    }

    pub fn expense_number(&self) -> &str {
        &self.expense_number
    }

    pub fn case_ref(&self) -> Option<CaseId> {
        self.case_ref
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn receipt(&self) -> Option<&FileRef> {
        self.receipt.as_ref()
    }

    pub fn spent_at(&self) -> Option<NaiveDate> {
        self.spent_at
    }

    pub fn recorded_by(&self) -> Option<UserId> {
        self.recorded_by
    }

    pub fn is_voided(&self) -> bool {
        self.voided
    }

    pub fn void_reason(&self) -> Option<&str> {
        self.void_reason.as_deref()
    }
}

impl AggregateRoot for Expense {
    type Id = ExpenseId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: RecordExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordExpense {
    pub expense_id: ExpenseId,
    pub expense_number: String,
    pub case_ref: Option<CaseId>,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub receipt: Option<FileRef>,
    pub spent_at: NaiveDate,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Command: VoidExpense.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoidExpense {
    pub expense_id: ExpenseId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCommand {
    RecordExpense(RecordExpense),
    VoidExpense(VoidExpense),
}

/// Event: ExpenseRecorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseRecorded {
    pub expense_id: ExpenseId,
    pub expense_number: String,
    pub case_ref: Option<CaseId>,
    pub category: String,
    pub description: String,
    pub amount: Decimal,
    pub receipt: Option<FileRef>,
    pub spent_at: NaiveDate,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

/// Event: ExpenseVoided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseVoided {
    pub expense_id: ExpenseId,
    pub reason: String,
    pub actor: Actor,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseEvent {
    ExpenseRecorded(ExpenseRecorded),
    ExpenseVoided(ExpenseVoided),
}

impl Event for ExpenseEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ExpenseEvent::ExpenseRecorded(_) => "billing.expense.recorded",
            ExpenseEvent::ExpenseVoided(_) => "billing.expense.voided",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => e.occurred_at,
            ExpenseEvent::ExpenseVoided(e) => e.occurred_at,
        }
    }

    fn actor(&self) -> Actor {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => e.actor,
            ExpenseEvent::ExpenseVoided(e) => e.actor,
        }
    }
}

impl ExpenseEvent {
    pub fn expense_id(&self) -> ExpenseId {
        match self {
            ExpenseEvent::ExpenseRecorded(e) => e.expense_id,
            ExpenseEvent::ExpenseVoided(e) => e.expense_id,
        }
    }
}

impl Aggregate for Expense {
    type Command = ExpenseCommand;
    type Event = ExpenseEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            ExpenseEvent::ExpenseRecorded(e) => {
                self.id = e.expense_id;
                self.expense_number = e.expense_number.clone();
                self.case_ref = e.case_ref;
                self.category = e.category.clone();
                self.description = e.description.clone();
                self.amount = e.amount;
                self.receipt = e.receipt.clone();
                self.spent_at = Some(e.spent_at);
                self.recorded_by = Some(e.actor.user_id);
                self.recorded_at = Some(e.occurred_at);
                self.created = true;
            }
            ExpenseEvent::ExpenseVoided(e) => {
                self.voided = true;
                self.void_reason = Some(e.reason.clone());
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            ExpenseCommand::RecordExpense(cmd) => self.handle_record(cmd),
            ExpenseCommand::VoidExpense(cmd) => self.handle_void(cmd),
        }
    }
}

impl Expense {
    fn handle_record(&self, cmd: &RecordExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("expense already exists"));
        }
        if cmd.expense_number.trim().is_empty() {
            return Err(DomainError::validation("expense_number must not be empty"));
        }
        if cmd.category.trim().is_empty() {
            return Err(DomainError::validation("category must not be empty"));
        }
        if cmd.amount <= Decimal::ZERO {
            return Err(DomainError::validation("expense amount must be positive"));
        }

        Ok(vec![ExpenseEvent::ExpenseRecorded(ExpenseRecorded {
            expense_id: cmd.expense_id,
            expense_number: cmd.expense_number.clone(),
            case_ref: cmd.case_ref,
            category: cmd.category.clone(),
            description: cmd.description.clone(),
            amount: cmd.amount,
            receipt: cmd.receipt.clone(),
            spent_at: cmd.spent_at,
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_void(&self, cmd: &VoidExpense) -> Result<Vec<ExpenseEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found("expense"));
        }
        if self.id != cmd.expense_id {
            return Err(DomainError::validation("expense_id mismatch"));
        }
        if self.voided {
            return Err(DomainError::conflict("expense is already void"));
        }
        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("void reason must not be empty"));
        }

        Ok(vec![ExpenseEvent::ExpenseVoided(ExpenseVoided {
            expense_id: cmd.expense_id,
            reason: cmd.reason.clone(),
            actor: cmd.actor,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chancery_core::StaffRole;
    use rust_decimal_macros::dec;

    fn test_expense_id() -> ExpenseId {
        ExpenseId::new(AggregateId::new())
    }

    fn accountant() -> Actor {
        Actor::new(UserId::new(), StaffRole::Accountant)
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn record_cmd(expense_id: ExpenseId, amount: Decimal) -> ExpenseCommand {
        ExpenseCommand::RecordExpense(RecordExpense {
            expense_id,
            expense_number: "EXP-2025-00001".to_string(),
            case_ref: None,
            category: "court_fees".to_string(),
            description: "Filing fee, commercial court".to_string(),
            amount,
            receipt: Some(FileRef::new("fee-receipt.pdf").unwrap()),
            spent_at: NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
            actor: accountant(),
            occurred_at: test_time(),
        })
    }

    #[test]
    fn record_expense_captures_the_spend() {
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);
        let events = expense.handle(&record_cmd(expense_id, dec!(150.00))).unwrap();
        for event in &events {
            expense.apply(event);
        }

        assert_eq!(expense.expense_number(), "EXP-2025-00001");
        assert_eq!(expense.category(), "court_fees");
        assert_eq!(expense.amount(), dec!(150.00));
        assert!(!expense.is_voided());
        assert_eq!(expense.version(), 1);
    }

    #[test]
    fn expense_amount_must_be_positive() {
        let expense_id = test_expense_id();
        let expense = Expense::empty(expense_id);
        let err = expense
            .handle(&record_cmd(expense_id, Decimal::ZERO))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn voiding_requires_a_reason_and_happens_once() {
        let expense_id = test_expense_id();
        let mut expense = Expense::empty(expense_id);
        let events = expense.handle(&record_cmd(expense_id, dec!(80.00))).unwrap();
        for event in &events {
            expense.apply(event);
        }

        let err = expense
            .handle(&ExpenseCommand::VoidExpense(VoidExpense {
                expense_id,
                reason: " ".to_string(),
                actor: accountant(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let events = expense
            .handle(&ExpenseCommand::VoidExpense(VoidExpense {
                expense_id,
                reason: "duplicate entry".to_string(),
                actor: accountant(),
                occurred_at: test_time(),
            }))
            .unwrap();
        for event in &events {
            expense.apply(event);
        }
        assert!(expense.is_voided());
        assert_eq!(expense.void_reason(), Some("duplicate entry"));

        let err = expense
            .handle(&ExpenseCommand::VoidExpense(VoidExpense {
                expense_id,
                reason: "again".to_string(),
                actor: accountant(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn voiding_an_unknown_expense_is_not_found() {
        let expense = Expense::empty(test_expense_id());
        let err = expense
            .handle(&ExpenseCommand::VoidExpense(VoidExpense {
                expense_id: test_expense_id(),
                reason: "never recorded".to_string(),
                actor: accountant(),
                occurred_at: test_time(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound("expense")));
    }
}
