use serde_json::Value as JsonValue;

use chancery_billing::{Expense, ExpenseEvent, ExpenseId};
use chancery_core::{Aggregate, AggregateRoot};
use chancery_events::EventEnvelope;

use crate::projections::EnvelopeProjection;
use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

/// Queryable expense records.
///
/// Voided expenses stay listed with their voided flag set; the books never
/// lose a row.
#[derive(Debug)]
pub struct ExpensesProjection<S = InMemoryReadStore<ExpenseId, Expense>>
where
    S: ReadStore<ExpenseId, Expense>,
{
    store: S,
    cursors: StreamCursors,
}

impl ExpensesProjection {
    pub fn new() -> Self {
        Self::with_store(InMemoryReadStore::new())
    }
}

impl Default for ExpensesProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ExpensesProjection<S>
where
    S: ReadStore<ExpenseId, Expense>,
{
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, expense_id: &ExpenseId) -> Option<Expense> {
        self.store.get(expense_id)
    }

    pub fn list(&self) -> Vec<Expense> {
        let mut expenses = self.store.list();
        expenses.sort_by_key(|e| std::cmp::Reverse(*e.id().0.as_uuid()));
        expenses
    }
}

impl<S> EnvelopeProjection for ExpensesProjection<S>
where
    S: ReadStore<ExpenseId, Expense>,
{
    fn name(&self) -> &'static str {
        "expenses"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::EXPENSE {
            return Ok(());
        }

        match self
            .cursors
            .check(envelope.aggregate_id(), envelope.sequence_number())?
        {
            CursorDecision::AlreadySeen => return Ok(()),
            CursorDecision::Apply => {}
        }

        let ev: ExpenseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let expense_id = ev.expense_id();
        if expense_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(format!(
                "event expense_id {expense_id} does not match envelope aggregate {}",
                envelope.aggregate_id()
            )));
        }

        let mut expense = self
            .store
            .get(&expense_id)
            .unwrap_or_else(|| Expense::empty(expense_id));
        expense.apply(&ev);
        self.store.upsert(expense_id, expense);

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn clear(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
