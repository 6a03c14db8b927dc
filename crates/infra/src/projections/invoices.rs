use serde_json::Value as JsonValue;

use chancery_billing::{Invoice, InvoiceEvent, InvoiceId, InvoiceStatus};
use chancery_core::{Aggregate, AggregateRoot};
use chancery_events::EventEnvelope;

use crate::projections::EnvelopeProjection;
use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

/// Queryable invoice state, one record per invoice.
///
/// Like the case projection, this stores the [`Invoice`] aggregate itself;
/// paid amounts, installment states, and overdue flags are whatever the
/// billing rules computed, never rederived here.
#[derive(Debug)]
pub struct InvoicesProjection<S = InMemoryReadStore<InvoiceId, Invoice>>
where
    S: ReadStore<InvoiceId, Invoice>,
{
    store: S,
    cursors: StreamCursors,
}

impl InvoicesProjection {
    pub fn new() -> Self {
        Self::with_store(InMemoryReadStore::new())
    }
}

impl Default for InvoicesProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> InvoicesProjection<S>
where
    S: ReadStore<InvoiceId, Invoice>,
{
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, invoice_id: &InvoiceId) -> Option<Invoice> {
        self.store.get(invoice_id)
    }

    pub fn list(&self) -> Vec<Invoice> {
        let mut invoices = self.store.list();
        invoices.sort_by_key(|i| std::cmp::Reverse(*i.id().0.as_uuid()));
        invoices
    }

    /// Invoices that could still flip overdue (anything not fully paid).
    pub fn list_unsettled(&self) -> Vec<Invoice> {
        self.list()
            .into_iter()
            .filter(|i| i.status() != InvoiceStatus::Paid)
            .collect()
    }
}

impl<S> EnvelopeProjection for InvoicesProjection<S>
where
    S: ReadStore<InvoiceId, Invoice>,
{
    fn name(&self) -> &'static str {
        "invoices"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::INVOICE {
            return Ok(());
        }

        match self
            .cursors
            .check(envelope.aggregate_id(), envelope.sequence_number())?
        {
            CursorDecision::AlreadySeen => return Ok(()),
            CursorDecision::Apply => {}
        }

        let ev: InvoiceEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let invoice_id = ev.invoice_id();
        if invoice_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(format!(
                "event invoice_id {invoice_id} does not match envelope aggregate {}",
                envelope.aggregate_id()
            )));
        }

        match &ev {
            InvoiceEvent::InvoiceDeleted(_) => {
                self.store.remove(&invoice_id);
            }
            _ => {
                let mut invoice = self
                    .store
                    .get(&invoice_id)
                    .unwrap_or_else(|| Invoice::empty(invoice_id));
                invoice.apply(&ev);
                self.store.upsert(invoice_id, invoice);
            }
        }

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn clear(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
