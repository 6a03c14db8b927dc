use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value as JsonValue;

use chancery_billing::{InvoiceEvent, InvoiceId, PaymentId, PaymentMethod};
use chancery_core::Actor;
use chancery_events::EventEnvelope;

use crate::projections::EnvelopeProjection;
use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

/// One receipt per recorded payment, across all invoices.
///
/// Deleted payments stay in the ledger with `deleted` set; the receipt
/// number was handed to a client and must remain traceable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReceiptEntry {
    pub payment_id: PaymentId,
    pub invoice_id: InvoiceId,
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub receipt_number: String,
    pub installment: Option<u32>,
    pub received_by: Actor,
    pub paid_at: DateTime<Utc>,
    pub deleted: bool,
}

/// Payment ledger derived from the invoice streams.
#[derive(Debug)]
pub struct ReceiptsProjection<S = InMemoryReadStore<PaymentId, ReceiptEntry>>
where
    S: ReadStore<PaymentId, ReceiptEntry>,
{
    store: S,
    cursors: StreamCursors,
}

impl ReceiptsProjection {
    pub fn new() -> Self {
        Self::with_store(InMemoryReadStore::new())
    }
}

impl Default for ReceiptsProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ReceiptsProjection<S>
where
    S: ReadStore<PaymentId, ReceiptEntry>,
{
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, payment_id: &PaymentId) -> Option<ReceiptEntry> {
        self.store.get(payment_id)
    }

    /// All receipts, most recent payment first.
    pub fn list(&self) -> Vec<ReceiptEntry> {
        let mut receipts = self.store.list();
        receipts.sort_by_key(|r| std::cmp::Reverse(r.paid_at));
        receipts
    }

    pub fn for_invoice(&self, invoice_id: &InvoiceId) -> Vec<ReceiptEntry> {
        self.list()
            .into_iter()
            .filter(|r| r.invoice_id == *invoice_id)
            .collect()
    }
}

impl<S> EnvelopeProjection for ReceiptsProjection<S>
where
    S: ReadStore<PaymentId, ReceiptEntry>,
{
    fn name(&self) -> &'static str {
        "receipts"
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
            InvoiceEvent::PaymentRecorded(e) => {
                self.store.upsert(
                    e.payment_id,
                    ReceiptEntry {
                        payment_id: e.payment_id,
                        invoice_id: e.invoice_id,
                        amount: e.amount,
                        method: e.method.clone(),
                        receipt_number: e.receipt_number.clone(),
                        installment: e.installment,
                        received_by: e.actor,
                        paid_at: e.occurred_at,
                        deleted: false,
                    },
                );
            }
            InvoiceEvent::PaymentDeleted(e) => {
                if let Some(mut entry) = self.store.get(&e.payment_id) {
                    entry.deleted = true;
                    self.store.upsert(e.payment_id, entry);
                }
            }
            // Other invoice events carry no payment; still advance the cursor.
            _ => {}
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
