//! Overdue sweep over unsettled invoices.
//!
//! Overdue is not decided at read time: the sweep runs `MarkOverdue`
//! through the normal command path for every invoice that could still flip,
//! so status changes are events like everything else and survive replay.
//! The invoice aggregate decides what actually flips; invoices with nothing
//! newly overdue decide nothing and produce no events.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value as JsonValue;
use tracing::{info, warn};

use chancery_billing::{Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, MarkOverdue};
use chancery_core::Actor;
use chancery_events::{EventBus, EventEnvelope};

use crate::command_dispatcher::CommandDispatcher;
use crate::event_store::EventStore;
use crate::projections::InvoicesProjection;
use crate::streams;

/// Outcome of one sweep pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Unsettled invoices examined.
    pub examined: usize,
    /// Invoices whose overall status flipped to overdue.
    pub flipped_invoices: usize,
    /// Installments that newly became overdue.
    pub flipped_installments: usize,
    /// Invoices whose sweep command failed (logged and skipped).
    pub failed: usize,
}

/// Runs the due-date sweep through the command dispatcher.
pub struct OverdueSweeper<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    invoices: Arc<InvoicesProjection>,
}

impl<S, B> OverdueSweeper<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>, invoices: Arc<InvoicesProjection>) -> Self {
        Self {
            dispatcher,
            invoices,
        }
    }

    /// Sweep every unsettled invoice against `as_of`.
    ///
    /// Failures are isolated per invoice: one stuck stream does not stop
    /// the rest of the book from being swept.
    pub fn run_once(&self, as_of: NaiveDate, actor: Actor, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        for invoice in self.invoices.list_unsettled() {
            report.examined += 1;
            let invoice_id = invoice.id_typed();

            let command = InvoiceCommand::MarkOverdue(MarkOverdue {
                invoice_id,
                as_of,
                actor,
                occurred_at: now,
            });

            let committed = match self.dispatcher.dispatch(
                invoice_id.0,
                streams::INVOICE,
                command,
                |id| Invoice::empty(InvoiceId(id)),
            ) {
                Ok(committed) => committed,
                Err(e) => {
                    warn!(invoice_id = %invoice_id, error = %e, "overdue sweep skipped invoice");
                    report.failed += 1;
                    continue;
                }
            };

            for stored in &committed {
                let Ok(ev) = serde_json::from_value::<InvoiceEvent>(stored.payload.clone()) else {
                    continue;
                };
                if let InvoiceEvent::InvoiceMarkedOverdue(e) = ev {
                    if e.invoice_flipped {
                        report.flipped_invoices += 1;
                    }
                    report.flipped_installments += e.installments.len();
                }
            }
        }

        info!(
            as_of = %as_of,
            examined = report.examined,
            flipped_invoices = report.flipped_invoices,
            flipped_installments = report.flipped_installments,
            failed = report.failed,
            "overdue sweep finished"
        );
        report
    }
}
