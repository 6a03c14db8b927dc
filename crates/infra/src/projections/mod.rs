//! Read-model projections over the event bus.
//!
//! Projections subscribe to committed envelopes and fold them into
//! queryable state. The case, invoice, and staff projections store the
//! aggregates themselves, rehydrated through the same `apply` the command
//! path uses, so there is exactly one derivation of state per stream and
//! the read side can never drift from the write side's rules.
//!
//! Every projection is disposable: `clear()` plus a replay from the store
//! reproduces it exactly (see [`replay`]).

pub mod activity;
pub mod cases;
pub mod cursor;
pub mod expenses;
pub mod invoices;
pub mod receipts;
pub mod reminders;
pub mod replay;
pub mod staff_directory;

pub use activity::{ActivityEntry, ActivityProjection};
pub use cases::CasesProjection;
pub use cursor::{CursorDecision, ProjectionError, StreamCursors};
pub use expenses::ExpensesProjection;
pub use invoices::InvoicesProjection;
pub use receipts::{ReceiptEntry, ReceiptsProjection};
pub use reminders::{ReminderEntry, ReminderStatus, RemindersProjection};
pub use replay::{ReplayError, rebuild_all, rebuild_from_scratch};
pub use staff_directory::StaffDirectoryProjection;

use serde_json::Value as JsonValue;

use chancery_events::EventEnvelope;

/// A consumer of committed event envelopes.
///
/// Implementations filter by aggregate type, guard ordering with
/// [`StreamCursors`], and fold the payload into their own state. Envelopes
/// for other aggregate types must be accepted and ignored, so one worker can
/// feed every projection from a single subscription.
pub trait EnvelopeProjection: Send + Sync {
    /// Stable name, used in worker logs and replay reports.
    fn name(&self) -> &'static str;

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError>;

    /// Drop all derived state and cursors ahead of a rebuild.
    fn clear(&self);
}
