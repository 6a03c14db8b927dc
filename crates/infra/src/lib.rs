//! Infrastructure layer: event persistence, dispatch, and derived state.
//!
//! Everything here is mechanics. The law lives in the domain crates; this
//! crate loads their streams, runs their decisions, stores what they decide,
//! and keeps the queryable views and background chores in sync with it.

pub mod command_dispatcher;
pub mod event_store;
pub mod notify;
pub mod numbering;
pub mod projections;
pub mod read_model;
pub mod reminder_scheduler;
pub mod streams;
pub mod sweep;
pub mod workers;

pub use command_dispatcher::{CommandDispatcher, DispatchError};
pub use event_store::{
    EventStore, EventStoreError, InMemoryEventStore, PostgresEventStore, StoredEvent,
    UncommittedEvent,
};
pub use notify::{CollectingNotifier, HearingReminder, Notifier, NotifyError, TracingNotifier};
pub use numbering::NumberSeries;
pub use projections::{
    ActivityEntry, ActivityProjection, CasesProjection, EnvelopeProjection, ExpensesProjection,
    InvoicesProjection, ProjectionError, ReceiptEntry, ReceiptsProjection, ReminderEntry,
    ReminderStatus, RemindersProjection, ReplayError, StaffDirectoryProjection, rebuild_all,
    rebuild_from_scratch,
};
pub use read_model::{InMemoryReadStore, ReadStore};
pub use reminder_scheduler::{ReminderRunReport, ReminderScheduler};
pub use sweep::{OverdueSweeper, SweepReport};
pub use workers::{ProjectionWorker, TickWorker, WorkerHandle};
