//! Infrastructure wiring: store, bus, dispatcher, projections, workers.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Datelike, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use chancery_core::{Actor, AggregateId, DomainError, StaffRole, UserId};
use chancery_events::{EventEnvelope, InMemoryEventBus};
use chancery_infra::{
    ActivityProjection, CasesProjection, CommandDispatcher, DispatchError, EnvelopeProjection,
    EventStore, ExpensesProjection, InMemoryEventStore, InvoicesProjection, NumberSeries,
    OverdueSweeper, PostgresEventStore, ProjectionWorker, ReceiptsProjection, ReminderScheduler,
    RemindersProjection, StaffDirectoryProjection, StoredEvent, TickWorker, TracingNotifier,
    WorkerHandle, rebuild_all,
};
use sqlx::PgPool;

type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
type Dispatcher = CommandDispatcher<Arc<dyn EventStore>, Bus>;

/// Everything the route handlers need, behind one `Extension`.
///
/// The dispatcher is generic over the store, so the in-memory and Postgres
/// deployments differ only in which `Arc<dyn EventStore>` gets wired in
/// here; handlers never see the difference.
pub struct AppServices {
    dispatcher: Arc<Dispatcher>,
    pub cases: Arc<CasesProjection>,
    pub invoices: Arc<InvoicesProjection>,
    pub receipts: Arc<ReceiptsProjection>,
    pub expenses: Arc<ExpensesProjection>,
    pub staff: Arc<StaffDirectoryProjection>,
    pub reminders: Arc<RemindersProjection>,
    pub activity: Arc<ActivityProjection>,
    pub case_numbers: NumberSeries,
    pub invoice_numbers: NumberSeries,
    pub receipt_numbers: NumberSeries,
    pub expense_numbers: NumberSeries,
    sweeper: OverdueSweeper<Arc<dyn EventStore>, Bus>,
    workers: Mutex<Vec<WorkerHandle>>,
}

pub async fn build_services() -> AppServices {
    let use_persistent = std::env::var("USE_PERSISTENT_STORES")
        .unwrap_or_else(|_| "false".to_string())
        .parse::<bool>()
        .unwrap_or(false);

    let store: Arc<dyn EventStore> = if use_persistent {
        let database_url = std::env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");
        let pool = PgPool::connect(&database_url)
            .await
            .expect("failed to connect to Postgres");
        Arc::new(PostgresEventStore::new(pool))
    } else {
        Arc::new(InMemoryEventStore::new())
    };

    build_with_store(store)
}

fn build_with_store(store: Arc<dyn EventStore>) -> AppServices {
    let bus: Bus = Arc::new(InMemoryEventBus::new());

    let cases = Arc::new(CasesProjection::new());
    let invoices = Arc::new(InvoicesProjection::new());
    let receipts = Arc::new(ReceiptsProjection::new());
    let expenses = Arc::new(ExpensesProjection::new());
    let staff = Arc::new(StaffDirectoryProjection::new());
    let reminders = Arc::new(RemindersProjection::new());
    let activity = Arc::new(ActivityProjection::new());

    // Catch the read side up with whatever the store already holds. A
    // no-op for a fresh in-memory store, required after a Postgres restart.
    {
        let projections: Vec<&dyn EnvelopeProjection> = vec![
            cases.as_ref(),
            invoices.as_ref(),
            receipts.as_ref(),
            expenses.as_ref(),
            staff.as_ref(),
            reminders.as_ref(),
            activity.as_ref(),
        ];
        if let Err(e) = rebuild_all(store.as_ref(), &projections) {
            tracing::error!(error = %e, "startup projection rebuild failed");
        }
    }

    let case_numbers = NumberSeries::cases();
    let invoice_numbers = NumberSeries::invoices();
    let receipt_numbers = NumberSeries::receipts();
    let expense_numbers = NumberSeries::expenses();
    for case in cases.list() {
        case_numbers.observe(case.case_number());
    }
    for invoice in invoices.list() {
        invoice_numbers.observe(invoice.invoice_number());
    }
    for receipt in receipts.list() {
        receipt_numbers.observe(&receipt.receipt_number);
    }
    for expense in expenses.list() {
        expense_numbers.observe(expense.expense_number());
    }

    let mut workers = Vec::new();
    {
        let cases = Arc::clone(&cases);
        let invoices = Arc::clone(&invoices);
        let receipts = Arc::clone(&receipts);
        let expenses = Arc::clone(&expenses);
        let staff = Arc::clone(&staff);
        let reminders = Arc::clone(&reminders);
        let activity = Arc::clone(&activity);
        workers.push(ProjectionWorker::spawn(
            "projections",
            Arc::clone(&bus),
            move |envelope: EventEnvelope<JsonValue>| -> Result<(), String> {
                let projections: [&dyn EnvelopeProjection; 7] = [
                    cases.as_ref(),
                    invoices.as_ref(),
                    receipts.as_ref(),
                    expenses.as_ref(),
                    staff.as_ref(),
                    reminders.as_ref(),
                    activity.as_ref(),
                ];
                for projection in projections {
                    projection
                        .apply_envelope(&envelope)
                        .map_err(|e| format!("{}: {e}", projection.name()))?;
                }
                Ok(())
            },
        ));
    }

    let dispatcher = Arc::new(CommandDispatcher::new(Arc::clone(&store), Arc::clone(&bus)));
    let sweeper = OverdueSweeper::new(Arc::clone(&dispatcher), Arc::clone(&invoices));

    let sweep_interval = env_u64("SWEEP_INTERVAL_SECS", 0);
    if sweep_interval > 0 {
        let sweeper = OverdueSweeper::new(Arc::clone(&dispatcher), Arc::clone(&invoices));
        workers.push(TickWorker::spawn(
            "overdue-sweep",
            Duration::from_secs(sweep_interval),
            move || {
                let now = Utc::now();
                let report = sweeper.run_once(now.date_naive(), system_actor(), now);
                tracing::info!(
                    examined = report.examined,
                    flipped_invoices = report.flipped_invoices,
                    flipped_installments = report.flipped_installments,
                    failed = report.failed,
                    "overdue sweep tick"
                );
            },
        ));
    }

    let reminder_tick = env_u64("REMINDER_TICK_MS", 1000);
    if reminder_tick > 0 {
        let scheduler = ReminderScheduler::new(
            Arc::clone(&reminders),
            Arc::clone(&cases),
            Arc::clone(&staff),
            Arc::new(TracingNotifier::new()),
        );
        workers.push(TickWorker::spawn(
            "hearing-reminders",
            Duration::from_millis(reminder_tick),
            move || {
                let report = scheduler.run_once(Utc::now());
                if report.due > 0 {
                    tracing::info!(
                        due = report.due,
                        dispatched = report.dispatched,
                        failed = report.failed,
                        "reminder tick"
                    );
                }
            },
        ));
    }

    AppServices {
        dispatcher,
        cases,
        invoices,
        receipts,
        expenses,
        staff,
        reminders,
        activity,
        case_numbers,
        invoice_numbers,
        receipt_numbers,
        expense_numbers,
        sweeper,
        workers: Mutex::new(workers),
    }
}

impl AppServices {
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &'static str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: chancery_core::Aggregate<Error = DomainError>,
        A::Event: chancery_events::Event + serde::Serialize + serde::de::DeserializeOwned,
    {
        self.dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)
    }

    /// Run the overdue sweep once, on behalf of `actor`.
    pub fn sweep_overdue(&self, actor: Actor) -> chancery_infra::SweepReport {
        let now = Utc::now();
        self.sweeper.run_once(now.date_naive(), actor, now)
    }

    pub fn current_year(&self) -> i32 {
        Utc::now().year()
    }

    /// Stop background workers. Used by tests; the binary runs until killed.
    pub fn shutdown_workers(&self) {
        let handles = match self.workers.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(_) => return,
        };
        for handle in handles {
            handle.shutdown();
        }
    }
}

/// Actor recorded on events appended by background maintenance.
fn system_actor() -> Actor {
    Actor::new(UserId::from_uuid(Uuid::nil()), StaffRole::Accountant)
}

fn env_u64(name: &str, default: u64) -> u64 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
