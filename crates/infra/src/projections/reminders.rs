use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use chancery_cases::{CaseEvent, CaseId};
use chancery_events::EventEnvelope;

use crate::projections::EnvelopeProjection;
use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

/// Dispatch state of a hearing reminder.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderStatus {
    Pending,
    Dispatched,
}

/// A pending or dispatched hearing reminder.
///
/// Keyed by `(case, stage)`: each stage has at most one upcoming hearing, so
/// rescheduling replaces the entry and resets it to pending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReminderEntry {
    pub case_id: CaseId,
    pub stage: u32,
    pub hearing_date: NaiveDate,
    pub hearing_time: NaiveTime,
    pub location: Option<String>,
    pub remind_at: DateTime<Utc>,
    pub status: ReminderStatus,
    pub dispatched_at: Option<DateTime<Utc>>,
}

/// Hearing reminders derived from the case streams.
///
/// The projection only tracks what is due; deciding recipients and talking
/// to the notifier is the scheduler's job (`crate::reminder_scheduler`).
#[derive(Debug)]
pub struct RemindersProjection<S = InMemoryReadStore<(CaseId, u32), ReminderEntry>>
where
    S: ReadStore<(CaseId, u32), ReminderEntry>,
{
    store: S,
    cursors: StreamCursors,
}

impl RemindersProjection {
    pub fn new() -> Self {
        Self::with_store(InMemoryReadStore::new())
    }
}

impl Default for RemindersProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> RemindersProjection<S>
where
    S: ReadStore<(CaseId, u32), ReminderEntry>,
{
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    /// All reminders, soonest first.
    pub fn list(&self) -> Vec<ReminderEntry> {
        let mut entries = self.store.list();
        entries.sort_by_key(|e| e.remind_at);
        entries
    }

    /// Pending reminders whose remind-at time has passed.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<ReminderEntry> {
        self.list()
            .into_iter()
            .filter(|e| e.status == ReminderStatus::Pending && e.remind_at <= now)
            .collect()
    }

    /// Record a successful dispatch.
    ///
    /// A reminder that failed to send stays pending and is retried on the
    /// next scheduler tick.
    pub fn mark_dispatched(&self, case_id: CaseId, stage: u32, at: DateTime<Utc>) {
        let key = (case_id, stage);
        if let Some(mut entry) = self.store.get(&key) {
            entry.status = ReminderStatus::Dispatched;
            entry.dispatched_at = Some(at);
            self.store.upsert(key, entry);
        }
    }
}

impl<S> EnvelopeProjection for RemindersProjection<S>
where
    S: ReadStore<(CaseId, u32), ReminderEntry>,
{
    fn name(&self) -> &'static str {
        "reminders"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::CASE {
            return Ok(());
        }

        match self
            .cursors
            .check(envelope.aggregate_id(), envelope.sequence_number())?
        {
            CursorDecision::AlreadySeen => return Ok(()),
            CursorDecision::Apply => {}
        }

        let ev: CaseEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let case_id = ev.case_id();
        if case_id.0 != envelope.aggregate_id() {
            return Err(ProjectionError::StreamMismatch(format!(
                "event case_id {case_id} does not match envelope aggregate {}",
                envelope.aggregate_id()
            )));
        }

        match &ev {
            CaseEvent::HearingScheduled(e) => {
                self.store.upsert(
                    (e.case_id, e.stage),
                    ReminderEntry {
                        case_id: e.case_id,
                        stage: e.stage,
                        hearing_date: e.date,
                        hearing_time: e.time,
                        location: e.location.clone(),
                        remind_at: e.remind_at,
                        status: ReminderStatus::Pending,
                        dispatched_at: None,
                    },
                );
            }
            CaseEvent::CaseDeleted(e) => {
                let stale: Vec<(CaseId, u32)> = self
                    .store
                    .list()
                    .into_iter()
                    .filter(|r| r.case_id == e.case_id)
                    .map(|r| (r.case_id, r.stage))
                    .collect();
                for key in stale {
                    self.store.remove(&key);
                }
            }
            // Other case events carry no hearing; still advance the cursor.
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
