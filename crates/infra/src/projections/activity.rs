use std::collections::HashSet;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use chancery_cases::CaseId;
use chancery_core::Actor;
use chancery_events::EventEnvelope;

use crate::projections::EnvelopeProjection;
use crate::projections::cursor::ProjectionError;
use crate::streams;

/// One line in the firm-wide activity log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityEntry {
    pub event_id: Uuid,
    /// Set when the event belongs to a case stream.
    pub case_ref: Option<CaseId>,
    pub actor: Actor,
    /// Machine-readable action, identical to the event type.
    pub action: String,
    /// Human-readable rendering of the action.
    pub description: String,
    pub occurred_at: DateTime<Utc>,
}

/// Append-only activity feed over every stream.
///
/// Unlike the per-aggregate projections this one consumes all aggregate
/// types, so it cannot use per-stream cursors for ordering; it relies on
/// event ids for idempotence instead and sorts by time at query time.
/// Envelope metadata alone is enough to build an entry, which is what keeps
/// the activity log working for event types it has never heard of.
#[derive(Debug, Default)]
pub struct ActivityProjection {
    entries: RwLock<Vec<ActivityEntry>>,
    seen: RwLock<HashSet<Uuid>>,
}

impl ActivityProjection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent entries first, capped at `limit`.
    pub fn recent(&self, limit: usize) -> Vec<ActivityEntry> {
        let entries = match self.entries.read() {
            Ok(e) => e,
            Err(_) => return vec![],
        };
        let mut sorted: Vec<ActivityEntry> = entries.clone();
        sorted.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        sorted.truncate(limit);
        sorted
    }

    /// Entries for one case, most recent first.
    pub fn for_case(&self, case_id: &CaseId, limit: usize) -> Vec<ActivityEntry> {
        self.recent(usize::MAX)
            .into_iter()
            .filter(|e| e.case_ref.as_ref() == Some(case_id))
            .take(limit)
            .collect()
    }
}

/// "billing.invoice.payment_recorded" -> "billing invoice payment recorded".
fn describe(event_type: &str) -> String {
    event_type.replace(['.', '_'], " ")
}

impl EnvelopeProjection for ActivityProjection {
    fn name(&self) -> &'static str {
        "activity"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        {
            let mut seen = match self.seen.write() {
                Ok(s) => s,
                Err(_) => return Ok(()),
            };
            if !seen.insert(envelope.event_id()) {
                return Ok(());
            }
        }

        let case_ref = if envelope.aggregate_type() == streams::CASE {
            Some(CaseId(envelope.aggregate_id()))
        } else {
            None
        };

        let entry = ActivityEntry {
            event_id: envelope.event_id(),
            case_ref,
            actor: envelope.actor(),
            action: envelope.event_type().to_string(),
            description: describe(envelope.event_type()),
            occurred_at: envelope.occurred_at(),
        };

        if let Ok(mut entries) = self.entries.write() {
            entries.push(entry);
        }
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut entries) = self.entries.write() {
            entries.clear();
        }
        if let Ok(mut seen) = self.seen.write() {
            seen.clear();
        }
    }
}
