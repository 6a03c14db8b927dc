use serde_json::Value as JsonValue;

use chancery_cases::{Case, CaseEvent, CaseId};
use chancery_core::{Aggregate, AggregateRoot};
use chancery_events::EventEnvelope;

use crate::projections::EnvelopeProjection;
use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

/// Queryable case state, one record per case.
///
/// Stores the [`Case`] aggregate itself and evolves it with the same
/// `apply` the command path uses. The projection adds no interpretation of
/// its own; what the write side knows is exactly what readers see.
#[derive(Debug)]
pub struct CasesProjection<S = InMemoryReadStore<CaseId, Case>>
where
    S: ReadStore<CaseId, Case>,
{
    store: S,
    cursors: StreamCursors,
}

impl CasesProjection {
    pub fn new() -> Self {
        Self::with_store(InMemoryReadStore::new())
    }
}

impl Default for CasesProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> CasesProjection<S>
where
    S: ReadStore<CaseId, Case>,
{
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, case_id: &CaseId) -> Option<Case> {
        self.store.get(case_id)
    }

    /// All live cases, newest first (UUIDv7 ids are time-ordered).
    pub fn list(&self) -> Vec<Case> {
        let mut cases = self.store.list();
        cases.sort_by_key(|c| std::cmp::Reverse(*c.id().0.as_uuid()));
        cases
    }
}

impl<S> EnvelopeProjection for CasesProjection<S>
where
    S: ReadStore<CaseId, Case>,
{
    fn name(&self) -> &'static str {
        "cases"
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
            CaseEvent::CaseDeleted(_) => {
                self.store.remove(&case_id);
            }
            _ => {
                let mut case = self.store.get(&case_id).unwrap_or_else(|| Case::empty(case_id));
                case.apply(&ev);
                self.store.upsert(case_id, case);
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
