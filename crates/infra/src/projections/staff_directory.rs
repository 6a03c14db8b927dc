use serde_json::Value as JsonValue;

use chancery_auth::StaffMember;
use chancery_core::{Aggregate, AggregateRoot, UserId};
use chancery_events::EventEnvelope;

use crate::projections::EnvelopeProjection;
use crate::projections::cursor::{CursorDecision, ProjectionError, StreamCursors};
use crate::read_model::{InMemoryReadStore, ReadStore};
use crate::streams;

/// Directory of staff members, one record per registered person.
///
/// Serves two consumers: the API middleware (is the token's subject still an
/// active staff member?) and the reminder scheduler (who should be told about
/// an upcoming hearing?).
#[derive(Debug)]
pub struct StaffDirectoryProjection<S = InMemoryReadStore<UserId, StaffMember>>
where
    S: ReadStore<UserId, StaffMember>,
{
    store: S,
    cursors: StreamCursors,
}

impl StaffDirectoryProjection {
    pub fn new() -> Self {
        Self::with_store(InMemoryReadStore::new())
    }
}

impl Default for StaffDirectoryProjection {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> StaffDirectoryProjection<S>
where
    S: ReadStore<UserId, StaffMember>,
{
    pub fn with_store(store: S) -> Self {
        Self {
            store,
            cursors: StreamCursors::new(),
        }
    }

    pub fn get(&self, staff_id: &UserId) -> Option<StaffMember> {
        self.store.get(staff_id)
    }

    pub fn list(&self) -> Vec<StaffMember> {
        let mut members = self.store.list();
        members.sort_by_key(|m| *m.id().as_uuid());
        members
    }

    pub fn active(&self) -> Vec<StaffMember> {
        self.list().into_iter().filter(|m| m.is_active()).collect()
    }
}

impl<S> EnvelopeProjection for StaffDirectoryProjection<S>
where
    S: ReadStore<UserId, StaffMember>,
{
    fn name(&self) -> &'static str {
        "staff_directory"
    }

    fn apply_envelope(&self, envelope: &EventEnvelope<JsonValue>) -> Result<(), ProjectionError> {
        if envelope.aggregate_type() != streams::STAFF {
            return Ok(());
        }

        match self
            .cursors
            .check(envelope.aggregate_id(), envelope.sequence_number())?
        {
            CursorDecision::AlreadySeen => return Ok(()),
            CursorDecision::Apply => {}
        }

        let ev: chancery_auth::StaffEvent = serde_json::from_value(envelope.payload().clone())
            .map_err(|e| ProjectionError::Deserialize(e.to_string()))?;

        let staff_id = ev.staff_id();
        if *staff_id.as_uuid() != *envelope.aggregate_id().as_uuid() {
            return Err(ProjectionError::StreamMismatch(format!(
                "event staff_id {staff_id} does not match envelope aggregate {}",
                envelope.aggregate_id()
            )));
        }

        let mut member = self
            .store
            .get(&staff_id)
            .unwrap_or_else(|| StaffMember::empty(staff_id));
        member.apply(&ev);
        self.store.upsert(staff_id, member);

        self.cursors
            .advance(envelope.aggregate_id(), envelope.sequence_number());
        Ok(())
    }

    fn clear(&self) {
        self.store.clear();
        self.cursors.clear();
    }
}
