use std::collections::HashMap;
use std::sync::RwLock;

use chrono::Utc;

use chancery_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// In-memory event store.
///
/// Default store for tests and single-process deployments. Streams live in a
/// `RwLock`-guarded map keyed by aggregate id; the append path takes the write
/// lock for the whole check-and-assign step, which is what makes the
/// optimistic concurrency check race-free here.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<AggregateId, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate that a batch targets exactly one aggregate and return it.
    fn batch_target(events: &[UncommittedEvent]) -> Result<(AggregateId, &str), EventStoreError> {
        let first = events.first().ok_or_else(|| {
            EventStoreError::InvalidAppend("append called with an empty batch".into())
        })?;

        for event in events {
            if event.aggregate_id != first.aggregate_id {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch mixes aggregates {} and {}",
                    first.aggregate_id, event.aggregate_id
                )));
            }
            if event.aggregate_type != first.aggregate_type {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch mixes aggregate types '{}' and '{}'",
                    first.aggregate_type, event.aggregate_type
                )));
            }
        }

        Ok((first.aggregate_id, first.aggregate_type.as_str()))
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let (aggregate_id, aggregate_type) = Self::batch_target(&events)?;

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Backend("event store lock poisoned".into()))?;

        let stream = streams.entry(aggregate_id).or_default();

        if let Some(existing) = stream.first() {
            if existing.aggregate_type != aggregate_type {
                return Err(EventStoreError::AggregateTypeMismatch(format!(
                    "stream {} holds '{}' events, append carried '{}'",
                    aggregate_id, existing.aggregate_type, aggregate_type
                )));
            }
        }

        let current_version = stream.last().map(StoredEvent::stream_version).unwrap_or(0);
        if !expected_version.matches(current_version) {
            return Err(EventStoreError::Concurrency(format!(
                "stream {aggregate_id} is at version {current_version}, expected {expected_version:?}"
            )));
        }

        let recorded_at = Utc::now();
        let mut stored = Vec::with_capacity(events.len());
        for (offset, event) in events.into_iter().enumerate() {
            stored.push(StoredEvent {
                event_id: event.event_id,
                aggregate_id: event.aggregate_id,
                aggregate_type: event.aggregate_type,
                sequence_number: current_version + offset as u64 + 1,
                event_type: event.event_type,
                event_version: event.event_version,
                occurred_at: event.occurred_at,
                recorded_at,
                actor: event.actor,
                payload: event.payload,
            });
        }

        stream.extend(stored.iter().cloned());
        Ok(stored)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("event store lock poisoned".into()))?;

        Ok(streams.get(&aggregate_id).cloned().unwrap_or_default())
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Backend("event store lock poisoned".into()))?;

        let mut all: Vec<StoredEvent> = streams.values().flatten().cloned().collect();
        all.sort_by_key(|e| (e.recorded_at, *e.aggregate_id.as_uuid(), e.sequence_number));
        Ok(all)
    }
}
