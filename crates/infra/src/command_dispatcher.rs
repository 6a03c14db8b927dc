//! Command execution pipeline.
//!
//! Every state change in the system runs through [`CommandDispatcher::dispatch`]:
//!
//! ```text
//! load stream -> rehydrate aggregate -> handle command -> append -> publish
//! ```
//!
//! The dispatcher owns the orchestration so the aggregates stay pure: they
//! never see the store, the bus, or JSON. Optimistic concurrency is enforced
//! by loading the stream version and expecting exactly that version on
//! append; a concurrent writer makes the append fail and the caller retries.
//!
//! Publication happens strictly after a successful append. A publish failure
//! is reported to the caller, but the events are already durable, so
//! downstream consumers can always catch up from the store (at-least-once).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use chancery_core::{Aggregate, AggregateId, DomainError, ExpectedVersion};
use chancery_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Failure of a command dispatch.
///
/// Domain rejections pass through wholesale as [`DispatchError::Domain`] so
/// the API layer can map them by [`DomainError::code`]. Store-level
/// concurrency failures are lifted into their own variant because the remedy
/// (reload and retry) differs from a plain backend failure.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Optimistic concurrency failure; reload the aggregate and retry.
    #[error("concurrent modification: {0}")]
    Concurrency(String),

    /// The aggregate rejected the command.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Historical payloads failed to deserialize into the aggregate's event type.
    #[error("event deserialization failed: {0}")]
    Deserialize(String),

    /// The event store failed.
    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append. The events are durable.
    #[error("event publication failed after commit: {0}")]
    Publish(String),
}

impl From<EventStoreError> for DispatchError {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Reusable command execution engine for event-sourced aggregates.
///
/// Generic over the store and bus so tests run fully in memory and a
/// deployment can combine [`crate::event_store::PostgresEventStore`] with any
/// bus without touching domain code.
#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (S, B) {
        (self.store, self.bus)
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Run one command against one aggregate instance.
    ///
    /// `make_aggregate` builds the blank aggregate the history is replayed
    /// into; domain crates expose an `empty(id)` constructor for this. The
    /// returned events carry their assigned sequence numbers, so
    /// `last().sequence_number` is the aggregate's new version.
    ///
    /// An empty decision from the aggregate is an idempotent no-op: nothing
    /// is appended, nothing is published, `Ok(vec![])` comes back.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: chancery_events::Event + Serialize + DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_id)?;
        validate_loaded_stream(aggregate_id, &history)?;
        let expected = ExpectedVersion::Exact(stream_version(&history));

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;

        let decided = aggregate.handle(&command).map_err(DispatchError::from)?;
        if decided.is_empty() {
            return Ok(vec![]);
        }

        let aggregate_type = aggregate_type.into();
        let uncommitted = decided
            .iter()
            .map(|ev| {
                UncommittedEvent::from_typed(
                    aggregate_id,
                    aggregate_type.clone(),
                    Uuid::now_v7(),
                    ev,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        Ok(committed)
    }
}

fn stream_version(stream: &[StoredEvent]) -> u64 {
    stream.last().map(|e| e.sequence_number).unwrap_or(0)
}

/// Reject streams a buggy backend could hand back: wrong aggregate, zero or
/// non-monotonic sequence numbers.
fn validate_loaded_stream(
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError> {
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id {
            return Err(DispatchError::Store(EventStoreError::Backend(format!(
                "loaded stream contains wrong aggregate_id at index {idx}"
            ))));
        }
        if e.sequence_number == 0 {
            return Err(DispatchError::Store(EventStoreError::Backend(
                "stored event has sequence_number=0".to_string(),
            )));
        }
        if e.sequence_number <= last {
            return Err(DispatchError::Store(EventStoreError::Backend(format!(
                "non-monotonic sequence_number in loaded stream (last={last}, found={})",
                e.sequence_number
            ))));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}
