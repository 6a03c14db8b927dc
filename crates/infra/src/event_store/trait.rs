use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

use chancery_core::{Actor, AggregateId, ExpectedVersion};

/// An event ready for append, before the store has assigned it a position.
///
/// Aggregates hand back typed events; the dispatcher wraps each one in an
/// `UncommittedEvent` via [`UncommittedEvent::from_typed`], which serializes
/// the payload to JSON and lifts the metadata (`event_type`, schema version,
/// `occurred_at`, acting staff member) out of the typed event. The store
/// assigns `sequence_number` and `recorded_at` during append, turning this
/// into a [`StoredEvent`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub actor: Actor,

    pub payload: JsonValue,
}

impl UncommittedEvent {
    /// Wrap a typed domain event with stream metadata.
    ///
    /// Keeps this crate decoupled from the domain enums: the payload travels
    /// as JSON, and `event_type` plus `event_version` are enough to pick the
    /// right deserialization target later.
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: chancery_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            actor: event.actor(),
            payload,
        })
    }
}

/// A persisted event, fixed at a position in its aggregate stream.
///
/// Sequence numbers are assigned by the store during append: per-stream,
/// starting at 1, gapless, and immutable once assigned. They double as the
/// stream version for optimistic concurrency, so "the stream is at version N"
/// and "the last event has `sequence_number` N" mean the same thing.
///
/// `occurred_at` is the domain timestamp (when the command was handled);
/// `recorded_at` is when the store accepted the append. The audit surfaces
/// show the former and order ties by the latter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    /// Monotonically increasing position in the aggregate stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,
    pub recorded_at: DateTime<Utc>,
    pub actor: Actor,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert into an envelope for publication on the event bus.
    pub fn to_envelope(&self) -> chancery_events::EventEnvelope<JsonValue> {
        chancery_events::EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            self.event_type.clone(),
            self.occurred_at,
            self.recorded_at,
            self.actor,
            self.payload.clone(),
        )
    }
}

/// Event store operation failure.
///
/// These are infrastructure errors, distinct from [`chancery_core::DomainError`]:
/// the command itself was fine, the persistence attempt was not.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// Optimistic concurrency check failed; the caller should reload and retry.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// An append targeted a stream whose recorded aggregate type differs.
    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    /// The batch itself is malformed (empty, mixed aggregates, bad payload).
    #[error("invalid append: {0}")]
    InvalidAppend(String),

    /// The storage backend failed.
    #[error("event store backend error: {0}")]
    Backend(String),
}

/// Append-only store of aggregate event streams.
///
/// One stream per aggregate instance, keyed by `(aggregate_type, aggregate_id)`.
/// Appends are atomic per batch and guarded by [`ExpectedVersion`]; loads
/// return events in sequence order. Events are never updated or deleted —
/// "deleting" a case or invoice is itself an event.
pub trait EventStore: Send + Sync {
    /// Append a batch of events to a single aggregate stream.
    ///
    /// Implementations must:
    /// - reject empty or mixed-aggregate batches
    /// - check `expected_version` against the current stream version
    /// - assign gapless `sequence_number`s starting at `current_version + 1`
    /// - persist the whole batch or none of it
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream for one aggregate, in sequence order.
    ///
    /// An unknown aggregate yields an empty vector, not an error; the
    /// dispatcher treats that as "not created yet".
    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load every stored event across all streams.
    ///
    /// Ordered by `(recorded_at, aggregate_id, sequence_number)` so replay
    /// observes a stable global order. Used by projection rebuilds.
    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(aggregate_id)
    }

    fn load_all(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_all()
    }
}
