//! Rebuilding read models from the event store.
//!
//! Projections are disposable by contract: wipe one, feed it every stored
//! event in deterministic order, and it must land in exactly the state the
//! live bus would have produced. Replay order is per-aggregate sequence
//! order, with aggregates visited in a stable (if arbitrary) id order, so
//! two rebuilds of the same store always agree.

use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::info;

use chancery_events::EventEnvelope;

use crate::event_store::{EventStore, EventStoreError};
use crate::projections::EnvelopeProjection;
use crate::projections::cursor::ProjectionError;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("event store error: {0}")]
    Store(#[from] EventStoreError),

    #[error("projection '{name}' failed during replay: {source}")]
    Projection {
        name: &'static str,
        source: ProjectionError,
    },
}

/// Wipe one projection and replay the given envelopes into it.
pub fn rebuild_from_scratch(
    projection: &dyn EnvelopeProjection,
    envelopes: impl IntoIterator<Item = EventEnvelope<JsonValue>>,
) -> Result<(), ReplayError> {
    projection.clear();

    let mut envs: Vec<_> = envelopes.into_iter().collect();
    envs.sort_by_key(|e| (*e.aggregate_id().as_uuid().as_bytes(), e.sequence_number()));

    for env in &envs {
        projection
            .apply_envelope(env)
            .map_err(|source| ReplayError::Projection {
                name: projection.name(),
                source,
            })?;
    }

    info!(
        projection = projection.name(),
        events = envs.len(),
        "projection rebuilt"
    );
    Ok(())
}

/// Rebuild every given projection from the full event store.
pub fn rebuild_all(
    store: &dyn EventStore,
    projections: &[&dyn EnvelopeProjection],
) -> Result<(), ReplayError> {
    let envelopes: Vec<EventEnvelope<JsonValue>> =
        store.load_all()?.iter().map(|e| e.to_envelope()).collect();

    for projection in projections {
        rebuild_from_scratch(*projection, envelopes.iter().cloned())?;
    }
    Ok(())
}
