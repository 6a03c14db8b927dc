//! Per-stream projection cursors.
//!
//! Each projection remembers the last sequence number it applied per
//! aggregate stream. The bus is at-least-once, so the same envelope can
//! arrive twice (worker restart, rebuild racing live delivery); the cursor
//! turns duplicates into no-ops and turns gaps into hard errors, because a
//! gap means the projection would silently diverge from the store.

use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;

use chancery_core::AggregateId;

/// Failure while applying an envelope to a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("failed to deserialize event payload: {0}")]
    Deserialize(String),

    /// The payload's own aggregate reference disagrees with the envelope.
    #[error("stream mismatch: {0}")]
    StreamMismatch(String),

    #[error("sequence gap (last={last}, found={found})")]
    SequenceGap { last: u64, found: u64 },
}

/// Outcome of a cursor check for an incoming envelope.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CursorDecision {
    /// Next in sequence; apply it and advance the cursor.
    Apply,
    /// Already applied (duplicate delivery); skip silently.
    AlreadySeen,
}

/// Last applied sequence number per aggregate stream.
#[derive(Debug, Default)]
pub struct StreamCursors {
    cursors: RwLock<HashMap<AggregateId, u64>>,
}

impl StreamCursors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decide whether an envelope at `sequence_number` should be applied.
    pub fn check(
        &self,
        aggregate_id: AggregateId,
        sequence_number: u64,
    ) -> Result<CursorDecision, ProjectionError> {
        let last = self.last(aggregate_id);
        if sequence_number == 0 {
            return Err(ProjectionError::SequenceGap {
                last,
                found: sequence_number,
            });
        }
        if sequence_number <= last {
            return Ok(CursorDecision::AlreadySeen);
        }
        if last != 0 && sequence_number != last + 1 {
            return Err(ProjectionError::SequenceGap {
                last,
                found: sequence_number,
            });
        }
        Ok(CursorDecision::Apply)
    }

    pub fn advance(&self, aggregate_id: AggregateId, sequence_number: u64) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.insert(aggregate_id, sequence_number);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut cursors) = self.cursors.write() {
            cursors.clear();
        }
    }

    fn last(&self, aggregate_id: AggregateId) -> u64 {
        match self.cursors.read() {
            Ok(cursors) => *cursors.get(&aggregate_id).unwrap_or(&0),
            Err(_) => 0,
        }
    }
}
