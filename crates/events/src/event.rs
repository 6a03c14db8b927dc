use chrono::{DateTime, Utc};

use chancery_core::Actor;

/// A domain-agnostic event.
///
/// Events are:
/// - **immutable** (treat them as facts)
/// - **versioned** (schema evolution)
/// - designed to be **append-only**
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable event name/type identifier (e.g. "case.memorandum.approved").
    fn event_type(&self) -> &'static str;

    /// Schema version for this event type.
    fn version(&self) -> u32;

    /// When the event occurred (business time).
    ///
    /// Status derivation during replay must use this, not the wall clock.
    fn occurred_at(&self) -> DateTime<Utc>;

    /// Staff member whose command produced the event.
    ///
    /// Every event in this system is attributable; the activity log and
    /// audit surfaces rely on it without inspecting payloads.
    fn actor(&self) -> Actor;
}
