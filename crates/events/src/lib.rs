//! `chancery-events` — event contracts and pub/sub mechanics.
//!
//! Domain-agnostic: the case and billing engines define their own typed
//! events and implement [`Event`]; infra moves them around as envelopes.

pub mod bus;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;

pub use bus::{EventBus, Subscription};
pub use envelope::EventEnvelope;
pub use event::Event;
pub use in_memory_bus::{InMemoryBusError, InMemoryEventBus};
