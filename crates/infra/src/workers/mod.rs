//! Background worker threads.

pub mod projection_worker;
pub mod tick_worker;

pub use projection_worker::{ProjectionWorker, WorkerHandle};
pub use tick_worker::TickWorker;
