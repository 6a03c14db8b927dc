use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use super::projection_worker::WorkerHandle;

/// Periodic background worker.
///
/// Runs `tick` every `interval` on its own thread until shut down. Used for
/// the reminder scheduler and the overdue sweep, which poll derived state
/// rather than reacting to single events.
#[derive(Debug)]
pub struct TickWorker;

impl TickWorker {
    pub fn spawn<F>(name: &'static str, interval: Duration, mut tick: F) -> WorkerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let join = thread::Builder::new()
            .name(name.to_string())
            // The shutdown channel doubles as the tick clock: a timeout is a
            // tick, a message or disconnect ends the loop.
            .spawn(move || {
                loop {
                    match shutdown_rx.recv_timeout(interval) {
                        Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
                        Err(mpsc::RecvTimeoutError::Timeout) => tick(),
                    }
                }
            })
            .expect("failed to spawn tick worker thread");

        WorkerHandle::from_parts(shutdown_tx, join)
    }
}
