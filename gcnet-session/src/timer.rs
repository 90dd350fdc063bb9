//! One-shot cancellable timers
//!
//! Each queued request owns up to two of these (queue timer, send timer).
//! A timer fires by running its closure — in practice pushing an event into
//! the queue's event channel. Cancellation aborts the underlying task;
//! because the fire can race the cancel, handlers must treat a late fire for
//! an already-completed request as a no-op.

use std::time::Duration;
use tokio::task::JoinHandle;

/// Handle to a one-shot timer task
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Arm a timer that runs `fire` after `after`
    pub fn spawn<F>(after: Duration, fire: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let task = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            fire();
        });
        Self { task }
    }

    /// Cancel the timer; a no-op if it has already fired
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}
