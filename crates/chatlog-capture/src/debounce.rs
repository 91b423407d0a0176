//! Single-slot cancellable deferred task.
//!
//! Scheduling replaces whatever was pending. When the delay elapses the
//! task posts a message into the session queue tagged with the generation
//! it was scheduled under; [`Debounce::fire`] accepts only the latest
//! generation, so an expiry that raced a reschedule is dropped.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug)]
pub struct Debounce {
    delay: Duration,
    generation: u64,
    pending: Option<JoinHandle<()>>,
}

impl Debounce {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            generation: 0,
            pending: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel any pending task and start a new one. Must run inside a tokio runtime.
    pub fn schedule<T, F>(&mut self, tx: &mpsc::UnboundedSender<T>, make: F)
    where
        T: Send + 'static,
        F: FnOnce(u64) -> T + Send + 'static,
    {
        self.cancel();
        self.generation += 1;
        let generation = self.generation;
        let delay = self.delay;
        let tx = tx.clone();
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The receiver is gone only when the session has stopped.
            let _ = tx.send(make(generation));
        }));
    }

    /// Drop the pending task, if any.
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    /// Consume an expiry. Returns `true` only for the live generation.
    pub fn fire(&mut self, generation: u64) -> bool {
        if self.pending.is_some() && generation == self.generation {
            self.pending = None;
            true
        } else {
            false
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

impl Drop for Debounce {
    fn drop(&mut self) {
        self.cancel();
    }
}
