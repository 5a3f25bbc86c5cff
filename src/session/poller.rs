//! Periodic background task
//!
//! Runs a closure on a fixed interval until stopped or until the closure
//! returns false. Used for the player-list refresh while authenticated.

use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};

use crate::error::Result;

/// Handle to a running poller. Dropping it stops the task.
pub struct Poller {
    stop: Option<Sender<()>>,
}

impl Poller {
    /// Start calling `tick` every `interval` on a new thread.
    ///
    /// The first tick happens one interval after the start.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(1);

        thread::Builder::new().name(name.to_string()).spawn(move || loop {
            match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if !tick() {
                        tracing::debug!("Poller finished");
                        break;
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    tracing::debug!("Poller stopped");
                    break;
                }
            }
        })?;

        Ok(Self { stop: Some(stop_tx) })
    }

    /// Signal the task to stop. Does not wait for a tick in progress.
    pub fn stop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.try_send(());
        }
    }
}

impl Drop for Poller {
    fn drop(&mut self) {
        self.stop();
    }
}
