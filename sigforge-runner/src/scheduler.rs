//! Background optimization scheduler — one named worker thread.
//!
//! The worker sleeps on a stop channel with `recv_timeout(interval)` and runs
//! its tick whenever the wait times out. Stopping sends on the channel and
//! waits for a completion message for at most the shutdown timeout; a worker
//! that does not finish in time is detached.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, warn};

pub struct Scheduler {
    stop_tx: Sender<()>,
    done_rx: Receiver<()>,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Spawn the worker. `tick` runs once per elapsed `interval`.
    pub fn spawn<F>(name: &str, interval: Duration, mut tick: F) -> std::io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new().name(name.to_string()).spawn(move || {
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            let _ = done_tx.send(());
        })?;

        Ok(Self {
            stop_tx,
            done_rx,
            handle: Some(handle),
        })
    }

    /// Signal the worker and wait up to `timeout`. Returns true if it exited.
    pub fn stop(mut self, timeout: Duration) -> bool {
        let _ = self.stop_tx.send(());
        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(handle) = self.handle.take() {
                    if handle.join().is_err() {
                        warn!("scheduler worker panicked");
                    }
                }
                debug!("scheduler stopped");
                true
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "scheduler did not stop in time, detaching"
                );
                false
            }
        }
    }
}
