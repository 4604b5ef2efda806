//! Background flushing for the `Periodic` write policy.
//!
//! The task is a named thread that wakes every interval and runs a tick closure.
//! Dropping the sender half of its channel (or sending on it) is the cancellation
//! signal; [`AutosaveTask::stop`] does that and joins, so once it returns no tick is
//! running or will run.

use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct AutosaveTask {
    cancel: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl AutosaveTask {
    pub fn spawn<F>(interval: Duration, tick: F) -> std::io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let (cancel, cancelled) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name("notepocket-autosave".to_string())
            .spawn(move || loop {
                match cancelled.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        debug!(interval_ms = interval.as_millis() as u64, "Autosave started");
        Ok(Self {
            cancel: Some(cancel),
            handle: Some(handle),
        })
    }

    /// Cancel and wait for the thread. Idempotent.
    pub fn stop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            // A send error only means the thread already exited.
            let _ = cancel.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Autosave thread panicked");
            }
            debug!("Autosave stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

impl Drop for AutosaveTask {
    fn drop(&mut self) {
        self.stop();
    }
}
