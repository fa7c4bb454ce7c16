//! Periodic premium expiry check
//!
//! `current_user` already expires lapsed premium lazily; the sweep makes sure
//! a long-lived session notices the lapse even when nobody asks.

use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::SessionManager;

/// Interval between expiry checks
pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

/// Handle of a running expiry sweep. Dropping it stops the sweep.
#[derive(Debug)]
pub struct ExpirySweep {
    shutdown_tx: watch::Sender<bool>,
    handle: Option<JoinHandle<()>>,
}

impl ExpirySweep {
    /// Stop the sweep and wait for the task to finish
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, |h| h.is_finished())
    }
}

impl Drop for ExpirySweep {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Spawn a task re-deriving the current user every `interval`.
///
/// The task only holds a weak reference and ends once the session manager
/// is dropped.
pub fn spawn_expiry_sweep(sessions: &Arc<SessionManager>, interval: Duration) -> ExpirySweep {
    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    let sessions: Weak<SessionManager> = Arc::downgrade(sessions);

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = shutdown_rx.changed() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let Some(sessions) = sessions.upgrade() else {
                log::debug!("Session manager dropped; stopping expiry sweep");
                break;
            };

            match sessions.current_user().await {
                Ok(Some(user)) => {
                    log::debug!("Expiry sweep checked account {}", user.id)
                }
                Ok(None) => {}
                Err(e) => log::warn!("Expiry sweep failed: {}", e),
            }
        }
    });

    ExpirySweep {
        shutdown_tx,
        handle: Some(handle),
    }
}
