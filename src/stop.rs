// Operator stop signal, checked at every timed hold

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Result, RobotError};

/// Cloneable stop flag; clones share the same state
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl StopSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Request a stop; any pending or future hold returns `Cancelled`
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Sleep for `duration`, returning early with `Cancelled` if a stop is requested
    pub async fn hold(&self, duration: Duration) -> Result<()> {
        let mut rx = self.tx.subscribe();
        if *rx.borrow_and_update() {
            return Err(RobotError::Cancelled);
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = rx.wait_for(|stopped| *stopped) => Err(RobotError::Cancelled),
        }
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}
