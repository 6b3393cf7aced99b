//! Write-once stop signal shared by the dispatch loop, probe tasks and the
//! coordinator.

use std::sync::{Arc, RwLock};
use tokio::sync::Notify;

/// A boolean "stopping" state behind a reader/writer lock.
///
/// Reads are frequent (every dispatched candidate and every probe task checks
/// it); the write happens once. Once set, the flag never reverts. Tasks that
/// must react while parked elsewhere await [`StopFlag::stopped`].
#[derive(Debug, Clone, Default)]
pub struct StopFlag {
    stopping: Arc<RwLock<bool>>,
    wakeup: Arc<Notify>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_stopping(&self) -> bool {
        // A poisoned lock still holds a valid bool.
        match self.stopping.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Sets the flag. Returns `true` only for the call that flipped it.
    pub fn set_stopping(&self) -> bool {
        let mut guard = match self.stopping.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let transitioned = !*guard;
        *guard = true;
        drop(guard);

        if transitioned {
            self.wakeup.notify_waiters();
        }
        transitioned
    }

    /// Resolves once the flag is set, immediately if it already is.
    pub async fn stopped(&self) {
        loop {
            let notified = self.wakeup.notified();
            tokio::pin!(notified);
            // Register before checking so a concurrent set cannot be missed.
            notified.as_mut().enable();

            if self.is_stopping() {
                return;
            }
            notified.await;
        }
    }
}
