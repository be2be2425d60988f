//! Process-wide queue for interactive authorization
//!
//! Every flow that opens a browser holds an [`InteractiveGuard`] from before the
//! browser opens until the callback has been handled. Waiters are served in
//! the order they called [`InteractiveLock::acquire`] (tokio's mutex is fair).
//! Connections with valid tokens never touch this lock.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct InteractiveLock {
    queue: Arc<Mutex<()>>,
}

impl InteractiveLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for every earlier ticket to be released
    pub async fn acquire(&self) -> InteractiveGuard {
        let guard = self.queue.clone().lock_owned().await;
        debug!("Interactive authorization lock acquired");
        InteractiveGuard { _guard: guard }
    }
}

/// Ticket at the head of the queue; dropping it lets the next waiter in
#[derive(Debug)]
pub struct InteractiveGuard {
    _guard: OwnedMutexGuard<()>,
}

impl InteractiveGuard {
    pub fn release(self) {
        debug!("Interactive authorization lock released");
    }
}
