use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

/// Single-shot signal set when a task is handed to its group to run.
///
/// Clones observe the same signal.
#[derive(Debug, Clone, Default)]
pub struct Started {
    inner: Arc<StartedInner>,
}

#[derive(Debug, Default)]
struct StartedInner {
    is_set: AtomicBool,
    notify: Notify,
}

impl Started {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.inner.is_set.load(Ordering::Acquire)
    }

    /// Set the signal, waking every waiter.
    ///
    /// Returns `false` if it was already set.
    pub(crate) fn set(&self) -> bool {
        if self.inner.is_set.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Wait until the signal is set. Returns immediately if it already is.
    pub async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent `set` is not missed.
        notified.as_mut().enable();

        if self.is_set() {
            return;
        }
        notified.await;
    }
}
