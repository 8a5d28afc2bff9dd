use parking_lot::{Condvar, Mutex};
use std::pin::pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;

/// One-shot completion signal that can be awaited or blocked on.
#[derive(Debug, Default)]
pub struct Completion {
    done: AtomicBool,
    notify: Notify,
    lock: Mutex<()>,
    signal: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn complete(&self) {
        {
            let _guard = self.lock.lock();
            self.done.store(true, Ordering::Release);
            self.signal.notify_all();
        }
        self.notify.notify_waiters();
    }

    pub fn is_complete(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Returns whether completion happened within `timeout`.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut notified = pin!(self.notify.notified());
        // Register before checking so a concurrent complete() is not missed
        notified.as_mut().enable();
        if self.is_complete() {
            return true;
        }

        tokio::time::timeout(timeout, notified).await.is_ok() || self.is_complete()
    }

    /// Blocks the calling thread. Not for use on a runtime worker that the
    /// completing task also needs.
    pub fn wait_blocking(&self, timeout: Duration) -> bool {
        let deadline = std::time::Instant::now() + timeout;
        let mut guard = self.lock.lock();
        while !self.is_complete() {
            if self.signal.wait_until(&mut guard, deadline).timed_out() {
                return self.is_complete();
            }
        }
        true
    }
}
