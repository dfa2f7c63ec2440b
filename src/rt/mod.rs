//! Cooperative runtime primitives.
//!
//! One OS thread runs both the task scheduler and the engine's reactor;
//! engine callbacks execute between task polls. [`Condvar`] relies on that
//! run-to-yield guarantee: a task checks its predicate and parks without an
//! intervening suspension point, so a wakeup cannot slip in between.

use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{self, Instant};

/// The monotonic deadline for an operation given its timeout budget.
pub(crate) fn deadline(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + Duration::from_secs(86400 * 365 * 30))
}

/// A condition variable for cooperative tasks.
///
/// Wakeups are edge-triggered: `signal` wakes one waiter, `broadcast` wakes
/// every currently parked waiter. Waits may return spuriously; callers
/// re-check their predicate in a loop.
#[derive(Debug)]
pub(crate) struct Condvar {
    notify: Notify,
}

impl Condvar {
    pub(crate) fn new() -> Condvar {
        Condvar {
            notify: Notify::new(),
        }
    }

    /// Parks the current task until signalled or `deadline` passes.
    pub(crate) async fn wait_deadline(&self, deadline: Instant) -> crate::Result<()> {
        match time::timeout_at(deadline, self.notify.notified()).await {
            Ok(()) => Ok(()),
            Err(_elapsed) => Err(crate::Error::new_timed_out()),
        }
    }

    /// Wakes one waiter, or primes the next wait if none is parked.
    pub(crate) fn signal(&self) {
        self.notify.notify_one();
    }

    /// Wakes every currently parked waiter.
    pub(crate) fn broadcast(&self) {
        self.notify.notify_waiters();
    }
}
