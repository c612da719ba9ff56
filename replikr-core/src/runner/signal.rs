use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

/// Opens the gate for all workers at once so the measured run starts without
/// per-worker skew.
#[derive(Debug)]
pub struct StartSignal {
    started: AtomicBool,
    notify: Notify,
}

impl StartSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            started: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        while !self.started.load(Ordering::Acquire) {
            self.notify.notified().await;
        }
    }
}

impl Default for StartSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Draining coordinator. `begin(grace)` is called once when the run deadline is
/// reached; `expired()` resolves at deadline + grace, at which point in-flight
/// requests are force-cancelled and recorded as timeouts.
#[derive(Debug)]
pub struct DrainSignal {
    hard_deadline: OnceLock<Instant>,
    notify: Notify,
}

impl DrainSignal {
    #[must_use]
    pub fn new() -> Self {
        Self {
            hard_deadline: OnceLock::new(),
            notify: Notify::new(),
        }
    }

    pub fn begin(&self, grace: Duration) {
        if self.hard_deadline.set(Instant::now() + grace).is_ok() {
            self.notify.notify_waiters();
        }
    }

    /// Resolves once the grace period has elapsed. Pending forever while the
    /// run is not draining.
    pub async fn expired(&self) {
        loop {
            match self.hard_deadline.get() {
                Some(deadline) => {
                    tokio::time::sleep_until((*deadline).into()).await;
                    return;
                }
                None => self.notify.notified().await,
            }
        }
    }

    #[must_use]
    pub fn expired_now(&self) -> bool {
        self.hard_deadline
            .get()
            .is_some_and(|deadline| Instant::now() >= *deadline)
    }
}

impl Default for DrainSignal {
    fn default() -> Self {
        Self::new()
    }
}
