use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::Notify;

/// Token bucket for the open-loop executor. A feeder task offers iteration
/// tokens at the configured rate; workers claim them one by one. At most
/// `max_workers` tokens may be pending at once; offers beyond that are dropped
/// and counted as capacity-exceeded.
///
/// The pool is elastic: at least `pre_allocated` workers stay active, and the
/// active count grows toward `max_workers` while tokens are pending.
///
/// `close()` is called at the run deadline. It discards every still-pending
/// token (counted as dropped), so no new iteration can begin after the
/// deadline; only work already claimed keeps running into the grace window.
#[derive(Debug)]
pub struct ArrivalPacer {
    pending: AtomicU64,
    dropped_total: AtomicU64,

    active_workers: AtomicU64,
    pre_allocated: u64,
    max_workers: u64,

    closed: AtomicBool,
    notify: Notify,
}

impl ArrivalPacer {
    #[must_use]
    pub fn new(pre_allocated: u64, max_workers: u64) -> Self {
        Self {
            pending: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            active_workers: AtomicU64::new(pre_allocated),
            pre_allocated,
            max_workers,
            closed: AtomicBool::new(false),
            notify: Notify::new(),
        }
    }

    /// Stops dispatch: discards the pending backlog (counted as dropped) and
    /// releases every waiting worker.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        let discarded = self.pending.swap(0, Ordering::Relaxed);
        if discarded != 0 {
            self.dropped_total.fetch_add(discarded, Ordering::Relaxed);
        }
        self.notify.notify_waiters();
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn active_workers(&self) -> u64 {
        self.active_workers.load(Ordering::Relaxed)
    }

    /// Offers `due` new iteration tokens. Tokens beyond the pending bound are
    /// dropped (backpressure, not a crash). No-op after `close()`.
    pub fn offer(&self, due: u64) {
        if self.is_closed() {
            return;
        }

        if due != 0 {
            let pending = self.pending.load(Ordering::Relaxed);
            let capacity = self.max_workers.max(1).saturating_sub(pending);
            let accepted = due.min(capacity);
            let dropped = due - accepted;

            if accepted != 0 {
                self.pending.fetch_add(accepted, Ordering::Relaxed);
            }
            if dropped != 0 {
                self.dropped_total.fetch_add(dropped, Ordering::Relaxed);
            }
        }

        self.resize_pool();
        self.notify.notify_waiters();
    }

    fn resize_pool(&self) {
        // Keep at least `pre_allocated` active; while tokens are pending grow
        // to pending+1 (capped at max); shrink back once the backlog clears.
        let pending = self.pending.load(Ordering::Relaxed);
        let desired = if pending == 0 {
            self.pre_allocated
        } else {
            self.pre_allocated.max(pending.saturating_add(1))
        };

        self.active_workers
            .store(desired.clamp(1, self.max_workers), Ordering::Relaxed);
    }

    fn take(&self) -> bool {
        self.pending
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |p| p.checked_sub(1))
            .is_ok()
    }

    /// Claims the next iteration token, waiting until one is offered. Returns
    /// `false` once the pacer is closed.
    pub async fn claim(&self) -> bool {
        loop {
            // Register the waiter before checking, so a notify between the
            // check and the await is not lost.
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.take() {
                return true;
            }
            if self.is_closed() {
                return false;
            }

            notified.await;
        }
    }

    /// Parks until the next offer or close.
    pub async fn wait_for_update(&self) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_closed() {
            return;
        }
        notified.await;
    }
}
