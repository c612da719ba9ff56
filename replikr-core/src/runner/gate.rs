use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Admission control for closed-loop workers. Every call to [`admit`] asks
/// whether one more iteration may begin, under a shared iteration budget, a
/// wall-clock deadline, or both.
///
/// [`admit`]: IterationGate::admit
#[derive(Debug)]
pub struct IterationGate {
    admitted: AtomicU64,
    budget: Option<u64>,
    duration: Option<Duration>,
    deadline: OnceLock<Instant>,
}

impl IterationGate {
    #[must_use]
    pub fn new(budget: Option<u64>, duration: Option<Duration>) -> Self {
        Self {
            admitted: AtomicU64::new(0),
            budget,
            duration,
            deadline: OnceLock::new(),
        }
    }

    /// Fixes the wall-clock deadline relative to the measured run start. If
    /// never called, the deadline is initialized lazily from the first
    /// admission check instead.
    pub fn arm(&self, started: Instant) {
        if let Some(duration) = self.duration {
            let _ = self.deadline.set(started + duration);
        }
    }

    /// Whether one more iteration may begin.
    pub fn admit(&self) -> bool {
        if self.past_deadline() {
            return false;
        }

        match self.budget {
            Some(total) => self.admitted.fetch_add(1, Ordering::Relaxed) < total,
            // No budget: the deadline is the only bound. Without either bound
            // the gate admits a single iteration in total.
            None if self.duration.is_some() => true,
            None => self.admitted.fetch_add(1, Ordering::Relaxed) == 0,
        }
    }

    fn past_deadline(&self) -> bool {
        let Some(duration) = self.duration else {
            return false;
        };
        let deadline = self.deadline.get_or_init(|| Instant::now() + duration);
        Instant::now() >= *deadline
    }
}
