use std::time::Duration;

use crate::error::{Error, Result};
use crate::scenario::Endpoint;

/// One step of the membership schedule: from `at` (inclusive) until the next
/// step's start, `endpoints` is the set of reachable replicas. The set may be
/// empty (total outage).
#[derive(Debug, Clone)]
pub struct MembershipStep {
    pub at: Duration,
    pub endpoints: Vec<Endpoint>,
}

/// Time-indexed mapping from elapsed run time to the currently reachable
/// endpoint set, used to simulate replica crashes and recoveries.
///
/// Steps are strictly ordered, the first starts at t=0, and the last is
/// open-ended, so the schedule is total over all non-negative elapsed times.
#[derive(Debug, Clone)]
pub struct MembershipSchedule {
    steps: Vec<MembershipStep>,
}

impl MembershipSchedule {
    pub fn new(steps: Vec<MembershipStep>) -> Result<Self> {
        let Some(first) = steps.first() else {
            return Err(Error::EmptyMembership);
        };
        if !first.at.is_zero() {
            return Err(Error::MembershipStartNonZero(first.at));
        }
        for pair in steps.windows(2) {
            if pair[1].at <= pair[0].at {
                return Err(Error::MembershipUnordered);
            }
        }

        Ok(Self { steps })
    }

    /// A schedule with a single never-changing pool.
    #[must_use]
    pub fn static_pool(endpoints: Vec<Endpoint>) -> Self {
        Self {
            steps: vec![MembershipStep {
                at: Duration::ZERO,
                endpoints,
            }],
        }
    }

    /// The endpoints reachable at `elapsed`. Pure and deterministic; an empty
    /// slice means "no target available", not an error.
    #[must_use]
    pub fn available_at(&self, elapsed: Duration) -> &[Endpoint] {
        let idx = self.steps.partition_point(|s| s.at <= elapsed);
        // The first step starts at 0, so `idx` is always >= 1.
        &self.steps[idx.saturating_sub(1)].endpoints
    }

    #[must_use]
    pub fn steps(&self) -> &[MembershipStep] {
        &self.steps
    }

    #[must_use]
    pub fn is_static(&self) -> bool {
        self.steps.len() == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(port: u16) -> Endpoint {
        Endpoint::new("localhost", port)
    }

    fn two_crash_schedule() -> MembershipSchedule {
        #[allow(clippy::unwrap_used)]
        MembershipSchedule::new(vec![
            MembershipStep {
                at: Duration::ZERO,
                endpoints: vec![ep(2302), ep(2308), ep(2309)],
            },
            MembershipStep {
                at: Duration::from_secs(20),
                endpoints: vec![ep(2308), ep(2309)],
            },
            MembershipStep {
                at: Duration::from_secs(40),
                endpoints: vec![ep(2309)],
            },
        ])
        .unwrap()
    }

    #[test]
    fn available_at_returns_the_interval_set() {
        let schedule = two_crash_schedule();

        assert_eq!(schedule.available_at(Duration::ZERO).len(), 3);
        assert_eq!(schedule.available_at(Duration::from_secs(19)).len(), 3);
        assert_eq!(schedule.available_at(Duration::from_secs(20)).len(), 2);
        assert_eq!(schedule.available_at(Duration::from_secs(39)).len(), 2);
        assert_eq!(schedule.available_at(Duration::from_secs(40)).len(), 1);
        // Last step is open-ended.
        assert_eq!(schedule.available_at(Duration::from_secs(3600)).len(), 1);
    }

    #[test]
    fn available_at_is_deterministic() {
        let schedule = two_crash_schedule();
        let t = Duration::from_millis(20_500);
        assert_eq!(schedule.available_at(t), schedule.available_at(t));
    }

    #[test]
    fn empty_step_means_total_outage() {
        #[allow(clippy::unwrap_used)]
        let schedule = MembershipSchedule::new(vec![
            MembershipStep {
                at: Duration::ZERO,
                endpoints: vec![ep(2302)],
            },
            MembershipStep {
                at: Duration::from_secs(20),
                endpoints: Vec::new(),
            },
        ])
        .unwrap();

        assert!(!schedule.available_at(Duration::from_secs(19)).is_empty());
        assert!(schedule.available_at(Duration::from_secs(20)).is_empty());
        assert!(schedule.available_at(Duration::from_secs(100)).is_empty());
    }

    #[test]
    fn new_rejects_invalid_schedules() {
        assert!(matches!(
            MembershipSchedule::new(Vec::new()),
            Err(Error::EmptyMembership)
        ));

        assert!(matches!(
            MembershipSchedule::new(vec![MembershipStep {
                at: Duration::from_secs(5),
                endpoints: vec![ep(2302)],
            }]),
            Err(Error::MembershipStartNonZero(_))
        ));

        assert!(matches!(
            MembershipSchedule::new(vec![
                MembershipStep {
                    at: Duration::ZERO,
                    endpoints: vec![ep(2302)],
                },
                MembershipStep {
                    at: Duration::ZERO,
                    endpoints: vec![ep(2308)],
                },
            ]),
            Err(Error::MembershipUnordered)
        ));
    }
}
