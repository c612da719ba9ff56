use std::time::Duration;

use crate::error::{Error, Result};
use crate::membership::MembershipSchedule;

/// One reachable service instance. Immutable once part of a scenario's pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
        }
    }

    #[must_use]
    pub fn authority(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Logical operation issued against `<resource>/<key>`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
    serde::Serialize,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationKind {
    Get,
    Post,
    Delete,
}

impl OperationKind {
    pub const ALL: [OperationKind; 3] = [Self::Get, Self::Post, Self::Delete];

    pub(crate) fn index(self) -> usize {
        match self {
            Self::Get => 0,
            Self::Post => 1,
            Self::Delete => 2,
        }
    }

    #[must_use]
    pub fn method(self) -> http::Method {
        match self {
            Self::Get => http::Method::GET,
            Self::Post => http::Method::POST,
            Self::Delete => http::Method::DELETE,
        }
    }
}

/// Arrival model for a run.
#[derive(Debug, Clone)]
pub enum Executor {
    /// Closed loop: a fixed number of workers, each starting the next iteration
    /// as soon as the previous one finishes.
    ConstantVus {
        vus: u64,
        iterations: Option<u64>,
        duration: Option<Duration>,
    },

    /// Open loop: iterations are dispatched at a constant rate per `time_unit`,
    /// independent of how long prior iterations take. The worker pool grows from
    /// `pre_allocated_vus` up to `max_vus`; overflow beyond the bounded backlog
    /// is dropped and counted.
    ConstantArrivalRate {
        rate: u64,
        time_unit: Duration,
        duration: Duration,
        pre_allocated_vus: u64,
        max_vus: u64,
    },
}

/// Executor kind (the string form used by scenario files and the CLI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::Display)]
pub enum ExecutorKind {
    #[strum(serialize = "constant-vus", serialize = "constant")]
    ConstantVus,

    #[strum(serialize = "constant-arrival-rate", serialize = "constant-rate")]
    ConstantArrivalRate,
}

/// Top-level run configuration. Constructed once before the run starts and
/// read-only during execution.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    /// Label for the report's first CSV column (e.g. a consistency model name).
    pub label: String,
    /// Resource path prefix, e.g. `/api/kv`.
    pub resource: String,
    /// Routing header identifying the target logical service, e.g. `XDN: bookcatalog`.
    pub route_header: String,
    pub service: String,
    /// Optional `Platform` tag added to requests and live log lines.
    pub platform: Option<String>,
    pub operations: Vec<OperationKind>,
    pub executor: Executor,
    pub membership: MembershipSchedule,
    pub warmup_iterations: u64,
    /// Fixed sleep after each operation (closed-loop pacing).
    pub pacing: Option<Duration>,
    /// How long in-flight requests may keep running after the deadline before
    /// they are force-cancelled and recorded as timeouts.
    pub grace_timeout: Duration,
    pub expect_status: u16,
    pub request_timeout: Option<Duration>,
    /// Seed for the endpoint selector; runs with the same seed, scenario, and
    /// service behavior produce identical reports.
    pub seed: Option<u64>,
}

impl Scenario {
    pub fn validate(&self) -> Result<()> {
        if self.operations.is_empty() {
            return Err(Error::NoOperations);
        }
        if !self.resource.starts_with('/') {
            return Err(Error::InvalidResource(self.resource.clone()));
        }

        match &self.executor {
            Executor::ConstantVus {
                vus,
                iterations,
                duration,
            } => {
                if *vus == 0 {
                    return Err(Error::InvalidVus);
                }
                if *iterations == Some(0) {
                    return Err(Error::InvalidIterations);
                }
                if let Some(d) = duration
                    && d.is_zero()
                {
                    return Err(Error::InvalidDuration);
                }
            }
            Executor::ConstantArrivalRate {
                rate,
                time_unit,
                duration,
                pre_allocated_vus,
                max_vus,
            } => {
                if *rate == 0 {
                    return Err(Error::InvalidRate);
                }
                if time_unit.is_zero() {
                    return Err(Error::InvalidTimeUnit);
                }
                if duration.is_zero() {
                    return Err(Error::InvalidDuration);
                }
                if *pre_allocated_vus == 0 {
                    return Err(Error::InvalidPreAllocatedVus);
                }
                if max_vus < pre_allocated_vus {
                    return Err(Error::InvalidMaxVus);
                }
            }
        }

        Ok(())
    }

    /// Number of worker tasks to spawn for this scenario.
    #[must_use]
    pub fn max_workers(&self) -> u64 {
        match &self.executor {
            Executor::ConstantVus { vus, .. } => *vus,
            Executor::ConstantArrivalRate { max_vus, .. } => *max_vus,
        }
    }

    /// Wall-clock bound of the run, if any (iteration-bounded closed loops have none).
    #[must_use]
    pub fn total_duration(&self) -> Option<Duration> {
        match &self.executor {
            Executor::ConstantVus { duration, .. } => *duration,
            Executor::ConstantArrivalRate { duration, .. } => Some(*duration),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::membership::MembershipSchedule;
    use std::str::FromStr;

    fn base_scenario(executor: Executor) -> Scenario {
        Scenario {
            name: "test".to_string(),
            label: "TEST".to_string(),
            resource: "/api/kv".to_string(),
            route_header: "XDN".to_string(),
            service: "webkv".to_string(),
            platform: None,
            operations: vec![OperationKind::Get],
            executor,
            membership: MembershipSchedule::static_pool(vec![Endpoint::new("localhost", 2302)]),
            warmup_iterations: 0,
            pacing: None,
            grace_timeout: Duration::from_secs(2),
            expect_status: 200,
            request_timeout: None,
            seed: None,
        }
    }

    #[test]
    fn operation_kind_parses_case_insensitively() {
        for (input, want) in [
            ("GET", OperationKind::Get),
            ("get", OperationKind::Get),
            ("Post", OperationKind::Post),
            ("delete", OperationKind::Delete),
        ] {
            assert_eq!(OperationKind::from_str(input).ok(), Some(want));
        }
        assert!(OperationKind::from_str("PATCH").is_err());
    }

    #[test]
    fn executor_kind_accepts_aliases() {
        assert_eq!(
            ExecutorKind::from_str("constant-vus").ok(),
            Some(ExecutorKind::ConstantVus)
        );
        assert_eq!(
            ExecutorKind::from_str("constant-arrival-rate").ok(),
            Some(ExecutorKind::ConstantArrivalRate)
        );
        assert_eq!(
            ExecutorKind::from_str("constant-rate").ok(),
            Some(ExecutorKind::ConstantArrivalRate)
        );
        assert!(ExecutorKind::from_str("ramping-vus").is_err());
    }

    #[test]
    fn validate_rejects_zero_vus() {
        let s = base_scenario(Executor::ConstantVus {
            vus: 0,
            iterations: Some(1),
            duration: None,
        });
        assert!(matches!(s.validate(), Err(Error::InvalidVus)));
    }

    #[test]
    fn validate_rejects_max_vus_below_pre_allocated() {
        let s = base_scenario(Executor::ConstantArrivalRate {
            rate: 10,
            time_unit: Duration::from_secs(1),
            duration: Duration::from_secs(1),
            pre_allocated_vus: 8,
            max_vus: 4,
        });
        assert!(matches!(s.validate(), Err(Error::InvalidMaxVus)));
    }

    #[test]
    fn validate_rejects_empty_operations_and_bad_resource() {
        let mut s = base_scenario(Executor::ConstantVus {
            vus: 1,
            iterations: Some(1),
            duration: None,
        });
        s.operations.clear();
        assert!(matches!(s.validate(), Err(Error::NoOperations)));

        let mut s = base_scenario(Executor::ConstantVus {
            vus: 1,
            iterations: Some(1),
            duration: None,
        });
        s.resource = "api/kv".to_string();
        assert!(matches!(s.validate(), Err(Error::InvalidResource(_))));
    }
}
