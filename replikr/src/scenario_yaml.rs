use std::path::Path;
use std::str::FromStr as _;
use std::time::Duration;

use anyhow::Context as _;
use serde::Deserialize;

use replikr_core::{
    Endpoint, Executor, ExecutorKind, MembershipSchedule, MembershipStep, OperationKind, Scenario,
};

use crate::cli::RunArgs;

/// Environment variable overriding the replica pool with a JSON port array,
/// e.g. `ACTIVE_REPLICAS='[2308,2309]'`. Takes precedence over the scenario's
/// membership schedule.
pub(crate) const ACTIVE_REPLICAS_ENV: &str = "ACTIVE_REPLICAS";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct ScenarioYaml {
    pub name: Option<String>,

    /// Report label (first CSV column), e.g. a consistency model name.
    pub label: Option<String>,

    /// Routing header value identifying the target logical service.
    pub service: String,

    /// Routing header name.
    #[serde(default = "default_route_header")]
    pub route_header: String,

    /// Optional platform tag added to requests and live log lines.
    pub platform: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    /// Resource path prefix, e.g. `/api/kv`.
    #[serde(default = "default_resource")]
    pub resource: String,

    /// Executor kind: constant-vus | constant-arrival-rate
    pub executor: Option<String>,

    pub vus: Option<u64>,
    pub iterations: Option<u64>,
    #[serde(default)]
    pub duration: Option<YamlDuration>,

    pub rate: Option<u64>,
    #[serde(default)]
    pub time_unit: Option<YamlDuration>,
    #[serde(rename = "preAllocatedVUs")]
    pub pre_allocated_vus: Option<u64>,
    #[serde(rename = "maxVUs")]
    pub max_vus: Option<u64>,

    /// Operation sequence per iteration, e.g. `[post, get, delete]`.
    #[serde(default)]
    pub operations: Vec<String>,

    pub warmup_iterations: Option<u64>,
    #[serde(default)]
    pub pacing: Option<YamlDuration>,
    #[serde(default)]
    pub grace_timeout: Option<YamlDuration>,
    #[serde(default)]
    pub request_timeout: Option<YamlDuration>,
    pub expect_status: Option<u16>,
    pub seed: Option<u64>,

    /// Static replica pool shortcut; mutually exclusive with `membership`.
    #[serde(default)]
    pub ports: Vec<u16>,

    /// Stepped membership schedule (crash/recovery times).
    #[serde(default)]
    pub membership: Vec<MembershipYaml>,
}

fn default_route_header() -> String {
    "XDN".to_string()
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_resource() -> String {
    "/api/kv".to_string()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub(crate) struct MembershipYaml {
    pub at: YamlDuration,
    pub ports: Vec<u16>,
}

/// Duration as a humantime string (`10s`, `250ms`), integer seconds, or float
/// seconds.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct YamlDuration(Duration);

impl YamlDuration {
    fn into_inner(self) -> Duration {
        self.0
    }
}

impl<'de> Deserialize<'de> for YamlDuration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct V;

        impl serde::de::Visitor<'_> for V {
            type Value = YamlDuration;

            fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                f.write_str("duration as string (e.g. 10s), integer seconds, or float seconds")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(YamlDuration(Duration::from_secs(v)))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if v < 0 {
                    return Err(E::custom("duration cannot be negative"));
                }
                Ok(YamlDuration(Duration::from_secs(v as u64)))
            }

            fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                if !v.is_finite() || v < 0.0 {
                    return Err(E::custom("duration must be a non-negative number"));
                }
                Ok(YamlDuration(Duration::from_secs_f64(v)))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                humantime::parse_duration(v.trim())
                    .map(YamlDuration)
                    .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
            }
        }

        deserializer.deserialize_any(V)
    }
}

pub(crate) fn load_scenario_file(path: &Path) -> anyhow::Result<ScenarioYaml> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read scenario file `{}`", path.display()))?;
    let yaml: ScenarioYaml = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse scenario file `{}`", path.display()))?;
    Ok(yaml)
}

fn active_replicas_from_env(host: &str) -> anyhow::Result<Option<Vec<Endpoint>>> {
    let Ok(raw) = std::env::var(ACTIVE_REPLICAS_ENV) else {
        return Ok(None);
    };

    let ports: Vec<u16> = serde_json::from_str(&raw).with_context(|| {
        format!("failed to parse {ACTIVE_REPLICAS_ENV} (expected a JSON port array)")
    })?;

    Ok(Some(
        ports.into_iter().map(|p| Endpoint::new(host, p)).collect(),
    ))
}

impl ScenarioYaml {
    pub(crate) fn into_scenario(self, args: &RunArgs) -> anyhow::Result<Scenario> {
        let host = args.host.clone().unwrap_or(self.host);

        let membership = if let Some(pool) = active_replicas_from_env(&host)? {
            MembershipSchedule::static_pool(pool)
        } else if !self.membership.is_empty() {
            let steps = self
                .membership
                .into_iter()
                .map(|step| MembershipStep {
                    at: step.at.into_inner(),
                    endpoints: step
                        .ports
                        .into_iter()
                        .map(|p| Endpoint::new(&host, p))
                        .collect(),
                })
                .collect();
            MembershipSchedule::new(steps)?
        } else {
            MembershipSchedule::static_pool(
                self.ports
                    .into_iter()
                    .map(|p| Endpoint::new(&host, p))
                    .collect(),
            )
        };

        let operations = if self.operations.is_empty() {
            vec![OperationKind::Get]
        } else {
            self.operations
                .iter()
                .map(|raw| {
                    OperationKind::from_str(raw)
                        .map_err(|_| anyhow::anyhow!("invalid operation `{raw}` (expected GET/POST/DELETE)"))
                })
                .collect::<anyhow::Result<Vec<_>>>()?
        };

        let executor_name = self.executor.as_deref().unwrap_or("constant-vus");
        let executor_kind = ExecutorKind::from_str(executor_name).map_err(|_| {
            anyhow::anyhow!(
                "invalid executor `{executor_name}` (expected `constant-vus` or `constant-arrival-rate`)"
            )
        })?;

        let duration = args
            .duration
            .or(self.duration.map(YamlDuration::into_inner));

        let executor = match executor_kind {
            ExecutorKind::ConstantVus => Executor::ConstantVus {
                vus: args.vus.or(self.vus).unwrap_or(1),
                iterations: args.iterations.or(self.iterations),
                duration,
            },
            ExecutorKind::ConstantArrivalRate => {
                let pre_allocated_vus = self.pre_allocated_vus.unwrap_or(1);
                Executor::ConstantArrivalRate {
                    rate: args.rate.or(self.rate).unwrap_or(0),
                    time_unit: self
                        .time_unit
                        .map(YamlDuration::into_inner)
                        .unwrap_or(Duration::from_secs(1)),
                    duration: duration
                        .ok_or_else(|| anyhow::anyhow!("constant-arrival-rate requires `duration`"))?,
                    pre_allocated_vus,
                    max_vus: self.max_vus.unwrap_or(pre_allocated_vus),
                }
            }
        };

        let name = self.name.unwrap_or_else(|| "default".to_string());
        let label = args
            .label
            .clone()
            .or(self.label)
            .unwrap_or_else(|| name.clone());

        Ok(Scenario {
            name,
            label,
            resource: self.resource,
            route_header: self.route_header,
            service: self.service,
            platform: self.platform,
            operations,
            executor,
            membership,
            warmup_iterations: args.warmup.or(self.warmup_iterations).unwrap_or(0),
            pacing: self.pacing.map(YamlDuration::into_inner),
            grace_timeout: self
                .grace_timeout
                .map(YamlDuration::into_inner)
                .unwrap_or(Duration::from_secs(2)),
            expect_status: self.expect_status.unwrap_or(200),
            request_timeout: self.request_timeout.map(YamlDuration::into_inner),
            seed: args.seed.or(self.seed),
        })
    }
}
