use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

pub(crate) fn parse_duration(input: &str) -> Result<Duration, String> {
    let s = input.trim();
    if s.is_empty() {
        return Err("duration cannot be empty (expected e.g. 10s, 250ms, 1m)".to_string());
    }

    let number_end = s
        .char_indices()
        .find(|(_, ch)| !ch.is_ascii_digit())
        .map_or(s.len(), |(idx, _)| idx);

    if number_end == 0 {
        return Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        ));
    }

    let (number_str, unit_str) = s.split_at(number_end);
    let value: u64 = number_str
        .parse()
        .map_err(|_| format!("invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"))?;

    match unit_str.trim() {
        "" | "s" | "sec" | "secs" | "second" | "seconds" => Ok(Duration::from_secs(value)),
        "ms" | "msec" | "msecs" | "millisecond" | "milliseconds" => {
            Ok(Duration::from_millis(value))
        }
        "m" | "min" | "mins" | "minute" | "minutes" => {
            let secs = value
                .checked_mul(60)
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        "h" | "hr" | "hrs" | "hour" | "hours" => {
            let secs = value
                .checked_mul(60)
                .and_then(|v| v.checked_mul(60))
                .ok_or_else(|| format!("duration '{s}' is too large"))?;
            Ok(Duration::from_secs(secs))
        }
        _ => Err(format!(
            "invalid duration '{s}' (expected e.g. 10s, 250ms, 1m)"
        )),
    }
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable summary.
    HumanReadable,
    /// Emit the final report as a single JSON line to stdout.
    Json,
}

#[derive(Debug, Parser)]
#[command(
    name = "replikr",
    version,
    about = "Fault-aware load generation harness for replicated HTTP services",
    long_about = "replikr drives load against a pool of service replicas while a membership \
schedule simulates crashes and recoveries.\n\nA scenario file defines the replica pool, the \
membership schedule, the arrival model (closed-loop constant-vus or open-loop \
constant-arrival-rate), and the per-iteration operation sequence. CLI flags override scenario \
values.",
    after_help = "Examples:\n  replikr run scenarios/crash_two.yaml\n  replikr run scenarios/kv.yaml --vus 4 --duration 30s --report-file results.csv\n  replikr run scenarios/kv.yaml --rate 200 --seed 42 --output json\n  replikr check scenarios/crash_two.yaml"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a load scenario
    Run(RunArgs),

    /// Validate a scenario file without running it
    Check(CheckArgs),
}

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Path to the scenario file (.yaml)
    pub scenario: PathBuf,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the scenario file (.yaml)
    pub scenario: PathBuf,

    /// Override closed-loop worker count
    #[arg(long)]
    pub vus: Option<u64>,

    /// Override open-loop arrival rate (iterations per time unit)
    #[arg(long)]
    pub rate: Option<u64>,

    /// Override iteration budget (closed loop only)
    #[arg(long)]
    pub iterations: Option<u64>,

    /// Override run duration (e.g. 30s, 1m)
    #[arg(long, value_parser = parse_duration)]
    pub duration: Option<Duration>,

    /// Override warm-up iteration count
    #[arg(long)]
    pub warmup: Option<u64>,

    /// Seed for the endpoint selector (reproducible runs)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override the replica host
    #[arg(long)]
    pub host: Option<String>,

    /// Override the report label
    #[arg(long)]
    pub label: Option<String>,

    /// Output format for the final report
    #[arg(long, value_enum, default_value_t = OutputFormat::HumanReadable)]
    pub output: OutputFormat,

    /// Write the final CSV report to this relative path
    #[arg(long)]
    pub report_file: Option<String>,

    /// Suppress per-iteration log lines
    #[arg(long)]
    pub quiet: bool,
}
