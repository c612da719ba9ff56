use std::sync::Arc;

use replikr_core::runner::run_scenario;
use replikr_core::{RecordSink, csv_report, write_report_file};

use crate::cli::{CheckArgs, OutputFormat, RunArgs};
use crate::exit_codes::ExitCode;
use crate::output::{LogLineSink, print_human_readable, print_json};
use crate::scenario_yaml::load_scenario_file;

#[derive(Debug, thiserror::Error)]
pub(crate) enum RunError {
    /// Bad input: CLI flags or scenario file.
    #[error(transparent)]
    Config(anyhow::Error),

    /// Everything that goes wrong after the configuration was accepted.
    #[error(transparent)]
    Runtime(anyhow::Error),
}

impl RunError {
    pub(crate) fn exit_code(&self) -> ExitCode {
        match self {
            Self::Config(_) => ExitCode::InvalidInput,
            Self::Runtime(_) => ExitCode::RuntimeError,
        }
    }
}

pub(crate) async fn run(args: RunArgs) -> Result<(), RunError> {
    let yaml = load_scenario_file(&args.scenario).map_err(RunError::Config)?;
    let scenario = yaml.into_scenario(&args).map_err(RunError::Config)?;
    scenario
        .validate()
        .map_err(|err| RunError::Config(err.into()))?;

    let sink: Option<Arc<dyn RecordSink>> = if args.quiet {
        None
    } else {
        Some(Arc::new(LogLineSink::new(scenario.platform.clone())))
    };

    tracing::info!(
        scenario = %scenario.name,
        workers = scenario.max_workers(),
        "starting run"
    );

    let report = run_scenario(scenario, sink)
        .await
        .map_err(|err| match err {
            replikr_core::Error::Io(_) | replikr_core::Error::Join(_) => {
                RunError::Runtime(err.into())
            }
            other => RunError::Config(other.into()),
        })?;

    match args.output {
        OutputFormat::HumanReadable => print_human_readable(&report),
        OutputFormat::Json => print_json(&report).map_err(RunError::Runtime)?,
    }

    if let Some(path) = &args.report_file {
        let csv = csv_report(&report);
        let base = std::env::current_dir().map_err(|err| RunError::Runtime(err.into()))?;
        write_report_file(&base, path, &csv).map_err(|err| match err {
            replikr_core::Error::InvalidOutputPath(_) => RunError::Config(err.into()),
            other => RunError::Runtime(other.into()),
        })?;
        tracing::info!(path = %path, "report written");
    }

    Ok(())
}

pub(crate) fn check(args: CheckArgs) -> Result<(), RunError> {
    let yaml = load_scenario_file(&args.scenario).map_err(RunError::Config)?;
    let run_args = crate::cli::RunArgs {
        scenario: args.scenario.clone(),
        vus: None,
        rate: None,
        iterations: None,
        duration: None,
        warmup: None,
        seed: None,
        host: None,
        label: None,
        output: OutputFormat::HumanReadable,
        report_file: None,
        quiet: true,
    };
    let scenario = yaml.into_scenario(&run_args).map_err(RunError::Config)?;
    scenario
        .validate()
        .map_err(|err| RunError::Config(err.into()))?;

    let membership = if scenario.membership.is_static() {
        "static replica pool".to_string()
    } else {
        format!("{} membership step(s)", scenario.membership.steps().len())
    };
    println!(
        "scenario `{}` is valid ({} workers, {membership})",
        scenario.name,
        scenario.max_workers(),
    );
    Ok(())
}
