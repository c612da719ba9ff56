use replikr_core::{AggregateReport, IterationEvent, RecordSink};

/// Prints one line per completed request to stdout:
/// `time=<s>,status=<code>,duration=<ms>` plus an optional platform tag.
/// Skipped iterations (no live replica) appear as `status=0,duration=0`.
#[derive(Debug)]
pub(crate) struct LogLineSink {
    platform: Option<String>,
}

impl LogLineSink {
    pub(crate) fn new(platform: Option<String>) -> Self {
        Self { platform }
    }

    fn print(&self, time_s: u64, status: u16, duration_ms: f64) {
        let mut line = format!("time={time_s},status={status},duration={duration_ms:.2}");
        if let Some(platform) = &self.platform {
            line.push_str(",platform=");
            line.push_str(platform);
        }
        println!("{line}");
    }
}

impl RecordSink for LogLineSink {
    fn emit(&self, event: IterationEvent<'_>) {
        match event {
            IterationEvent::Request(record) => {
                let completed = record.started_at + record.latency;
                self.print(
                    completed.as_secs(),
                    record.outcome.status_code(),
                    record.latency.as_secs_f64() * 1000.0,
                );
            }
            IterationEvent::NoTarget { at } => {
                self.print(at.as_secs(), 0, 0.0);
            }
        }
    }
}

pub(crate) fn print_human_readable(report: &AggregateReport) {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let _ = print_human_readable_to(&mut out, report);
}

fn print_human_readable_to(out: &mut impl std::io::Write, report: &AggregateReport) -> std::io::Result<()> {
    writeln!(out)?;
    writeln!(out, "run: {}", report.label)?;
    writeln!(
        out,
        "  duration ........: {:.2}s",
        report.run_duration_ms as f64 / 1000.0
    )?;
    writeln!(out, "  iterations ......: {}", report.iterations_total)?;
    writeln!(out, "  requests ........: {}", report.requests_total)?;
    if report.no_target_total > 0 {
        writeln!(out, "  skipped (no target): {}", report.no_target_total)?;
    }
    if report.dropped_total > 0 {
        writeln!(out, "  dropped .........: {}", report.dropped_total)?;
    }

    for op in &report.operations {
        writeln!(out)?;
        writeln!(
            out,
            "  {} ({} requests, {:.1}% ok)",
            op.op,
            op.count,
            op.success_ratio * 100.0
        )?;
        writeln!(
            out,
            "    latency avg={:.2}ms p50={:.2}ms p95={:.2}ms p99={:.2}ms max={}ms",
            op.mean_ms, op.p50_ms, op.p95_ms, op.p99_ms, op.max_ms
        )?;
    }

    writeln!(out)?;
    writeln!(out, "  overall mean ....: {:.2}ms", report.overall_mean_ms)?;
    Ok(())
}

pub(crate) fn print_json(report: &AggregateReport) -> anyhow::Result<()> {
    let line = serde_json::to_string(report)?;
    println!("{line}");
    Ok(())
}
