use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::metrics::AggregateReport;
use crate::scenario::OperationKind;

/// Renders the tabular report consumed by downstream plotting tools:
/// `label,get_latency,post_latency,delete_latency,overall_latency`.
#[must_use]
pub fn csv_report(report: &AggregateReport) -> String {
    let header = "label,get_latency,post_latency,delete_latency,overall_latency\n";
    format!(
        "{header}{},{:.2},{:.2},{:.2},{:.2}\n",
        report.label,
        report.mean_for(OperationKind::Get),
        report.mean_for(OperationKind::Post),
        report.mean_for(OperationKind::Delete),
        report.overall_mean_ms,
    )
}

fn sanitize_relative_output_path(rel: &str) -> Result<PathBuf> {
    if Path::new(rel).is_absolute() {
        return Err(Error::InvalidOutputPath(rel.to_string()));
    }

    let mut clean = PathBuf::new();
    for c in Path::new(rel).components() {
        match c {
            Component::CurDir => {}
            Component::Normal(p) => clean.push(p),
            // Forbid parent traversal and any absolute/prefix/root components.
            _ => return Err(Error::InvalidOutputPath(rel.to_string())),
        }
    }

    if clean.as_os_str().is_empty() {
        return Err(Error::InvalidOutputPath(rel.to_string()));
    }

    Ok(clean)
}

/// Writes a report file under `base_dir`. The path must be relative and must
/// not contain parent traversal (`..`).
pub fn write_report_file(base_dir: &Path, rel: &str, content: &str) -> Result<()> {
    let rel = sanitize_relative_output_path(rel)?;
    let path = base_dir.join(rel);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::OperationSummary;

    fn sample_report() -> AggregateReport {
        let ops = [
            (OperationKind::Get, 4.5),
            (OperationKind::Post, 9.25),
            (OperationKind::Delete, 6.0),
        ];
        AggregateReport {
            label: "LINEARIZABILITY".to_string(),
            run_duration_ms: 30_000,
            requests_total: 30,
            iterations_total: 10,
            no_target_total: 0,
            dropped_total: 0,
            operations: ops
                .iter()
                .map(|&(op, mean_ms)| OperationSummary {
                    op,
                    count: 10,
                    success_count: 10,
                    success_ratio: 1.0,
                    mean_ms,
                    p50_ms: mean_ms,
                    p95_ms: mean_ms,
                    p99_ms: mean_ms,
                    max_ms: mean_ms as u64,
                })
                .collect(),
            overall_mean_ms: (4.5 + 9.25 + 6.0) / 3.0,
        }
    }

    #[test]
    fn csv_has_header_and_two_decimal_row() {
        let csv = csv_report(&sample_report());
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("label,get_latency,post_latency,delete_latency,overall_latency")
        );
        assert_eq!(
            lines.next(),
            Some("LINEARIZABILITY,4.50,9.25,6.00,6.58")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn write_report_file_rejects_traversal_and_absolute_paths() {
        #[allow(clippy::unwrap_used)]
        let dir = tempfile::tempdir().unwrap();
        let csv = csv_report(&sample_report());

        assert!(write_report_file(dir.path(), "../escape.csv", &csv).is_err());
        assert!(write_report_file(dir.path(), "/abs.csv", &csv).is_err());
        assert!(write_report_file(dir.path(), "", &csv).is_err());

        assert!(write_report_file(dir.path(), "out/results.csv", &csv).is_ok());
        assert!(dir.path().join("out/results.csv").is_file());
    }
}
