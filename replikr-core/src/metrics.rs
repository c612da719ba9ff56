use hdrhistogram::Histogram;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::record::{IterationEvent, RequestRecord};
use crate::scenario::OperationKind;

/// Receives live iteration events (per-request records, no-target skips) as
/// they happen. Decoupled from the aggregate store so output channels can be
/// swapped without touching measurement.
pub trait RecordSink: Send + Sync {
    fn emit(&self, event: IterationEvent<'_>);
}

fn new_hist() -> Histogram<u64> {
    // Track up to 60s in microseconds (with 3 sigfigs).
    Histogram::<u64>::new_with_bounds(1, 60_000_000, 3)
        .unwrap_or_else(|err| panic!("failed to init histogram: {err}"))
}

#[derive(Debug)]
struct KindAgg {
    count: AtomicU64,
    success: AtomicU64,
    latency_us: Mutex<Histogram<u64>>,
}

impl Default for KindAgg {
    fn default() -> Self {
        Self {
            count: AtomicU64::new(0),
            success: AtomicU64::new(0),
            latency_us: Mutex::new(new_hist()),
        }
    }
}

/// Per-operation-kind summary. Latency statistics cover successful records
/// only; failures count toward the success ratio.
#[derive(Debug, Clone, serde::Serialize)]
pub struct OperationSummary {
    pub op: OperationKind,
    pub count: u64,
    pub success_count: u64,
    pub success_ratio: f64,
    pub mean_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: u64,
}

/// Read-only summary computed once at the end of a run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AggregateReport {
    pub label: String,
    pub run_duration_ms: u64,
    pub requests_total: u64,
    pub iterations_total: u64,
    pub no_target_total: u64,
    pub dropped_total: u64,
    pub operations: Vec<OperationSummary>,
    /// Per-kind means averaged over all three operation kinds; a kind with no
    /// records contributes zero.
    pub overall_mean_ms: f64,
}

impl AggregateReport {
    /// Mean latency for `kind`; 0 when the kind has no records.
    #[must_use]
    pub fn mean_for(&self, kind: OperationKind) -> f64 {
        self.operations
            .iter()
            .find(|o| o.op == kind)
            .map_or(0.0, |o| o.mean_ms)
    }

    #[must_use]
    pub fn summary_for(&self, kind: OperationKind) -> Option<&OperationSummary> {
        self.operations.iter().find(|o| o.op == kind)
    }
}

/// Thread-safe aggregation of executed request records plus counters for
/// skipped and dropped iterations. Fed by many workers; summarized once after
/// the scheduler stops.
pub struct Aggregator {
    kinds: [KindAgg; 3],
    iterations_total: AtomicU64,
    no_target_total: AtomicU64,
    dropped_total: AtomicU64,
    sink: Option<Arc<dyn RecordSink>>,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("iterations_total", &self.iterations_total)
            .field("no_target_total", &self.no_target_total)
            .field("dropped_total", &self.dropped_total)
            .finish_non_exhaustive()
    }
}

impl Aggregator {
    #[must_use]
    pub fn new(sink: Option<Arc<dyn RecordSink>>) -> Self {
        Self {
            kinds: [KindAgg::default(), KindAgg::default(), KindAgg::default()],
            iterations_total: AtomicU64::new(0),
            no_target_total: AtomicU64::new(0),
            dropped_total: AtomicU64::new(0),
            sink,
        }
    }

    pub fn record(&self, record: RequestRecord) {
        let kind = &self.kinds[record.op.index()];
        kind.count.fetch_add(1, Ordering::Relaxed);

        if record.outcome.is_success() {
            kind.success.fetch_add(1, Ordering::Relaxed);
            let us = record.latency.as_micros().max(1);
            let us = u64::try_from(us).unwrap_or(u64::MAX);
            let mut h = kind
                .latency_us
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            h.saturating_record(us);
        }

        if let Some(sink) = &self.sink {
            sink.emit(IterationEvent::Request(&record));
        }
    }

    pub fn record_iteration(&self) {
        self.iterations_total.fetch_add(1, Ordering::Relaxed);
    }

    /// The membership schedule yielded an empty set: count a skipped iteration.
    pub fn record_no_target(&self, at: Duration) {
        self.no_target_total.fetch_add(1, Ordering::Relaxed);
        if let Some(sink) = &self.sink {
            sink.emit(IterationEvent::NoTarget { at });
        }
    }

    /// Open-loop scheduler could not dispatch within its worker/queue bounds.
    pub fn record_dropped(&self, n: u64) {
        self.dropped_total.fetch_add(n, Ordering::Relaxed);
    }

    #[must_use]
    pub fn no_target_total(&self) -> u64 {
        self.no_target_total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn summarize(&self, run_duration: Duration, label: String) -> AggregateReport {
        let mut operations = Vec::new();

        for op in OperationKind::ALL {
            let kind = &self.kinds[op.index()];
            let count = kind.count.load(Ordering::Relaxed);
            if count == 0 {
                continue;
            }
            let success_count = kind.success.load(Ordering::Relaxed);

            let (mean_ms, p50_ms, p95_ms, p99_ms, max_ms) = {
                let h = kind
                    .latency_us
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner());
                #[allow(clippy::len_zero)]
                if h.len() == 0 {
                    (0.0, 0.0, 0.0, 0.0, 0)
                } else {
                    (
                        h.mean() / 1000.0,
                        h.value_at_quantile(0.50) as f64 / 1000.0,
                        h.value_at_quantile(0.95) as f64 / 1000.0,
                        h.value_at_quantile(0.99) as f64 / 1000.0,
                        h.max() / 1000,
                    )
                }
            };

            operations.push(OperationSummary {
                op,
                count,
                success_count,
                success_ratio: (success_count as f64) / (count as f64),
                mean_ms,
                p50_ms,
                p95_ms,
                p99_ms,
                max_ms,
            });
        }

        // Averaged over all three kinds; a kind with no records contributes 0.
        let overall_mean_ms =
            operations.iter().map(|o| o.mean_ms).sum::<f64>() / (OperationKind::ALL.len() as f64);

        let requests_total = operations.iter().map(|o| o.count).sum();

        AggregateReport {
            label,
            run_duration_ms: run_duration.as_millis() as u64,
            requests_total,
            iterations_total: self.iterations_total.load(Ordering::Relaxed),
            no_target_total: self.no_target_total.load(Ordering::Relaxed),
            dropped_total: self.dropped_total.load(Ordering::Relaxed),
            operations,
            overall_mean_ms,
        }
    }
}
