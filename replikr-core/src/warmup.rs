use std::time::{Duration, Instant};

use crate::driver::RequestDriver;
use crate::scenario::Scenario;
use crate::select::Selector;

/// Runs the scenario's warm-up iterations sequentially, before measurement
/// starts. Records are discarded and failures are logged, never fatal: a cold
/// replica must not abort the run.
pub async fn run_warmup(scenario: &Scenario, selector: &dyn Selector, driver: &RequestDriver) {
    let total = scenario.warmup_iterations;
    if total == 0 {
        return;
    }

    tracing::info!(iterations = total, "starting warm-up");
    let warmup_started = Instant::now();

    for i in 0..total {
        tracing::debug!(progress = i, total, "warm-up progress");

        // Warm-up runs before the run clock starts, so membership is resolved
        // at t=0.
        let available = scenario.membership.available_at(Duration::ZERO);
        let Some(endpoint) = selector.select(available) else {
            tracing::warn!("no replica available during warm-up");
            continue;
        };

        let key = format!("warmup_key_{i}");
        let value = format!("warmup_value_{i}");

        for op in &scenario.operations {
            let record = driver
                .execute(*op, &endpoint, &key, &value, warmup_started)
                .await;
            if !record.outcome.is_success() {
                tracing::warn!(op = %record.op, outcome = ?record.outcome, "warm-up request failed");
            }

            if let Some(pacing) = scenario.pacing {
                tokio::time::sleep(pacing).await;
            }
        }
    }

    tracing::info!("warm-up complete");
}
