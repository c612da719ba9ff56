use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Instant;

use tokio::sync::Barrier;

use super::gate::IterationGate;
use super::pacer::ArrivalPacer;
use super::signal::{DrainSignal, StartSignal};
use crate::driver::RequestDriver;
use crate::metrics::Aggregator;
use crate::record::Outcome;
use crate::scenario::Scenario;
use crate::select::Selector;

#[derive(Debug, Clone)]
pub enum WorkerWork {
    /// Closed loop: iterate as fast as the gate allows.
    Closed { gate: Arc<IterationGate> },

    /// Open loop: claim iteration tokens from the pacer.
    Open { pacer: Arc<ArrivalPacer> },
}

#[derive(Debug, Clone)]
pub struct WorkerContext {
    /// 1-based worker index within the run.
    pub worker_id: u64,
    pub scenario: Arc<Scenario>,
    pub selector: Arc<dyn Selector>,
    pub driver: Arc<RequestDriver>,
    pub aggregator: Arc<Aggregator>,
    pub work: WorkerWork,

    pub run_started: Arc<OnceLock<Instant>>,
    pub ready_barrier: Arc<Barrier>,
    pub start_signal: Arc<StartSignal>,
    pub drain: Arc<DrainSignal>,
}

pub(super) async fn run_worker(ctx: WorkerContext) {
    ctx.ready_barrier.wait().await;
    ctx.start_signal.wait().await;

    let started = ctx
        .run_started
        .get()
        .copied()
        .unwrap_or_else(Instant::now);

    let mut iter: u64 = 0;

    match ctx.work.clone() {
        WorkerWork::Closed { gate } => {
            while gate.admit() {
                run_iteration(&ctx, started, iter).await;
                iter = iter.saturating_add(1);
            }
        }
        WorkerWork::Open { pacer } => loop {
            // Only some workers are active at a time (elastic pool policy
            // inside the pacer); the rest park until the pool grows.
            if ctx.worker_id > pacer.active_workers() && !pacer.is_closed() {
                pacer.wait_for_update().await;
                continue;
            }

            if !pacer.claim().await {
                break;
            }
            if ctx.drain.expired_now() {
                break;
            }

            run_iteration(&ctx, started, iter).await;
            iter = iter.saturating_add(1);
        },
    }
}

/// One full iteration: resolve membership, pick a replica, then run the
/// scenario's operation sequence against one generated key.
async fn run_iteration(ctx: &WorkerContext, started: Instant, iter: u64) {
    let elapsed = started.elapsed();
    let available = ctx.scenario.membership.available_at(elapsed);

    let Some(endpoint) = ctx.selector.select(available) else {
        ctx.aggregator.record_no_target(elapsed);
        // Back off instead of hot-looping while no replica is selectable.
        let backoff = ctx
            .scenario
            .pacing
            .unwrap_or(std::time::Duration::from_millis(10));
        tokio::time::sleep(backoff).await;
        return;
    };

    ctx.aggregator.record_iteration();

    let key = format!("key_{}_{}", ctx.worker_id, iter);
    let value = format!("value_{}_{}", ctx.worker_id, iter);

    for op in &ctx.scenario.operations {
        let record = ctx
            .driver
            .execute(*op, &endpoint, &key, &value, started)
            .await;
        let timed_out = record.outcome == Outcome::TimedOut;
        ctx.aggregator.record(record);
        if timed_out {
            return;
        }

        if let Some(pacing) = ctx.scenario.pacing {
            tokio::time::sleep(pacing).await;
        }
    }
}
