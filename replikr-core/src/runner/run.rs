use std::sync::Arc;
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use tokio::sync::Barrier;
use tokio::time::MissedTickBehavior;

use super::gate::IterationGate;
use super::pacer::ArrivalPacer;
use super::signal::{DrainSignal, StartSignal};
use super::worker::{WorkerContext, WorkerWork, run_worker};
use crate::driver::RequestDriver;
use crate::error::Result;
use crate::metrics::{AggregateReport, Aggregator, RecordSink};
use crate::scenario::{Executor, Scenario};
use crate::select::{Selector, UniformRandom};
use crate::warmup::run_warmup;
use replikr_http::HttpClient;

/// Runs a scenario to completion with the default uniform-random selector
/// (seeded from the scenario when a seed is configured) and returns the final
/// report. Individual request failures never fail the run; only configuration
/// errors do.
pub async fn run_scenario(
    scenario: Scenario,
    sink: Option<Arc<dyn RecordSink>>,
) -> Result<AggregateReport> {
    let selector: Arc<dyn Selector> = match scenario.seed {
        Some(seed) => Arc::new(UniformRandom::seeded(seed)),
        None => Arc::new(UniformRandom::new()),
    };
    run_scenario_with(scenario, sink, selector).await
}

/// Like [`run_scenario`], with an explicit selection policy.
pub async fn run_scenario_with(
    scenario: Scenario,
    sink: Option<Arc<dyn RecordSink>>,
    selector: Arc<dyn Selector>,
) -> Result<AggregateReport> {
    scenario.validate()?;

    let scenario = Arc::new(scenario);
    let drain = Arc::new(DrainSignal::new());
    let driver = Arc::new(RequestDriver::new(
        HttpClient::default(),
        &scenario,
        drain.clone(),
    ));
    let aggregator = Arc::new(Aggregator::new(sink));

    // Priming iterations run sequentially before the clock starts; their
    // records never reach the aggregator.
    run_warmup(&scenario, selector.as_ref(), &driver).await;

    let workers = scenario.max_workers();
    let ready_barrier = Arc::new(Barrier::new(workers as usize + 1));
    let start_signal = Arc::new(StartSignal::new());
    let run_started: Arc<OnceLock<Instant>> = Arc::new(OnceLock::new());

    struct OpenLoop {
        pacer: Arc<ArrivalPacer>,
        rate: u64,
        time_unit: Duration,
        duration: Duration,
    }

    let (work, gate, open_loop) = match &scenario.executor {
        Executor::ConstantVus {
            iterations,
            duration,
            ..
        } => {
            let gate = Arc::new(IterationGate::new(*iterations, *duration));
            (
                WorkerWork::Closed { gate: gate.clone() },
                Some(gate),
                None,
            )
        }
        Executor::ConstantArrivalRate {
            rate,
            time_unit,
            duration,
            pre_allocated_vus,
            max_vus,
        } => {
            let pacer = Arc::new(ArrivalPacer::new(*pre_allocated_vus, *max_vus));
            (
                WorkerWork::Open {
                    pacer: pacer.clone(),
                },
                None,
                Some(OpenLoop {
                    pacer,
                    rate: *rate,
                    time_unit: *time_unit,
                    duration: *duration,
                }),
            )
        }
    };

    let mut handles = Vec::with_capacity(workers as usize + 1);
    for worker_id in 1..=workers {
        let ctx = WorkerContext {
            worker_id,
            scenario: scenario.clone(),
            selector: selector.clone(),
            driver: driver.clone(),
            aggregator: aggregator.clone(),
            work: work.clone(),
            run_started: run_started.clone(),
            ready_barrier: ready_barrier.clone(),
            start_signal: start_signal.clone(),
            drain: drain.clone(),
        };
        handles.push(tokio::spawn(run_worker(ctx)));
    }

    // Block until every worker is parked at the start line, then start timing.
    ready_barrier.wait().await;
    let started = Instant::now();
    let _ = run_started.set(started);
    if let Some(gate) = &gate {
        gate.arm(started);
    }
    start_signal.start();

    if let Some(open) = open_loop {
        let aggregator = aggregator.clone();
        handles.push(tokio::spawn(async move {
            let tick = Duration::from_millis(10);
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            let mut carry = 0.0f64;
            let mut last_dropped = 0u64;

            loop {
                interval.tick().await;

                let elapsed = started.elapsed();
                if elapsed >= open.duration {
                    break;
                }

                let unit_s = open.time_unit.as_secs_f64().max(1e-9);
                carry += (open.rate as f64) * (tick.as_secs_f64() / unit_s);
                let due = carry.floor() as u64;
                carry -= due as f64;

                open.pacer.offer(due);

                let dropped = open.pacer.dropped_total();
                let delta = dropped.saturating_sub(last_dropped);
                if delta != 0 {
                    aggregator.record_dropped(delta);
                    last_dropped = dropped;
                }
            }

            // The deadline discards whatever is still pending; account for it.
            open.pacer.close();
            let delta = open.pacer.dropped_total().saturating_sub(last_dropped);
            if delta != 0 {
                aggregator.record_dropped(delta);
            }
        }));
    }

    // Arm the drain: at the deadline no new iterations start, and anything
    // still in flight at deadline + grace is force-cancelled.
    let drain_arm = scenario.total_duration().map(|duration| {
        let drain = drain.clone();
        let grace = scenario.grace_timeout;
        tokio::spawn(async move {
            tokio::time::sleep_until((started + duration).into()).await;
            drain.begin(grace);
        })
    });

    for handle in handles {
        handle.await?;
    }

    if let Some(handle) = drain_arm {
        handle.abort();
        let _ = handle.await;
    }

    Ok(aggregator.summarize(started.elapsed(), scenario.label.clone()))
}
