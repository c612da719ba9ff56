use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use replikr_core::runner::run_scenario;
use replikr_core::{
    Endpoint, Executor, MembershipSchedule, OperationKind, Scenario,
};
use replikr_testserver::TestServer;

fn scenario(endpoints: Vec<Endpoint>, executor: Executor) -> Scenario {
    Scenario {
        name: "closed-loop".to_string(),
        label: "CLOSED".to_string(),
        resource: "/api/kv".to_string(),
        route_header: "XDN".to_string(),
        service: "webkv".to_string(),
        platform: None,
        operations: vec![
            OperationKind::Post,
            OperationKind::Get,
            OperationKind::Delete,
        ],
        executor,
        membership: MembershipSchedule::static_pool(endpoints),
        warmup_iterations: 0,
        pacing: None,
        grace_timeout: Duration::from_secs(2),
        expect_status: 200,
        request_timeout: Some(Duration::from_secs(5)),
        seed: Some(7),
    }
}

#[tokio::test]
async fn iteration_budget_yields_exact_request_counts() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let port = server.port();

    let iterations = 10u64;
    let s = scenario(
        vec![Endpoint::new("127.0.0.1", port)],
        Executor::ConstantVus {
            vus: 2,
            iterations: Some(iterations),
            duration: None,
        },
    );

    let report = run_scenario(s, None).await.context("run scenario")?;
    let stats = server.stats().clone();
    server.shutdown().await;

    anyhow::ensure!(
        report.iterations_total == iterations,
        "expected {iterations} iterations, got {}",
        report.iterations_total
    );
    anyhow::ensure!(
        report.requests_total == iterations * 3,
        "expected {} requests, got {}",
        iterations * 3,
        report.requests_total
    );
    anyhow::ensure!(
        stats.requests_total() == iterations * 3,
        "server saw {} requests, expected {}",
        stats.requests_total(),
        iterations * 3
    );
    // Each iteration runs one POST, one GET, one DELETE.
    anyhow::ensure!(stats.post_total() == iterations);
    anyhow::ensure!(stats.get_total() == iterations);
    anyhow::ensure!(stats.delete_total() == iterations);

    // POST inserts the key before GET reads it and DELETE removes it, so every
    // operation should succeed.
    for op in OperationKind::ALL {
        let summary = report
            .summary_for(op)
            .with_context(|| format!("expected a summary for {op}"))?;
        anyhow::ensure!(summary.count == iterations);
        anyhow::ensure!(
            (summary.success_ratio - 1.0).abs() < f64::EPSILON,
            "{op} success ratio {} (count={}, ok={})",
            summary.success_ratio,
            summary.count,
            summary.success_count
        );
    }

    Ok(())
}

#[tokio::test]
async fn warmup_requests_hit_the_server_but_not_the_report() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let port = server.port();

    let mut s = scenario(
        vec![Endpoint::new("127.0.0.1", port)],
        Executor::ConstantVus {
            vus: 1,
            iterations: Some(4),
            duration: None,
        },
    );
    s.warmup_iterations = 5;

    let report = run_scenario(s, None).await.context("run scenario")?;
    let server_seen = server.stats().requests_total();
    server.shutdown().await;

    // 5 warm-up iterations + 4 measured iterations, 3 operations each.
    anyhow::ensure!(
        server_seen == (5 + 4) * 3,
        "server saw {server_seen} requests, expected {}",
        (5 + 4) * 3
    );
    anyhow::ensure!(
        report.requests_total == 4 * 3,
        "report counted {} requests, expected {}",
        report.requests_total,
        4 * 3
    );

    Ok(())
}

#[tokio::test]
async fn get_on_missing_key_is_an_unexpected_status() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let port = server.port();

    // GET without a preceding POST: the store is empty, every read is a 404.
    let mut s = scenario(
        vec![Endpoint::new("127.0.0.1", port)],
        Executor::ConstantVus {
            vus: 1,
            iterations: Some(3),
            duration: None,
        },
    );
    s.operations = vec![OperationKind::Get];

    let report = run_scenario(s, None).await.context("run scenario")?;
    server.shutdown().await;

    let get = report
        .summary_for(OperationKind::Get)
        .context("expected a GET summary")?;
    anyhow::ensure!(get.count == 3);
    anyhow::ensure!(
        get.success_count == 0,
        "404 responses must not count as successes (ok={})",
        get.success_count
    );

    Ok(())
}

#[tokio::test]
async fn seeded_runs_spread_load_across_the_pool() -> anyhow::Result<()> {
    let a = TestServer::start().await.context("start replica a")?;
    let b = TestServer::start().await.context("start replica b")?;

    let s = scenario(
        vec![
            Endpoint::new("127.0.0.1", a.port()),
            Endpoint::new("127.0.0.1", b.port()),
        ],
        Executor::ConstantVus {
            vus: 1,
            iterations: Some(40),
            duration: None,
        },
    );

    let report = run_scenario(s, None).await.context("run scenario")?;
    let seen_a = a.stats().requests_total();
    let seen_b = b.stats().requests_total();
    a.shutdown().await;
    b.shutdown().await;

    anyhow::ensure!(report.requests_total == 40 * 3);
    anyhow::ensure!(seen_a + seen_b == 40 * 3);
    // Uniform selection over 40 iterations should hit both replicas.
    anyhow::ensure!(
        seen_a > 0 && seen_b > 0,
        "load was not spread: a={seen_a}, b={seen_b}"
    );

    Ok(())
}

#[tokio::test]
async fn open_loop_dispatches_roughly_at_the_configured_rate() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let port = server.port();

    let mut s = scenario(
        vec![Endpoint::new("127.0.0.1", port)],
        Executor::ConstantArrivalRate {
            rate: 50,
            time_unit: Duration::from_secs(1),
            duration: Duration::from_secs(2),
            pre_allocated_vus: 4,
            max_vus: 16,
        },
    );
    s.operations = vec![OperationKind::Post];

    let report = run_scenario(s, None).await.context("run scenario")?;
    server.shutdown().await;

    let dispatched = report.iterations_total + report.dropped_total;
    // 50/s over 2s. Allow slack for startup and tick granularity.
    anyhow::ensure!(
        (70..=110).contains(&dispatched),
        "expected ~100 arrivals, got {dispatched} (done={}, dropped={})",
        report.iterations_total,
        report.dropped_total
    );

    Ok(())
}

#[tokio::test]
async fn live_events_reach_the_sink() -> anyhow::Result<()> {
    #[derive(Debug, Default)]
    struct CountingSink {
        requests: std::sync::atomic::AtomicU64,
    }

    impl replikr_core::RecordSink for CountingSink {
        fn emit(&self, event: replikr_core::IterationEvent<'_>) {
            if let replikr_core::IterationEvent::Request(_) = event {
                self.requests
                    .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            }
        }
    }

    let server = TestServer::start().await.context("start test server")?;
    let port = server.port();

    let s = scenario(
        vec![Endpoint::new("127.0.0.1", port)],
        Executor::ConstantVus {
            vus: 1,
            iterations: Some(5),
            duration: None,
        },
    );

    let sink = Arc::new(CountingSink::default());
    let report = run_scenario(s, Some(sink.clone()))
        .await
        .context("run scenario")?;
    server.shutdown().await;

    let emitted = sink.requests.load(std::sync::atomic::Ordering::Relaxed);
    anyhow::ensure!(
        emitted == report.requests_total,
        "sink saw {emitted} events, report counted {}",
        report.requests_total
    );

    Ok(())
}
