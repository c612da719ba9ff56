use std::time::Duration;

use anyhow::Context as _;
use replikr_core::runner::run_scenario;
use replikr_core::{
    Endpoint, Executor, MembershipSchedule, MembershipStep, OperationKind, Scenario,
};
use replikr_testserver::TestServer;

fn scenario(membership: MembershipSchedule, executor: Executor) -> Scenario {
    Scenario {
        name: "faults".to_string(),
        label: "FAULTS".to_string(),
        resource: "/api/kv".to_string(),
        route_header: "XDN".to_string(),
        service: "webkv".to_string(),
        platform: None,
        operations: vec![OperationKind::Post],
        executor,
        membership,
        warmup_iterations: 0,
        pacing: Some(Duration::from_millis(20)),
        grace_timeout: Duration::from_secs(1),
        expect_status: 200,
        request_timeout: Some(Duration::from_secs(2)),
        seed: Some(3),
    }
}

#[tokio::test]
async fn total_outage_window_skips_iterations() -> anyhow::Result<()> {
    let server = TestServer::start().await.context("start test server")?;
    let live = Endpoint::new("127.0.0.1", server.port());

    // All replicas are down from 250ms onward.
    let membership = MembershipSchedule::new(vec![
        MembershipStep {
            at: Duration::ZERO,
            endpoints: vec![live],
        },
        MembershipStep {
            at: Duration::from_millis(250),
            endpoints: vec![],
        },
    ])
    .context("build membership schedule")?;

    let s = scenario(
        membership,
        Executor::ConstantVus {
            vus: 2,
            iterations: None,
            duration: Some(Duration::from_millis(600)),
        },
    );

    let report = run_scenario(s, None).await.context("run scenario")?;
    server.shutdown().await;

    anyhow::ensure!(
        report.requests_total > 0,
        "expected requests before the outage"
    );
    anyhow::ensure!(
        report.no_target_total > 0,
        "expected skipped iterations during the outage"
    );
    // Skipped iterations are counted separately from executed ones.
    anyhow::ensure!(report.iterations_total > 0);

    Ok(())
}

#[tokio::test]
async fn crashed_replica_stops_receiving_traffic() -> anyhow::Result<()> {
    let survivor = TestServer::start().await.context("start survivor")?;
    let crashed = TestServer::start().await.context("start crashing replica")?;
    let crashed_port = crashed.port();

    let membership = MembershipSchedule::new(vec![
        MembershipStep {
            at: Duration::ZERO,
            endpoints: vec![
                Endpoint::new("127.0.0.1", survivor.port()),
                Endpoint::new("127.0.0.1", crashed_port),
            ],
        },
        MembershipStep {
            at: Duration::from_millis(200),
            endpoints: vec![Endpoint::new("127.0.0.1", survivor.port())],
        },
    ])
    .context("build membership schedule")?;

    let s = scenario(
        membership,
        Executor::ConstantVus {
            vus: 2,
            iterations: None,
            duration: Some(Duration::from_millis(700)),
        },
    );

    let report = run_scenario(s, None).await.context("run scenario")?;
    let crashed_before = crashed.stats().requests_total();
    crashed.shutdown().await;
    let survivor_seen = survivor.stats().requests_total();
    survivor.shutdown().await;

    anyhow::ensure!(report.requests_total > 0);
    anyhow::ensure!(
        survivor_seen > 0,
        "survivor received no traffic (crashed saw {crashed_before})"
    );
    // After the membership step only the survivor is selectable, so the bulk
    // of the traffic must land there.
    anyhow::ensure!(
        survivor_seen >= crashed_before,
        "survivor={survivor_seen}, crashed={crashed_before}"
    );

    Ok(())
}

#[tokio::test]
async fn connection_refused_is_recorded_not_fatal() -> anyhow::Result<()> {
    // Grab a free port, then shut the server down so connections are refused.
    let server = TestServer::start().await.context("start test server")?;
    let dead = Endpoint::new("127.0.0.1", server.port());
    server.shutdown().await;

    let s = scenario(
        MembershipSchedule::static_pool(vec![dead]),
        Executor::ConstantVus {
            vus: 1,
            iterations: Some(5),
            duration: None,
        },
    );

    let report = run_scenario(s, None).await.context("run scenario")?;

    let post = report
        .summary_for(OperationKind::Post)
        .context("expected a POST summary")?;
    anyhow::ensure!(post.count == 5);
    anyhow::ensure!(
        post.success_count == 0,
        "refused connections must not count as successes"
    );
    // Failed-only kinds contribute no latency samples.
    anyhow::ensure!(post.mean_ms == 0.0, "mean_ms = {}", post.mean_ms);

    Ok(())
}
