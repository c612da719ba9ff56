use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use replikr_http::{HttpClient, HttpRequest};

use crate::record::{Outcome, RequestRecord};
use crate::runner::DrainSignal;
use crate::scenario::{Endpoint, OperationKind, Scenario};

/// Issues one logical operation against a chosen endpoint and classifies the
/// result. Never propagates a network fault: every invocation yields exactly
/// one `RequestRecord`.
#[derive(Debug)]
pub struct RequestDriver {
    client: HttpClient,
    resource: String,
    route_header: String,
    service: String,
    platform: Option<String>,
    expect_status: u16,
    request_timeout: Option<std::time::Duration>,
    drain: Arc<DrainSignal>,
}

impl RequestDriver {
    #[must_use]
    pub fn new(client: HttpClient, scenario: &Scenario, drain: Arc<DrainSignal>) -> Self {
        Self {
            client,
            resource: scenario.resource.clone(),
            route_header: scenario.route_header.clone(),
            service: scenario.service.clone(),
            platform: scenario.platform.clone(),
            expect_status: scenario.expect_status,
            request_timeout: scenario.request_timeout,
            drain,
        }
    }

    fn build_request(&self, op: OperationKind, endpoint: &Endpoint, key: &str, value: &str) -> HttpRequest {
        let url = format!("http://{}{}/{}", endpoint.authority(), self.resource, key);

        let body = match op {
            OperationKind::Post => {
                Bytes::from(serde_json::json!({ "key": key, "value": value }).to_string())
            }
            OperationKind::Get | OperationKind::Delete => Bytes::new(),
        };

        let mut req = HttpRequest::new(op.method(), url, body);
        if op == OperationKind::Post {
            req = req.with_header("Content-Type", "application/json");
        }

        req = req
            .with_header(&self.route_header, &self.service)
            .with_timeout(self.request_timeout);
        if let Some(platform) = &self.platform {
            req = req.with_header("Platform", platform);
        }

        req
    }

    /// Executes `op` against `endpoint`, measuring wall-clock latency from just
    /// before send to response receipt or failure detection. A draining run
    /// force-cancels the call once the grace timeout elapses.
    pub async fn execute(
        &self,
        op: OperationKind,
        endpoint: &Endpoint,
        key: &str,
        value: &str,
        run_started: Instant,
    ) -> RequestRecord {
        let req = self.build_request(op, endpoint, key, value);

        let started_at = run_started.elapsed();
        let sent = Instant::now();

        let outcome = tokio::select! {
            res = self.client.request(req) => match res {
                Ok(resp) if resp.status == self.expect_status => Outcome::Ok { status: resp.status },
                Ok(resp) => Outcome::UnexpectedStatus { status: resp.status },
                Err(err) => {
                    let kind = err.transport_error_kind();
                    tracing::debug!(%op, %kind, endpoint = %endpoint.authority(), error = %err, "transport failure");
                    Outcome::Transport { kind }
                }
            },
            () = self.drain.expired() => Outcome::TimedOut,
        };

        RequestRecord {
            op,
            key: key.to_string(),
            endpoint: endpoint.clone(),
            started_at,
            latency: sent.elapsed(),
            outcome,
        }
    }
}
