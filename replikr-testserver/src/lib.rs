use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::sleep;

/// Mock replica of the book-catalog / key-value service: an in-memory store
/// behind `GET/POST/DELETE /api/{resource}/{key}` plus a list route, with an
/// optional artificial per-request delay for drain/timeout tests.
#[derive(Debug, Clone, Default)]
pub struct TestServerStats {
    requests_total: Arc<AtomicU64>,
    get_total: Arc<AtomicU64>,
    post_total: Arc<AtomicU64>,
    delete_total: Arc<AtomicU64>,
}

impl TestServerStats {
    fn inc(&self, method: &AtomicU64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        method.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn get_total(&self) -> u64 {
        self.get_total.load(Ordering::Relaxed)
    }

    pub fn post_total(&self) -> u64 {
        self.post_total.load(Ordering::Relaxed)
    }

    pub fn delete_total(&self) -> u64 {
        self.delete_total.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, Default)]
struct AppState {
    store: Arc<Mutex<HashMap<String, String>>>,
    stats: TestServerStats,
    delay: Option<Duration>,
}

#[derive(Debug, Deserialize)]
struct PutBody {
    #[allow(dead_code)]
    key: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct Entry {
    key: String,
    value: String,
}

async fn maybe_delay(state: &AppState) {
    if let Some(delay) = state.delay {
        sleep(delay).await;
    }
}

fn lock_store(state: &AppState) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
    state
        .store
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn handle_list(State(state): State<AppState>) -> Json<Vec<String>> {
    state.stats.inc(&state.stats.get_total);
    maybe_delay(&state).await;

    let keys: Vec<String> = lock_store(&state).keys().cloned().collect();
    Json(keys)
}

async fn handle_get(
    State(state): State<AppState>,
    Path((_resource, key)): Path<(String, String)>,
) -> Result<Json<Entry>, StatusCode> {
    state.stats.inc(&state.stats.get_total);
    maybe_delay(&state).await;

    match lock_store(&state).get(&key) {
        Some(value) => Ok(Json(Entry {
            key,
            value: value.clone(),
        })),
        None => Err(StatusCode::NOT_FOUND),
    }
}

async fn handle_post(
    State(state): State<AppState>,
    Path((_resource, key)): Path<(String, String)>,
    Json(body): Json<PutBody>,
) -> StatusCode {
    state.stats.inc(&state.stats.post_total);
    maybe_delay(&state).await;

    lock_store(&state).insert(key, body.value);
    StatusCode::OK
}

async fn handle_delete(
    State(state): State<AppState>,
    Path((_resource, key)): Path<(String, String)>,
) -> StatusCode {
    state.stats.inc(&state.stats.delete_total);
    maybe_delay(&state).await;

    if lock_store(&state).remove(&key).is_some() {
        StatusCode::OK
    } else {
        StatusCode::NOT_FOUND
    }
}

pub fn router(stats: TestServerStats, delay: Option<Duration>) -> Router {
    let state = AppState {
        store: Arc::new(Mutex::new(HashMap::new())),
        stats,
        delay,
    };

    Router::new()
        .route("/api/{resource}", get(handle_list))
        .route(
            "/api/{resource}/{key}",
            get(handle_get).post(handle_post).delete(handle_delete),
        )
        .with_state(state)
}

#[derive(Debug)]
pub struct TestServer {
    addr: SocketAddr,
    stats: TestServerStats,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with_delay(None).await
    }

    pub async fn start_with_delay(delay: Option<Duration>) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        Self::serve(listener, delay).await
    }

    pub async fn start_on(port: u16, delay: Option<Duration>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", port)).await?;
        Self::serve(listener, delay).await
    }

    async fn serve(listener: TcpListener, delay: Option<Duration>) -> std::io::Result<Self> {
        let addr = listener.local_addr()?;
        let stats = TestServerStats::default();
        let app = router(stats.clone(), delay);

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = serve.await;
        });

        Ok(Self {
            addr,
            stats,
            shutdown_tx: Some(shutdown_tx),
            task,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn stats(&self) -> &TestServerStats {
        &self.stats
    }

    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        let _ = (&mut self.task).await;
    }
}
