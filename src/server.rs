use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::{
    config::{ProbeConfig, DEFAULT_TIMEOUT},
    connector::{Connector, TcpConnector},
    error::ProbeError,
    logging, ports,
    report::{self, ScanReport},
    scanner::{Prober, SharedProgress},
};

const INDEX_HTML: &str = include_str!("../ui/index.html");

#[derive(Clone)]
pub struct AppState {
    inner: Arc<RwLock<ServerState>>, // shared mutable state for progress/results
    connector: Arc<dyn Connector>,
}

#[derive(Debug, Default)]
struct ServerState {
    status: Status,
    report: Option<ScanReport>,
    progress: Option<SharedProgress>,
    cancel: Option<CancellationToken>,
    // Bumped per scan so a superseded scan cannot overwrite a newer one.
    generation: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    #[default]
    Idle,
    Running,
    Done,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Status {
    pub state: ScanState,
    pub total: u64,
    pub probed: u64,
    pub open: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScanRequest {
    pub host: String,
    pub start_port: i64,
    pub end_port: i64,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub concurrency: Option<usize>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_connector(Arc::new(TcpConnector))
    }

    pub fn with_connector(connector: Arc<dyn Connector>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(ServerState::default())),
            connector,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/status", get(get_status))
        .route("/scan", post(post_scan))
        .route("/results", get(get_results).delete(clear_results))
        .route("/cancel", post(cancel_scan))
        .with_state(state);

    Router::new()
        .route("/", get(index))
        .nest("/api", api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

pub async fn spawn_server(bind: &str) -> Result<()> {
    spawn_server_with(bind, AppState::new()).await
}

pub async fn spawn_server_with(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!("Serving form on http://{}", bind);
    axum::serve(listener, router(state)).await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn get_status(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    let mut out = s.status.clone();
    if let Some(p) = s.progress.as_ref() {
        out.probed = p.probed();
        out.open = p.open();
    }
    (StatusCode::OK, Json(out))
}

async fn get_results(State(app): State<AppState>) -> impl IntoResponse {
    let s = app.inner.read().await;
    if let Some(rep) = s.report.as_ref() {
        (StatusCode::OK, Json(rep.clone())).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}

async fn clear_results(State(app): State<AppState>) -> impl IntoResponse {
    let mut s = app.inner.write().await;
    s.report = None;
    if s.status.state != ScanState::Running {
        s.status = Status::default();
    }
    StatusCode::NO_CONTENT
}

async fn cancel_scan(State(app): State<AppState>) -> impl IntoResponse {
    let mut s = app.inner.write().await;
    match s.cancel.take() {
        Some(c) => {
            c.cancel();
            StatusCode::ACCEPTED
        }
        None => StatusCode::CONFLICT,
    }
}

async fn post_scan(State(app): State<AppState>, Json(req): Json<ScanRequest>) -> impl IntoResponse {
    // Reject bad input before touching the network.
    let target = match ports::build_target(&req.host, req.start_port, req.end_port) {
        Ok(t) => t,
        Err(e) => {
            return (StatusCode::BAD_REQUEST, report::input_error_message(&e)).into_response()
        }
    };

    let timeout_ms = req
        .timeout_ms
        .unwrap_or(DEFAULT_TIMEOUT.as_millis() as u64);
    let config = ProbeConfig::from_millis(timeout_ms, req.concurrency.unwrap_or(1));
    let prober = Prober::with_connector(app.connector.clone(), config);

    let (tx, rx) = mpsc::unbounded_channel();
    let progress = SharedProgress::with_reports(tx);
    let cancel = CancellationToken::new();
    let status = Status {
        state: ScanState::Running,
        total: target.port_count(),
        ..Status::default()
    };

    let generation = {
        let mut s = app.inner.write().await;
        // Cancel any existing scan
        if let Some(c) = s.cancel.take() {
            c.cancel();
        }
        s.generation += 1;
        s.status = status.clone();
        s.report = None;
        s.progress = Some(progress.clone());
        s.cancel = Some(cancel.clone());
        s.generation
    };

    tokio::spawn(logging::log_open_ports(rx));

    let app2 = app.clone();
    tokio::spawn(async move {
        let res = prober.probe_with_shared(&target, cancel, progress).await;

        let mut s = app2.inner.write().await;
        if s.generation != generation {
            return;
        }
        if let Some(p) = s.progress.take() {
            s.status.probed = p.probed();
            s.status.open = p.open();
        }
        s.cancel = None;
        match res {
            Ok(result) => {
                s.status.probed = result.total() as u64;
                s.status.open = result.open.len() as u64;
                s.status.state = ScanState::Done;
                s.report = Some(ScanReport::completed_now(&target, result));
            }
            Err(ProbeError::Cancelled) => {
                s.status.state = ScanState::Cancelled;
            }
            Err(e) => {
                warn!("scan of {} failed: {e}", target.address);
                s.status.state = ScanState::Failed;
                s.status.error = Some(report::error_message(&e));
            }
        }
    });

    (StatusCode::ACCEPTED, Json(status)).into_response()
}
