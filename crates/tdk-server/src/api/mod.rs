//! HTTP API
//!
//! | Route | Unified | Ingestion | Export |
//! |---|---|---|---|
//! | `GET /health` | yes | yes | yes |
//! | `POST /ingest` | yes | yes | |
//! | `POST /export` | yes | | yes |
//!
//! Stage routes answer 200 for `success` and `warning` outcomes and 500 for
//! `error`. `/health` answers 503 when the database cannot be reached.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tdk_common::types::{HealthReport, OutcomeStatus};
use tokio::signal;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{error, info, Level};

use crate::config::ServerConfig;
use crate::pipeline::PipelineService;

/// Which stage routes a process exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ServiceRole {
    /// Ingestion, export and the in-process orchestrator
    #[default]
    Unified,
    Ingestion,
    Export,
}

impl ServiceRole {
    /// Name reported by `/health`
    pub fn service_name(self) -> &'static str {
        match self {
            ServiceRole::Unified => "tdk-pipeline",
            ServiceRole::Ingestion => "data-ingestion",
            ServiceRole::Export => "data-export",
        }
    }

    pub fn serves_ingest(self) -> bool {
        matches!(self, ServiceRole::Unified | ServiceRole::Ingestion)
    }

    pub fn serves_export(self) -> bool {
        matches!(self, ServiceRole::Unified | ServiceRole::Export)
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PipelineService>,
    pub role: ServiceRole,
}

/// Build the router for `state.role`
pub fn create_router(state: AppState) -> Router {
    let mut router = Router::new().route("/health", get(health_check));

    if state.role.serves_ingest() {
        router = router.route("/ingest", post(trigger_ingest));
    }
    if state.role.serves_export() {
        router = router.route("/export", post(trigger_export));
    }

    router.with_state(state).layer(tracing_layer())
}

/// Request/response tracing
pub fn tracing_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(tower_http::LatencyUnit::Millis),
        )
}

fn status_code(status: OutcomeStatus) -> StatusCode {
    if status.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

async fn health_check(State(state): State<AppState>) -> Response {
    let service = state.role.service_name();

    match state.service.connector().ping().await {
        Ok(()) => (StatusCode::OK, Json(HealthReport::healthy(service))).into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthReport::unhealthy(service, e.to_string())),
            )
                .into_response()
        },
    }
}

async fn trigger_ingest(State(state): State<AppState>) -> Response {
    info!("INGEST ENDPOINT TRIGGERED");

    let outcome = state.service.ingest().await;
    info!(status = %outcome.status, rows = outcome.rows, "Ingest result: {}", outcome.message);

    (status_code(outcome.status), Json(outcome)).into_response()
}

async fn trigger_export(State(state): State<AppState>) -> Response {
    info!("EXPORT ENDPOINT TRIGGERED");

    let outcome = state.service.export().await;
    info!(status = %outcome.status, rows = outcome.rows, "Export result: {}", outcome.message);

    (status_code(outcome.status), Json(outcome)).into_response()
}

/// Bind and serve until a shutdown signal arrives
pub async fn serve(config: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let role = state.role;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("{} listening on {}", role.service_name(), addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM, then give in-flight requests a moment
pub async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    info!("Waiting up to {} seconds for connections to close", timeout_secs);
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
