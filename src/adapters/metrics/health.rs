//! Health Check Server - Liveness, Readiness, and Metrics
//!
//! Exposes /live, /ready, and /metrics via axum 0.7. Readiness depends
//! on the local fallback being writable; a denied or unreachable remote
//! namespace only degrades the service, since writes still land locally.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{error, info, instrument};

use super::prometheus::StoreMetrics;

/// Shared health state updated by the probe loop.
#[derive(Debug)]
pub struct HealthState {
  /// Whether the remote namespace answered the last probe.
  pub remote_connected: AtomicBool,
  /// Whether the local data directory is writable.
  pub local_healthy: AtomicBool,
}

impl HealthState {
  /// Create a new health state (all healthy by default).
  pub const fn new() -> Self {
    Self {
      remote_connected: AtomicBool::new(true),
      local_healthy: AtomicBool::new(true),
    }
  }

  /// Ready when writes can succeed on at least the fallback path.
  pub fn is_ready(&self) -> bool {
    self.local_healthy.load(Ordering::Relaxed)
  }

  /// Ready, but remote writes are currently being diverted.
  pub fn is_degraded(&self) -> bool {
    self.is_ready() && !self.remote_connected.load(Ordering::Relaxed)
  }
}

impl Default for HealthState {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Clone)]
struct ServerState {
  health: Arc<HealthState>,
  metrics: Option<Arc<StoreMetrics>>,
}

/// Axum-based health check HTTP server.
pub struct HealthServer {
  state: ServerState,
  /// Bind address, e.g. `0.0.0.0:9090`.
  address: String,
}

impl HealthServer {
  pub fn new(
    health: Arc<HealthState>,
    metrics: Option<Arc<StoreMetrics>>,
    address: impl Into<String>,
  ) -> Self {
    Self {
      state: ServerState { health, metrics },
      address: address.into(),
    }
  }

  fn router(&self) -> Router {
    Router::new()
      .route("/live", get(Self::liveness))
      .route("/ready", get(Self::readiness))
      .route("/metrics", get(Self::metrics))
      .with_state(self.state.clone())
  }

  /// Serve until `shutdown_rx` fires.
  #[instrument(skip(self, shutdown_rx), fields(address = %self.address))]
  pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
    let app = self.router();
    let listener = tokio::net::TcpListener::bind(&self.address).await?;

    info!("Health server started");

    axum::serve(listener, app)
      .with_graceful_shutdown(async move {
        let _ = shutdown_rx.recv().await;
      })
      .await?;

    Ok(())
  }

  /// Liveness probe: always returns 200 if the process is running.
  async fn liveness() -> impl IntoResponse {
    (StatusCode::OK, "OK")
  }

  /// Readiness probe: 200 while the fallback is writable.
  async fn readiness(State(state): State<ServerState>) -> impl IntoResponse {
    if state.health.is_degraded() {
      (StatusCode::OK, "DEGRADED")
    } else if state.health.is_ready() {
      (StatusCode::OK, "READY")
    } else {
      (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
    }
  }

  async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    let Some(metrics) = state.metrics else {
      return (StatusCode::NOT_FOUND, "metrics disabled".to_string());
    };
    match metrics.render() {
      Ok(text) => (StatusCode::OK, text),
      Err(e) => {
        error!(error = %e, "Failed to render metrics");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    }
  }
}
