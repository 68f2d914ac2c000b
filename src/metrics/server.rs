//! HTTP exporter for engine metrics and health.
//!
//! A background task samples the engine every `refresh` period; handlers
//! only read what the last sample recorded.

use crate::engine::{EngineState, ProcessingEngine};
use crate::metrics::{MetricsRegistry, MetricsSnapshot};
use axum::{extract::State, http::StatusCode, routing::get, Router};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tower_http::cors::CorsLayer;

/// Errors that can occur while serving metrics.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind metrics listener: {0}")]
    Bind(#[from] std::io::Error),

    #[error("metrics server error: {0}")]
    Serve(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
    /// Interval between engine samples.
    pub refresh: Duration,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(9090)
    }
}

impl MetricsServerConfig {
    /// Loopback listener on `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([127, 0, 0, 1], port).into(),
            refresh: Duration::from_millis(500),
        }
    }
}

/// Registry plus the engine state seen by the last sample.
pub struct MetricsState {
    registry: MetricsRegistry,
    engine_state: AtomicI64,
}

impl MetricsState {
    /// Wraps a registry; the engine is assumed idle until the first sample.
    pub fn new(registry: MetricsRegistry) -> Self {
        Self {
            registry,
            engine_state: AtomicI64::new(EngineState::Idle.code()),
        }
    }

    /// Records one engine sample.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.registry.update(snapshot);
        self.engine_state.store(snapshot.state, Ordering::Relaxed);
    }

    /// Engine state from the last sample.
    pub fn engine_state(&self) -> Option<EngineState> {
        EngineState::from_code(self.engine_state.load(Ordering::Relaxed))
    }

    /// Status and body served on `/health`.
    pub fn health(&self) -> (StatusCode, String) {
        match self.engine_state() {
            Some(EngineState::Failed) => (
                StatusCode::SERVICE_UNAVAILABLE,
                EngineState::Failed.to_string(),
            ),
            Some(state) => (StatusCode::OK, state.to_string()),
            None => (StatusCode::SERVICE_UNAVAILABLE, "unknown".into()),
        }
    }
}

/// Serves `/metrics` and `/health` for one engine.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<MetricsState>,
}

impl MetricsServer {
    /// Creates a new metrics server.
    pub fn new(config: MetricsServerConfig, registry: MetricsRegistry) -> Self {
        Self {
            config,
            state: Arc::new(MetricsState::new(registry)),
        }
    }

    /// Shared exporter state.
    pub fn state(&self) -> Arc<MetricsState> {
        Arc::clone(&self.state)
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Samples `engine` periodically and serves until the listener fails.
    pub async fn run(self, engine: Arc<ProcessingEngine>) -> Result<(), ServerError> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "Metrics server listening");

        let state = self.state();
        let refresh = self.config.refresh;
        let sampler = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(refresh);
            loop {
                ticker.tick().await;
                state.update(&MetricsSnapshot::from_engine(&engine));
            }
        });

        let served = axum::serve(listener, self.router()).await;
        sampler.abort();
        served.map_err(|e| ServerError::Serve(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> (StatusCode, String) {
    match state.registry.encode() {
        Ok(output) => (StatusCode::OK, output),
        Err(e) => {
            tracing::warn!(error = %e, "Metrics encoding failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

async fn health_handler(State(state): State<Arc<MetricsState>>) -> (StatusCode, String) {
    state.health()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exporter() -> Arc<MetricsState> {
        MetricsServer::new(MetricsServerConfig::default(), MetricsRegistry::new().unwrap()).state()
    }

    fn sample(state: EngineState) -> MetricsSnapshot {
        MetricsSnapshot {
            state: state.code(),
            ..Default::default()
        }
    }

    #[test]
    fn test_config_with_port() {
        let config = MetricsServerConfig::with_port(8080);
        assert_eq!(config.bind_addr.port(), 8080);
        assert!(config.bind_addr.ip().is_loopback());
        assert_eq!(MetricsServerConfig::default().bind_addr.port(), 9090);
    }

    #[test]
    fn test_health_follows_engine_state() {
        let state = exporter();
        assert_eq!(state.health(), (StatusCode::OK, "idle".to_string()));

        state.update(&sample(EngineState::Running));
        assert_eq!(state.health(), (StatusCode::OK, "running".to_string()));

        state.update(&sample(EngineState::Failed));
        assert_eq!(
            state.health(),
            (StatusCode::SERVICE_UNAVAILABLE, "failed".to_string())
        );
    }

    #[test]
    fn test_unknown_state_code_is_unhealthy() {
        let state = exporter();
        state.update(&MetricsSnapshot {
            state: 99,
            ..Default::default()
        });

        assert_eq!(state.engine_state(), None);
        assert_eq!(state.health().0, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_handlers_serve_last_sample() {
        let state = exporter();
        let mut snapshot = sample(EngineState::Paused);
        snapshot.stats.frames_emitted = 7;
        state.update(&snapshot);

        let (status, body) = health_handler(State(Arc::clone(&state))).await;
        assert_eq!((status, body.as_str()), (StatusCode::OK, "paused"));

        let (status, body) = metrics_handler(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("motion_player_frames_total 7"));
        assert!(body.contains("motion_player_state 4"));
    }
}
