//! Metrics collection and registry.

use crate::engine::{EngineState, StatsSnapshot};
use prometheus::{Encoder, Gauge, IntCounter, IntGauge, Registry, TextEncoder};
use thiserror::Error;

/// Errors that can occur during metrics operations.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),
}

/// A snapshot of engine state for metrics update.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    /// Current lifecycle state code (see [`EngineState::code`]).
    pub state: i64,
    /// Current frame delta.
    pub frame_delta: u32,
    /// Current motion threshold.
    pub motion_threshold: u8,
    /// Frames the worker currently retains.
    pub history_len: usize,
    /// Engine counters.
    pub stats: StatsSnapshot,
}

impl MetricsSnapshot {
    /// Captures the observable state of an engine.
    pub fn from_engine(engine: &crate::engine::ProcessingEngine) -> Self {
        let config = engine.config();
        Self {
            state: engine.state().code(),
            frame_delta: config.frame_delta,
            motion_threshold: config.motion_threshold,
            history_len: engine.history_len(),
            stats: engine.stats(),
        }
    }
}

/// Prometheus metrics registry for the processing engine.
pub struct MetricsRegistry {
    registry: Registry,

    // Engine state
    state: IntGauge,
    frame_delta: IntGauge,
    motion_threshold: IntGauge,
    history_len: IntGauge,

    // Throughput
    runs_total: IntCounter,
    frames_total: IntCounter,
    masks_total: IntCounter,
    motion_pixels_total: IntCounter,
    motion_ratio: Gauge,

    // Timing and shutdown health
    pacing_overruns_total: IntCounter,
    read_errors_total: IntCounter,
    forced_terminations_total: IntCounter,
}

impl MetricsRegistry {
    /// Creates a new metrics registry with all engine metrics registered.
    pub fn new() -> Result<Self, MetricsError> {
        let registry = Registry::new();

        let state = IntGauge::new(
            "motion_player_state",
            "Engine state (0=idle 1=loading 2=ready 3=running 4=paused 5=finished 6=failed)",
        )?;
        let frame_delta = IntGauge::new(
            "motion_player_frame_delta",
            "Frames between the compared pair",
        )?;
        let motion_threshold = IntGauge::new(
            "motion_player_motion_threshold",
            "Luminance difference threshold",
        )?;
        let history_len = IntGauge::new(
            "motion_player_history_frames",
            "Frames currently retained for comparison",
        )?;

        let runs_total = IntCounter::new(
            "motion_player_runs_total",
            "Processing runs started",
        )?;
        let frames_total = IntCounter::new(
            "motion_player_frames_total",
            "Frame pairs emitted",
        )?;
        let masks_total = IntCounter::new(
            "motion_player_masks_total",
            "Emissions carrying a computed motion mask",
        )?;
        let motion_pixels_total = IntCounter::new(
            "motion_player_motion_pixels_total",
            "Pixels marked as moving across all masks",
        )?;
        let motion_ratio = Gauge::new(
            "motion_player_motion_ratio",
            "Fraction of moving pixels in the latest mask",
        )?;

        let pacing_overruns_total = IntCounter::new(
            "motion_player_pacing_overruns_total",
            "Iterations slower than the target frame interval",
        )?;
        let read_errors_total = IntCounter::new(
            "motion_player_read_errors_total",
            "Runs ended by a decode error",
        )?;
        let forced_terminations_total = IntCounter::new(
            "motion_player_forced_terminations_total",
            "Stops that interrupted an unresponsive worker",
        )?;

        registry.register(Box::new(state.clone()))?;
        registry.register(Box::new(frame_delta.clone()))?;
        registry.register(Box::new(motion_threshold.clone()))?;
        registry.register(Box::new(history_len.clone()))?;
        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(frames_total.clone()))?;
        registry.register(Box::new(masks_total.clone()))?;
        registry.register(Box::new(motion_pixels_total.clone()))?;
        registry.register(Box::new(motion_ratio.clone()))?;
        registry.register(Box::new(pacing_overruns_total.clone()))?;
        registry.register(Box::new(read_errors_total.clone()))?;
        registry.register(Box::new(forced_terminations_total.clone()))?;

        Ok(Self {
            registry,
            state,
            frame_delta,
            motion_threshold,
            history_len,
            runs_total,
            frames_total,
            masks_total,
            motion_pixels_total,
            motion_ratio,
            pacing_overruns_total,
            read_errors_total,
            forced_terminations_total,
        })
    }

    /// Updates all metrics from a snapshot of engine state.
    pub fn update(&self, snapshot: &MetricsSnapshot) {
        self.state.set(snapshot.state);
        self.frame_delta.set(i64::from(snapshot.frame_delta));
        self.motion_threshold.set(i64::from(snapshot.motion_threshold));
        self.history_len.set(snapshot.history_len as i64);
        self.motion_ratio.set(snapshot.stats.last_motion_ratio);

        // Counters only move forward, by the difference since the last update.
        let stats = &snapshot.stats;
        advance(&self.runs_total, stats.runs_started);
        advance(&self.frames_total, stats.frames_emitted);
        advance(&self.masks_total, stats.masks_computed);
        advance(&self.motion_pixels_total, stats.motion_pixels);
        advance(&self.pacing_overruns_total, stats.pacing_overruns);
        advance(&self.read_errors_total, stats.read_errors);
        advance(&self.forced_terminations_total, stats.forced_terminations);
    }

    /// Returns the underlying Prometheus registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encodes all metrics in Prometheus text format.
    pub fn encode(&self) -> Result<String, MetricsError> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

fn advance(counter: &IntCounter, total: u64) {
    let current = counter.get();
    if total > current {
        counter.inc_by(total - current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = MetricsRegistry::new();
        assert!(registry.is_ok());
    }

    #[test]
    fn test_metrics_update() {
        let registry = MetricsRegistry::new().unwrap();

        let snapshot = MetricsSnapshot {
            state: EngineState::Running.code(),
            frame_delta: 3,
            motion_threshold: 30,
            history_len: 4,
            stats: StatsSnapshot {
                runs_started: 1,
                frames_emitted: 120,
                masks_computed: 117,
                motion_pixels: 5000,
                last_motion_ratio: 0.25,
                pacing_overruns: 2,
                read_errors: 0,
                forced_terminations: 0,
            },
        };

        registry.update(&snapshot);
        registry.update(&snapshot);

        let output = registry.encode().unwrap();
        assert!(output.contains("motion_player_state 3"));
        assert!(output.contains("motion_player_frame_delta 3"));
        assert!(output.contains("motion_player_frames_total 120"));
        assert!(output.contains("motion_player_motion_ratio 0.25"));
    }

    #[test]
    fn test_metrics_encode() {
        let registry = MetricsRegistry::new().unwrap();
        let output = registry.encode().unwrap();

        assert!(output.contains("motion_player_state"));
        assert!(output.contains("motion_player_forced_terminations_total"));
    }
}
