//! Prometheus metrics for the processing engine.
//!
//! [`MetricsRegistry`] is fed from [`MetricsSnapshot`]s taken from a
//! running engine. With the `metrics` feature, [`MetricsServer`] serves the
//! registry over HTTP.
//!
//! # Metrics Exposed
//!
//! ## Engine
//! - `motion_player_state` - Lifecycle state code
//! - `motion_player_frame_delta` - Current frame delta
//! - `motion_player_motion_threshold` - Current motion threshold
//! - `motion_player_history_frames` - Frames retained for comparison
//!
//! ## Throughput
//! - `motion_player_runs_total` - Runs started
//! - `motion_player_frames_total` - Frame pairs emitted
//! - `motion_player_masks_total` - Emissions with a computed mask
//! - `motion_player_motion_pixels_total` - Moving pixels across all masks
//! - `motion_player_motion_ratio` - Moving fraction of the latest mask
//!
//! ## Health
//! - `motion_player_pacing_overruns_total` - Iterations slower than the frame interval
//! - `motion_player_read_errors_total` - Runs ended by a decode error
//! - `motion_player_forced_terminations_total` - Stops that had to interrupt the worker
//!
//! # Example
//!
//! ```no_run
//! use motion_player::metrics::{MetricsRegistry, MetricsSnapshot};
//!
//! let registry = MetricsRegistry::new().expect("Failed to create registry");
//!
//! let mut snapshot = MetricsSnapshot::default();
//! snapshot.frame_delta = 3;
//! snapshot.stats.frames_emitted = 120;
//!
//! registry.update(&snapshot);
//! println!("{}", registry.encode().expect("encode"));
//! ```

mod collector;
#[cfg(feature = "metrics")]
mod server;

pub use collector::{MetricsError, MetricsRegistry, MetricsSnapshot};
#[cfg(feature = "metrics")]
pub use server::{MetricsServer, MetricsServerConfig, MetricsState, ServerError};
