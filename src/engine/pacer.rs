//! Output pacing.
//!
//! One emission covers `delta` source frames, so the target interval is the
//! source frame interval times delta. The worker sleeps whatever remains of
//! that interval after processing, in short slices so a stop request is
//! noticed quickly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Frame interval assumed when the frame rate is unknown.
pub const FALLBACK_FRAME_INTERVAL_MS: u64 = 33;

/// Longest uninterrupted sleep slice.
pub const MAX_SLICE: Duration = Duration::from_millis(50);

/// Milliseconds between emissions for a stream at `fps` compared `delta`
/// frames apart.
pub fn target_interval_ms(fps: f64, delta: u32) -> u64 {
    let delta = u64::from(delta.max(1));
    if fps.is_finite() && fps > 0.0 {
        let ms = (1000.0 / fps * delta as f64).round();
        if ms >= 1.0 && ms < u64::MAX as f64 {
            return ms as u64;
        }
    }
    FALLBACK_FRAME_INTERVAL_MS * delta
}

/// [`target_interval_ms`] as a `Duration`.
pub fn target_interval(fps: f64, delta: u32) -> Duration {
    Duration::from_millis(target_interval_ms(fps, delta))
}

/// Time left to sleep after `elapsed` of processing.
pub fn residual(target: Duration, elapsed: Duration) -> Duration {
    target.saturating_sub(elapsed)
}

/// Interruptible sleeper used by the worker loop.
#[derive(Debug, Clone, Copy)]
pub struct Pacer {
    slice: Duration,
}

impl Pacer {
    /// Creates a pacer polling in `slice` steps, clamped to 1-50 ms.
    pub fn new(slice: Duration) -> Self {
        Self {
            slice: slice.clamp(Duration::from_millis(1), MAX_SLICE),
        }
    }

    pub fn slice(&self) -> Duration {
        self.slice
    }

    /// Sleeps the residual of `target` after `elapsed`, returning early once
    /// `stop` is set. Returns the time actually slept.
    pub fn sleep_residual(&self, target: Duration, elapsed: Duration, stop: &AtomicBool) -> Duration {
        let remaining = residual(target, elapsed);
        if remaining.is_zero() {
            return Duration::ZERO;
        }

        let start = Instant::now();
        let deadline = start + remaining;
        loop {
            if stop.load(Ordering::Acquire) {
                break;
            }
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            thread::sleep((deadline - now).min(self.slice));
        }
        start.elapsed()
    }

    /// Blocks while `pause` is set. Returns false if `stop` was set.
    pub fn wait_while_paused(&self, pause: &AtomicBool, stop: &AtomicBool) -> bool {
        while pause.load(Ordering::Acquire) && !stop.load(Ordering::Acquire) {
            thread::sleep(self.slice);
        }
        !stop.load(Ordering::Acquire)
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(MAX_SLICE)
    }
}
