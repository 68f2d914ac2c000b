//! Runtime counters shared between the worker and observers.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the worker; readable from any thread.
#[derive(Debug, Default)]
pub(crate) struct EngineStats {
    runs_started: AtomicU64,
    frames_emitted: AtomicU64,
    masks_computed: AtomicU64,
    motion_pixels: AtomicU64,
    last_motion_ratio: AtomicU64,
    pacing_overruns: AtomicU64,
    read_errors: AtomicU64,
    forced_terminations: AtomicU64,
}

impl EngineStats {
    pub(crate) fn record_run_started(&self) {
        self.runs_started.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_emission(&self, motion: Option<(usize, f64)>) {
        self.frames_emitted.fetch_add(1, Ordering::Relaxed);
        if let Some((pixels, ratio)) = motion {
            self.masks_computed.fetch_add(1, Ordering::Relaxed);
            self.motion_pixels.fetch_add(pixels as u64, Ordering::Relaxed);
            self.last_motion_ratio
                .store(ratio.to_bits(), Ordering::Relaxed);
        }
    }

    pub(crate) fn record_overrun(&self) {
        self.pacing_overruns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_read_error(&self) {
        self.read_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_forced_termination(&self) {
        self.forced_terminations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            runs_started: self.runs_started.load(Ordering::Relaxed),
            frames_emitted: self.frames_emitted.load(Ordering::Relaxed),
            masks_computed: self.masks_computed.load(Ordering::Relaxed),
            motion_pixels: self.motion_pixels.load(Ordering::Relaxed),
            last_motion_ratio: f64::from_bits(self.last_motion_ratio.load(Ordering::Relaxed)),
            pacing_overruns: self.pacing_overruns.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
            forced_terminations: self.forced_terminations.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSnapshot {
    /// Runs started since construction.
    pub runs_started: u64,
    /// Frame pairs delivered to the sink.
    pub frames_emitted: u64,
    /// Emissions that carried a computed (non-placeholder) mask.
    pub masks_computed: u64,
    /// Sum of moving pixels across all computed masks.
    pub motion_pixels: u64,
    /// Moving-pixel fraction of the most recent computed mask.
    pub last_motion_ratio: f64,
    /// Iterations whose processing exceeded the pacing target.
    pub pacing_overruns: u64,
    /// Runs that ended on a decode error rather than a clean end of stream.
    pub read_errors: u64,
    /// Stops that had to interrupt an unresponsive worker.
    pub forced_terminations: u64,
}
