//! The decode-and-analyze loop.
//!
//! Runs on the engine's dedicated thread. The worker exclusively owns the
//! decode session and the frame history; the caller only reaches it through
//! the atomic flags in [`RunControl`] and the shared config word.

use super::pacer::{self, Pacer};
use super::{EngineState, Shared};
use crate::capture::{Frame, FrameSource, Interrupter, SourceError};
use crate::detection::{detect, FrameHistory, MotionMask};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, trace, warn};

/// Per-run intents set by the caller and observed by the worker.
///
/// Each run gets fresh flags, so a worker that outlives its run (detached
/// after a forced stop) stays stopped and cannot affect the next one.
#[derive(Debug, Default)]
pub(crate) struct RunControl {
    stop: AtomicBool,
    pause: AtomicBool,
    interrupter: Mutex<Option<Interrupter>>,
}

impl RunControl {
    pub(crate) fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub(crate) fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    pub(crate) fn set_paused(&self, paused: bool) {
        self.pause.store(paused, Ordering::Release);
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.pause.load(Ordering::Acquire)
    }

    /// Aborts a blocked decode, if the source registered a way to.
    pub(crate) fn interrupt(&self) -> bool {
        let interrupter = self
            .interrupter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        match interrupter {
            Some(interrupter) => {
                interrupter.interrupt();
                true
            }
            None => false,
        }
    }

    fn register_interrupter(&self, interrupter: Option<Interrupter>) {
        *self
            .interrupter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = interrupter;
    }
}

/// How the read loop ended.
#[derive(Debug)]
enum RunEnd {
    Stopped,
    EndOfStream,
    ReadError(SourceError),
}

pub(crate) struct Worker {
    shared: Arc<Shared>,
    control: Arc<RunControl>,
    path: PathBuf,
    pacer: Pacer,
}

impl Worker {
    pub(crate) fn new(shared: Arc<Shared>, control: Arc<RunControl>, path: PathBuf) -> Self {
        let pacer = Pacer::new(shared.settings.poll_interval());
        Self {
            shared,
            control,
            path,
            pacer,
        }
    }

    pub(crate) fn run(self) {
        info!(path = %self.path.display(), "Processing worker started");

        let source = match self.shared.backend.open(&self.path) {
            Ok(source) => source,
            Err(e) => {
                self.fail_open(e);
                return;
            }
        };

        let end = self.process(source);

        if self.is_current() {
            self.shared.set_history_len(0);
        }
        match end {
            RunEnd::Stopped => info!("Processing worker stopped"),
            RunEnd::EndOfStream => {
                info!("End of video");
                self.finish();
            }
            RunEnd::ReadError(e) => {
                // The decoder cannot reliably tell a truncated file from a
                // failure, so both end the run like a normal end of stream.
                warn!(error = %e, "Read error, ending run as end of stream");
                if self.is_current() {
                    self.shared.stats.record_read_error();
                }
                self.finish();
            }
        }
    }

    /// Reads, analyzes and emits frames until the stream ends or a stop is
    /// requested. The source and history are dropped on return.
    fn process(&self, mut source: Box<dyn FrameSource>) -> RunEnd {
        let info = source.info();
        let fps = info.effective_fps(self.shared.settings.default_fps);
        if !info.has_valid_fps() {
            warn!(
                reported = info.fps,
                default = fps,
                "Source reports no usable frame rate, using default"
            );
        }
        debug!(fps, width = info.width, height = info.height, "Decode session open");

        self.control.register_interrupter(source.interrupter());
        let mut history = FrameHistory::for_delta(self.shared.config.snapshot().frame_delta);

        let end = loop {
            if !self
                .pacer
                .wait_while_paused(&self.control.pause, &self.control.stop)
            {
                break RunEnd::Stopped;
            }

            let started = Instant::now();

            let frame = match source.read_next() {
                Ok(Some(frame)) => frame,
                Ok(None) => break RunEnd::EndOfStream,
                Err(_) if self.control.is_stopped() => break RunEnd::Stopped,
                Err(e) => break RunEnd::ReadError(e),
            };

            let config = self.shared.config.snapshot();
            let target = pacer::target_interval(fps, config.frame_delta);

            history.set_delta(config.frame_delta);
            history.push(frame.clone());

            let mask = self.compute_mask(&history, config.motion_threshold);

            if !self.is_current() {
                break RunEnd::Stopped;
            }
            self.shared.set_history_len(history.len());
            self.emit(frame, mask);

            let elapsed = started.elapsed();
            if elapsed > target && self.is_current() {
                self.shared.stats.record_overrun();
                trace!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    target_ms = target.as_millis() as u64,
                    "Processing exceeded frame interval"
                );
            }
            self.pacer
                .sleep_residual(target, elapsed, &self.control.stop);
        };

        self.control.register_interrupter(None);
        history.clear();
        drop(source);
        debug!("Decode session released");
        end
    }

    /// False once this run was stopped or superseded. Shared counters and
    /// the history length then belong to whichever run comes next.
    fn is_current(&self) -> bool {
        !self.control.is_stopped()
    }

    fn compute_mask(&self, history: &FrameHistory, threshold: u8) -> MotionMask {
        if !history.is_full() {
            return MotionMask::empty();
        }
        let (Some(newest), Some(oldest)) = (history.newest(), history.oldest()) else {
            return MotionMask::empty();
        };
        match detect(newest, oldest, threshold) {
            Ok(mask) => mask,
            Err(e) => {
                warn!(error = %e, "Motion detection skipped");
                MotionMask::empty()
            }
        }
    }

    fn emit(&self, frame: Frame, mask: MotionMask) {
        let motion = (!mask.is_empty()).then(|| (mask.motion_pixels(), mask.motion_ratio()));
        trace!(
            sequence = frame.sequence(),
            motion_ratio = motion.map(|(_, ratio)| ratio),
            "Emitting frame pair"
        );
        self.shared.stats.record_emission(motion);
        self.shared.sink.frames_ready(frame, mask);
    }

    fn finish(&self) {
        let finished = self.shared.transition_for_run(&self.control, EngineState::Finished);
        if finished {
            self.shared.sink.processing_finished();
        }
    }

    fn fail_open(&self, error: SourceError) {
        warn!(error = %error, "Worker could not open video");
        let failed = self.shared.transition_for_run(&self.control, EngineState::Failed);
        if failed {
            self.shared.sink.error_occurred(&format!(
                "Failed to open video file in worker thread: {}",
                self.path.display()
            ));
        }
    }
}
