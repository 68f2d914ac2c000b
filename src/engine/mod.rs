//! Background processing engine.
//!
//! [`ProcessingEngine`] owns one dedicated worker thread per run and exposes
//! the thread-safe command surface (load, start, pause, resume, stop,
//! reconfigure). Results flow out through an [`EventSink`].
//!
//! # Threading
//!
//! Commands may be called from any thread. They serialize on a small
//! session lock that the worker never takes; the worker and callers share
//! only the packed config word, the per-run [`RunControl`] flags and the
//! state cell. Decoding, history and detection happen on the worker alone.

mod config;
mod events;
mod pacer;
mod state;
mod stats;
mod worker;

pub use config::EngineConfig;
pub use events::{ChannelSink, EngineEvent, EventSink};
pub use pacer::{residual, target_interval, target_interval_ms, Pacer, FALLBACK_FRAME_INTERVAL_MS};
pub use state::EngineState;
pub use stats::StatsSnapshot;

use crate::capture::{VideoBackend, VideoInfo};
use crate::config::{ConfigError, EngineSettings};
use config::SharedConfig;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use stats::EngineStats;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use worker::{RunControl, Worker};

/// State shared between the command surface and the worker.
pub(crate) struct Shared {
    settings: EngineSettings,
    backend: Arc<dyn VideoBackend>,
    sink: Arc<dyn EventSink>,
    config: SharedConfig,
    state: Mutex<EngineState>,
    history_len: AtomicUsize,
    stats: EngineStats,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> EngineState {
        *self.lock_state()
    }

    fn set_state(&self, next: EngineState) {
        let mut state = self.lock_state();
        if *state != next {
            debug!(from = %*state, to = %next, "Engine state change");
            *state = next;
        }
    }

    /// Moves an active run to `next`, unless the run was stopped or
    /// superseded in the meantime.
    fn transition_for_run(&self, control: &RunControl, next: EngineState) -> bool {
        let mut state = self.lock_state();
        if control.is_stopped() || !state.is_active() {
            return false;
        }
        debug!(from = %*state, to = %next, "Engine state change");
        *state = next;
        true
    }

    fn set_history_len(&self, len: usize) {
        self.history_len.store(len, Ordering::Release);
    }
}

/// Handle to a spawned worker.
struct RunHandle {
    control: Arc<RunControl>,
    thread: JoinHandle<()>,
    /// Disconnects when the worker thread exits.
    exited: Receiver<()>,
}

/// Caller-side session data, guarded by the command lock.
#[derive(Default)]
struct Session {
    path: Option<PathBuf>,
    info: Option<VideoInfo>,
    run: Option<RunHandle>,
}

/// Video processing engine with a thread-safe command interface.
///
/// Dropping the engine stops any active run.
pub struct ProcessingEngine {
    shared: Arc<Shared>,
    session: Mutex<Session>,
}

impl ProcessingEngine {
    /// Creates an idle engine.
    pub fn new(
        backend: Arc<dyn VideoBackend>,
        sink: Arc<dyn EventSink>,
        settings: EngineSettings,
    ) -> Self {
        let config = EngineConfig::from(&settings);
        info!(
            frame_delta = config.frame_delta,
            motion_threshold = config.motion_threshold,
            "Processing engine constructed"
        );
        Self {
            shared: Arc::new(Shared {
                settings,
                backend,
                sink,
                config: SharedConfig::new(config),
                state: Mutex::new(EngineState::Idle),
                history_len: AtomicUsize::new(0),
                stats: EngineStats::default(),
            }),
            session: Mutex::new(Session::default()),
        }
    }

    /// Creates an engine whose events are delivered to a channel.
    pub fn with_channel(
        backend: Arc<dyn VideoBackend>,
        settings: EngineSettings,
    ) -> (Self, Receiver<EngineEvent>) {
        let (sink, rx) = ChannelSink::unbounded();
        (Self::new(backend, Arc::new(sink), settings), rx)
    }

    fn lock_session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Loads a video, stopping any active run first.
    ///
    /// Probes metadata synchronously and reports the outcome as either
    /// `video_info_ready` or `error_occurred`. A failed load discards the
    /// path and leaves the engine idle.
    pub fn load(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading video");

        let mut session = self.lock_session();
        if let Some(run) = session.run.take() {
            info!("Stopping current run before load");
            self.shutdown_run(run, self.shared.settings.reload_timeout());
        }
        self.shared.set_history_len(0);
        session.path = None;
        session.info = None;
        self.shared.set_state(EngineState::Loading);

        match self.shared.backend.probe(path) {
            Ok(info) => {
                info!(
                    fps = info.fps,
                    width = info.width,
                    height = info.height,
                    "Video info ready"
                );
                session.path = Some(path.to_path_buf());
                session.info = Some(info);
                self.shared.set_state(EngineState::Ready);
                drop(session);
                self.shared.sink.video_info_ready(info);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to open video");
                self.shared.set_state(EngineState::Idle);
                drop(session);
                self.shared
                    .sink
                    .error_occurred(&format!("Failed to open video file: {}", path.display()));
            }
        }
    }

    /// Starts processing the loaded file from the beginning, or resumes a
    /// paused run.
    pub fn start(&self) {
        let result = self.start_locked(&mut self.lock_session());
        self.report(result);
    }

    fn report(&self, result: Result<(), String>) {
        if let Err(message) = result {
            self.shared.sink.error_occurred(&message);
        }
    }

    fn start_locked(&self, session: &mut Session) -> Result<(), String> {
        let Some(path) = session.path.clone() else {
            warn!("Start requested with no video loaded");
            return Err("No video file loaded.".into());
        };

        match self.shared.state() {
            EngineState::Running => {
                warn!("Processing thread already running");
                return Ok(());
            }
            EngineState::Paused if session.run.is_some() => {
                warn!("Processing thread already running, resuming");
                return self.resume_locked(session);
            }
            _ => {}
        }

        // A previous run that finished on its own still has a handle to reap.
        if let Some(run) = session.run.take() {
            self.shutdown_run(run, self.shared.settings.stop_timeout());
        }

        info!(path = %path.display(), "Starting processing thread");
        let control = Arc::new(RunControl::default());
        let (exit_tx, exited) = bounded::<()>(0);
        let worker = Worker::new(Arc::clone(&self.shared), Arc::clone(&control), path);

        self.shared.set_state(EngineState::Running);
        let spawned = thread::Builder::new()
            .name("motion-worker".into())
            .spawn(move || {
                let _exit = exit_tx;
                worker.run();
            });

        match spawned {
            Ok(thread) => {
                self.shared.stats.record_run_started();
                session.run = Some(RunHandle {
                    control,
                    thread,
                    exited,
                });
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to spawn processing thread");
                self.shared.set_state(EngineState::Failed);
                Err(format!("Failed to start processing: {e}"))
            }
        }
    }

    /// Requests a pause. Idempotent.
    pub fn pause(&self) {
        let session = self.lock_session();
        info!("Pause requested");
        let Some(run) = session.run.as_ref() else {
            debug!("Pause ignored, nothing running");
            return;
        };
        let mut state = self.shared.lock_state();
        if *state == EngineState::Running {
            run.control.set_paused(true);
            *state = EngineState::Paused;
        }
    }

    /// Resumes a paused run, or starts one if a file is loaded but idle.
    pub fn resume(&self) {
        info!("Resume requested");
        let result = self.resume_locked(&mut self.lock_session());
        self.report(result);
    }

    fn resume_locked(&self, session: &mut Session) -> Result<(), String> {
        if let Some(run) = session.run.as_ref() {
            let mut state = self.shared.lock_state();
            match *state {
                EngineState::Paused => {
                    run.control.set_paused(false);
                    *state = EngineState::Running;
                    return Ok(());
                }
                EngineState::Running => return Ok(()),
                _ => {}
            }
        }
        self.start_locked(session)
    }

    /// Stops the active run, waiting up to the configured stop timeout.
    ///
    /// Safe to call when nothing is running. The loaded file is kept, so
    /// a later `start` replays it from the beginning.
    pub fn stop(&self) {
        let mut session = self.lock_session();
        info!("Stop requested");
        match session.run.take() {
            Some(run) => {
                self.shutdown_run(run, self.shared.settings.stop_timeout());
                info!("Video processing thread finished");
            }
            None => info!("Video processing thread was not running"),
        }
        self.shared.set_history_len(0);
        self.shared.set_state(EngineState::Idle);
    }

    /// Cooperative stop with a bounded wait, then forced termination.
    fn shutdown_run(&self, run: RunHandle, timeout: Duration) {
        run.control.request_stop();

        if matches!(run.exited.recv_timeout(timeout), Err(RecvTimeoutError::Timeout)) {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                "Video processing thread did not finish gracefully, terminating"
            );
            self.shared.stats.record_forced_termination();
            let interrupted = run.control.interrupt();
            let grace = self.shared.settings.force_grace();
            if !interrupted
                || matches!(run.exited.recv_timeout(grace), Err(RecvTimeoutError::Timeout))
            {
                warn!("Processing thread still blocked, detaching it");
                return;
            }
        }

        if run.thread.join().is_err() {
            error!("Processing thread panicked");
        }
    }

    /// Sets the frame delta. Values below 1 are rejected and logged.
    pub fn set_frame_delta(&self, delta: i64) -> Result<(), ConfigError> {
        match self.shared.config.set_frame_delta(delta) {
            Ok(delta) => {
                info!(delta, "Setting frame delta");
                Ok(())
            }
            Err(e) => {
                warn!(delta, error = %e, "Frame delta rejected");
                Err(e)
            }
        }
    }

    /// Sets the motion threshold. Values outside 0-255 are rejected and
    /// logged.
    pub fn set_motion_threshold(&self, threshold: i64) -> Result<(), ConfigError> {
        match self.shared.config.set_motion_threshold(threshold) {
            Ok(threshold) => {
                info!(threshold, "Setting motion threshold");
                Ok(())
            }
            Err(e) => {
                warn!(threshold, error = %e, "Motion threshold rejected");
                Err(e)
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        self.shared.state()
    }

    /// Current delta/threshold snapshot.
    pub fn config(&self) -> EngineConfig {
        self.shared.config.snapshot()
    }

    /// Path of the loaded file, if any.
    pub fn loaded_path(&self) -> Option<PathBuf> {
        self.lock_session().path.clone()
    }

    /// Metadata of the loaded file, if any.
    pub fn video_info(&self) -> Option<VideoInfo> {
        self.lock_session().info
    }

    /// Number of frames the worker currently retains for comparison.
    pub fn history_len(&self) -> usize {
        self.shared.history_len.load(Ordering::Acquire)
    }

    /// Runtime counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}

impl Drop for ProcessingEngine {
    fn drop(&mut self) {
        debug!("Processing engine dropped");
        let has_run = self.lock_session().run.is_some();
        if has_run {
            self.stop();
        }
    }
}
