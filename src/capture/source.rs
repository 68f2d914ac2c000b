//! Frame source abstraction.
//!
//! A [`VideoBackend`] knows how to probe and open video files; each open
//! produces a [`FrameSource`], one sequential decode session bound to one
//! path. The split lets the engine read metadata on the caller's thread
//! without consuming frames from the session the worker later reads.

use super::{Frame, VideoInfo};
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Errors that can occur while probing or decoding a video.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("cannot open video {path}: {reason}")]
    CannotOpen { path: String, reason: String },
    #[error("failed to probe stream metadata: {0}")]
    Probe(String),
    #[error("failed to decode frame: {0}")]
    Decode(String),
    #[error("failed to spawn decoder: {0}")]
    Spawn(#[from] std::io::Error),
}

impl SourceError {
    pub(crate) fn cannot_open(path: &Path, reason: impl Into<String>) -> Self {
        SourceError::CannotOpen {
            path: path.display().to_string(),
            reason: reason.into(),
        }
    }
}

/// Factory for decode sessions.
///
/// Shared between the caller (for probing) and the worker (for opening),
/// hence `Send + Sync`.
pub trait VideoBackend: Send + Sync {
    /// Reads stream metadata without leaving a session open.
    fn probe(&self, path: &Path) -> Result<VideoInfo, SourceError>;

    /// Opens a fresh decode session positioned at the first frame.
    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, SourceError>;
}

/// One sequential decode session.
///
/// Dropping the session releases every resource it holds.
pub trait FrameSource: Send {
    /// Stream metadata for this session.
    fn info(&self) -> VideoInfo;

    /// Blocks until the next frame is decoded.
    ///
    /// Returns `Ok(None)` at a clean end of stream.
    fn read_next(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Returns a handle that aborts a blocked [`read_next`](Self::read_next)
    /// from another thread, if the source supports it.
    fn interrupter(&self) -> Option<Interrupter> {
        None
    }
}

/// Aborts a blocked decode from outside the worker.
///
/// Used only on the forced-shutdown path, after a cooperative stop timed out.
#[derive(Clone)]
pub struct Interrupter(Arc<dyn Fn() + Send + Sync>);

impl Interrupter {
    pub fn new(f: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Triggers the interrupt. Safe to call more than once.
    pub fn interrupt(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Interrupter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Interrupter")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_interrupter_invokes_callback() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let interrupter = Interrupter::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let copy = interrupter.clone();
        interrupter.interrupt();
        copy.interrupt();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_cannot_open_message() {
        let err = SourceError::cannot_open(Path::new("/tmp/missing.mp4"), "file not found");
        assert_eq!(
            err.to_string(),
            "cannot open video /tmp/missing.mp4: file not found"
        );
    }
}
