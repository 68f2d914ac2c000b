//! Synthetic backend that generates deterministic frames.
//!
//! Used by the engine tests and by the CLI's `--synthetic` mode. Frames are
//! RGB gradients that shift with the sequence number, so consecutive frames
//! differ and the motion mask is non-trivial.

use super::{Frame, FrameSource, Interrupter, SourceError, VideoBackend, VideoInfo};
use crossbeam_channel::{bounded, Receiver, Sender};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Parameters for generated streams.
#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Reported frame rate (0 simulates missing metadata).
    pub fps: f64,
    /// Frames per stream; `None` never ends.
    pub frame_count: Option<u64>,
    /// Simulated decode cost per frame.
    pub read_delay: Duration,
    /// After this many frames, `read_next` blocks until interrupted.
    pub stall_after: Option<u64>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 32,
            height: 24,
            fps: 30.0,
            frame_count: Some(90),
            read_delay: Duration::ZERO,
            stall_after: None,
        }
    }
}

/// Backend producing [`SyntheticConfig`] streams for any path.
#[derive(Debug, Clone)]
pub struct SyntheticBackend {
    config: SyntheticConfig,
    available: Arc<AtomicBool>,
    opened: Arc<AtomicUsize>,
}

impl SyntheticBackend {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            available: Arc::new(AtomicBool::new(true)),
            opened: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Makes subsequent probes and opens fail, as if the file disappeared.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Number of decode sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    fn info(&self) -> VideoInfo {
        VideoInfo {
            fps: self.config.fps,
            width: self.config.width,
            height: self.config.height,
        }
    }

    fn check_available(&self, path: &Path) -> Result<(), SourceError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SourceError::cannot_open(path, "synthetic source unavailable"))
        }
    }
}

impl Default for SyntheticBackend {
    fn default() -> Self {
        Self::new(SyntheticConfig::default())
    }
}

impl VideoBackend for SyntheticBackend {
    fn probe(&self, path: &Path) -> Result<VideoInfo, SourceError> {
        self.check_available(path)?;
        Ok(self.info())
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
        self.check_available(path)?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        let (interrupt_tx, interrupt_rx) = bounded(1);
        Ok(Box::new(SyntheticSource {
            info: self.info(),
            config: self.config.clone(),
            sequence: 0,
            interrupt_tx,
            interrupt_rx,
            opened: Arc::clone(&self.opened),
        }))
    }
}

struct SyntheticSource {
    info: VideoInfo,
    config: SyntheticConfig,
    sequence: u64,
    interrupt_tx: Sender<()>,
    interrupt_rx: Receiver<()>,
    opened: Arc<AtomicUsize>,
}

impl FrameSource for SyntheticSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_next(&mut self) -> Result<Option<Frame>, SourceError> {
        if self
            .config
            .stall_after
            .is_some_and(|limit| self.sequence >= limit)
        {
            // Simulates a decoder wedged on I/O.
            let _ = self.interrupt_rx.recv();
            return Err(SourceError::Decode("decode interrupted".into()));
        }
        if self
            .config
            .frame_count
            .is_some_and(|count| self.sequence >= count)
        {
            return Ok(None);
        }
        if !self.config.read_delay.is_zero() {
            std::thread::sleep(self.config.read_delay);
        }

        self.sequence += 1;
        Ok(Some(synthetic_frame(
            self.config.width,
            self.config.height,
            self.sequence,
        )))
    }

    fn interrupter(&self) -> Option<Interrupter> {
        let tx = self.interrupt_tx.clone();
        Some(Interrupter::new(move || {
            let _ = tx.try_send(());
        }))
    }
}

impl Drop for SyntheticSource {
    fn drop(&mut self) {
        self.opened.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Generates frame `sequence` of a synthetic stream.
pub fn synthetic_frame(width: u32, height: u32, sequence: u64) -> Frame {
    let shift = (sequence % 256) as u32 * 16;
    let rgb = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            ((x * 8 + shift) % 256) as u8,
            ((y * 8 + shift / 2) % 256) as u8,
            (((x + y) * 4) % 256) as u8,
        ])
    });
    Frame::new(DynamicImage::ImageRgb8(rgb), sequence)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthetic_lifecycle() {
        let backend = SyntheticBackend::new(SyntheticConfig {
            frame_count: Some(3),
            ..Default::default()
        });
        let path = Path::new("synthetic");

        let info = backend.probe(path).unwrap();
        assert_eq!(info.width, 32);
        assert_eq!(backend.open_sessions(), 0);

        let mut source = backend.open(path).unwrap();
        assert_eq!(backend.open_sessions(), 1);

        let first = source.read_next().unwrap().unwrap();
        assert_eq!(first.sequence(), 1);
        assert_eq!(first.channels(), 3);
        assert!(source.read_next().unwrap().is_some());
        assert!(source.read_next().unwrap().is_some());
        assert!(source.read_next().unwrap().is_none());

        drop(source);
        assert_eq!(backend.open_sessions(), 0);
    }

    #[test]
    fn test_unavailable_backend() {
        let backend = SyntheticBackend::default();
        backend.set_available(false);

        assert!(matches!(
            backend.probe(Path::new("x")),
            Err(SourceError::CannotOpen { .. })
        ));
        assert!(backend.open(Path::new("x")).is_err());
    }

    #[test]
    fn test_stall_released_by_interrupter() {
        let backend = SyntheticBackend::new(SyntheticConfig {
            stall_after: Some(1),
            ..Default::default()
        });
        let mut source = backend.open(Path::new("x")).unwrap();
        assert!(source.read_next().unwrap().is_some());

        source.interrupter().unwrap().interrupt();
        assert!(matches!(source.read_next(), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_consecutive_frames_differ() {
        let a = synthetic_frame(16, 16, 1);
        let b = synthetic_frame(16, 16, 2);

        assert_ne!(a.luma().into_raw(), b.luma().into_raw());
    }
}
