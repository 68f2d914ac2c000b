//! Video input and frame handling.
//!
//! This module provides the decode side of the engine: a trait-based
//! abstraction over video backends, the frame type passed through the
//! pipeline, and stream metadata. The FFmpeg backend decodes real files;
//! the synthetic backend generates deterministic streams for tests.

mod ffmpeg;
mod frame;
mod source;
mod synthetic;

pub use ffmpeg::FfmpegBackend;
pub use frame::{Frame, VideoInfo};
pub use source::{FrameSource, Interrupter, SourceError, VideoBackend};
pub use synthetic::{synthetic_frame, SyntheticBackend, SyntheticConfig};
