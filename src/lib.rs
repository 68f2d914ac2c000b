//! Motion Player Library
//!
//! A video playback engine that decodes a file on a background thread,
//! compares each frame with the one `delta` frames earlier and reports the
//! binary motion mask alongside the original frame, paced to real time.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! capture → history → detection → event sink
//!    ↑                               ↓
//!  engine (commands, pacing, state)  consumer
//! ```
//!
//! # Design Principles
//!
//! - **Single worker**: decoding, history and detection run on one thread
//!   per playback run
//! - **Live reconfiguration**: delta and threshold changes apply on the next
//!   frame without restarting
//! - **Bounded shutdown**: stops wait a fixed time, then interrupt the decoder
//! - **Events, not panics**: failures are reported through the sink
//!
//! # Example
//!
//! ```no_run
//! use motion_player::{
//!     capture::{SyntheticBackend, SyntheticConfig},
//!     config::EngineSettings,
//!     engine::{EngineEvent, ProcessingEngine},
//! };
//! use std::sync::Arc;
//!
//! let backend = Arc::new(SyntheticBackend::new(SyntheticConfig::default()));
//! let (engine, events) = ProcessingEngine::with_channel(backend, EngineSettings::default());
//!
//! engine.load("demo.mp4");
//! engine.start();
//!
//! for event in events.iter() {
//!     match event {
//!         EngineEvent::FramesReady { original, mask } => {
//!             println!("frame {}: {:.3}", original.sequence(), mask.motion_ratio());
//!         }
//!         EngineEvent::ProcessingFinished => break,
//!         _ => {}
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod capture;
pub mod config;
pub mod detection;
pub mod engine;
pub mod metrics;

// Re-export commonly used types at crate root
pub use capture::{FfmpegBackend, Frame, FrameSource, VideoBackend, VideoInfo};
pub use config::{ConfigError, FileConfig};
pub use detection::{detect, FrameHistory, MotionMask};
pub use engine::{EngineConfig, EngineEvent, EngineState, EventSink, ProcessingEngine};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
