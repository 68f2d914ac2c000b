//! Motion detection between frames `delta` apart.
//!
//! [`FrameHistory`] keeps the sliding window of recent frames and
//! [`detect`] compares its two ends, producing a [`MotionMask`].

mod detector;
mod history;
mod mask;

pub use detector::{detect, DetectionError};
pub use history::FrameHistory;
pub use mask::{MotionMask, MOTION, STILL};
