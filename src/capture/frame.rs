//! Frame type representing a decoded image with capture metadata.

use image::{DynamicImage, GrayImage};
use std::sync::Arc;
use std::time::Instant;

/// A single decoded frame.
///
/// The pixel buffer is immutable once captured and shared behind an `Arc`,
/// so the history buffer and any number of consumers can hold the same frame
/// without copying or aliasing mutable state.
#[derive(Clone)]
pub struct Frame {
    /// Decoded pixels (RGB from the decoder, luma or RGB from tests).
    image: Arc<DynamicImage>,
    /// Capture timestamp.
    timestamp: Instant,
    /// Monotonic capture order within one decode session, starting at 1.
    sequence: u64,
}

impl Frame {
    /// Creates a new frame from a decoded image.
    pub fn new(image: DynamicImage, sequence: u64) -> Self {
        Self {
            image: Arc::new(image),
            timestamp: Instant::now(),
            sequence,
        }
    }

    /// Builds a frame from a packed RGB24 buffer.
    ///
    /// Returns `None` if the buffer length does not match `width * height * 3`.
    pub fn from_rgb(width: u32, height: u32, pixels: Vec<u8>, sequence: u64) -> Option<Self> {
        image::RgbImage::from_raw(width, height, pixels)
            .map(|rgb| Self::new(DynamicImage::ImageRgb8(rgb), sequence))
    }

    /// Builds a frame from a single-channel buffer.
    pub fn from_luma(width: u32, height: u32, pixels: Vec<u8>, sequence: u64) -> Option<Self> {
        GrayImage::from_raw(width, height, pixels)
            .map(|gray| Self::new(DynamicImage::ImageLuma8(gray), sequence))
    }

    /// Returns the underlying image.
    #[inline]
    pub fn image(&self) -> &DynamicImage {
        &self.image
    }

    /// Returns the frame width.
    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Returns the frame height.
    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns the number of channels per pixel.
    #[inline]
    pub fn channels(&self) -> u8 {
        self.image.color().channel_count()
    }

    /// Returns the capture timestamp.
    #[inline]
    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    /// Returns the sequence number.
    #[inline]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the total number of pixels (width * height).
    #[inline]
    pub fn pixel_count(&self) -> usize {
        (self.width() as usize) * (self.height() as usize)
    }

    /// Converts the frame to single-channel luminance.
    pub fn luma(&self) -> GrayImage {
        self.image.to_luma8()
    }

    /// Returns true if both frames have the same width and height.
    pub fn same_dimensions(&self, other: &Frame) -> bool {
        self.width() == other.width() && self.height() == other.height()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("channels", &self.channels())
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Stream metadata reported by a frame source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    /// Frames per second as reported by the container. May be 0 or
    /// non-finite when the container omits rate metadata.
    pub fps: f64,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
}

impl VideoInfo {
    /// Returns true if the reported frame rate is usable for pacing.
    pub fn has_valid_fps(&self) -> bool {
        self.fps.is_finite() && self.fps > 0.0
    }

    /// Returns the frame rate, substituting `default_fps` when the reported
    /// one is unusable.
    pub fn effective_fps(&self, default_fps: f64) -> f64 {
        if self.has_valid_fps() {
            self.fps
        } else {
            default_fps
        }
    }
}
