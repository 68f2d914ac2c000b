//! Binary motion mask.

use image::GrayImage;

/// Value of a pixel marked as moving.
pub const MOTION: u8 = 255;
/// Value of a still pixel.
pub const STILL: u8 = 0;

/// Single-channel binary image produced by one detection.
///
/// Every pixel is either [`MOTION`] or [`STILL`]. An empty (0x0) mask is
/// emitted while the history window is still filling.
#[derive(Clone, PartialEq)]
pub struct MotionMask {
    image: GrayImage,
}

impl MotionMask {
    /// Placeholder mask emitted before enough history exists.
    pub fn empty() -> Self {
        Self {
            image: GrayImage::new(0, 0),
        }
    }

    pub(crate) fn from_image(image: GrayImage) -> Self {
        Self { image }
    }

    /// Returns true for the placeholder mask.
    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Returns the mask as a grayscale image.
    pub fn image(&self) -> &GrayImage {
        &self.image
    }

    /// Consumes the mask, returning the grayscale image.
    pub fn into_image(self) -> GrayImage {
        self.image
    }

    /// Raw mask bytes, row-major.
    pub fn as_raw(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Number of pixels marked as moving.
    pub fn motion_pixels(&self) -> usize {
        self.as_raw().iter().filter(|&&v| v == MOTION).count()
    }

    /// Fraction of pixels marked as moving, 0.0 for the placeholder.
    pub fn motion_ratio(&self) -> f64 {
        let total = self.as_raw().len();
        if total == 0 {
            return 0.0;
        }
        self.motion_pixels() as f64 / total as f64
    }
}

impl std::fmt::Debug for MotionMask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotionMask")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("motion_pixels", &self.motion_pixels())
            .finish()
    }
}
