//! Frame-delta motion detection.
//!
//! Converts both frames to luminance, takes the per-pixel absolute
//! difference and binarizes it: a difference strictly greater than the
//! threshold marks the pixel as moving.

use super::mask::{MotionMask, MOTION, STILL};
use crate::capture::Frame;
use image::GrayImage;
use thiserror::Error;

/// Errors returned by [`detect`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DetectionError {
    #[error("frame dimensions differ: {a_width}x{a_height} vs {b_width}x{b_height}")]
    DimensionMismatch {
        a_width: u32,
        a_height: u32,
        b_width: u32,
        b_height: u32,
    },
}

/// Computes the motion mask between two frames of equal size.
///
/// Pure and deterministic; neither input is modified.
pub fn detect(a: &Frame, b: &Frame, threshold: u8) -> Result<MotionMask, DetectionError> {
    if !a.same_dimensions(b) {
        return Err(DetectionError::DimensionMismatch {
            a_width: a.width(),
            a_height: a.height(),
            b_width: b.width(),
            b_height: b.height(),
        });
    }

    let luma_a = a.luma();
    let luma_b = b.luma();
    Ok(MotionMask::from_image(threshold_difference(
        &luma_a, &luma_b, threshold,
    )))
}

/// Binarized absolute difference of two equally sized luminance images.
fn threshold_difference(a: &GrayImage, b: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = a.clone();
    for (pixel, &other) in out.iter_mut().zip(b.as_raw().iter()) {
        *pixel = if pixel.abs_diff(other) > threshold {
            MOTION
        } else {
            STILL
        };
    }
    out
}
