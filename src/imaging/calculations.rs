//! Pure calculation functions for output geometry.
//!
//! All functions here are pure and testable without any I/O or images.

use crate::error::TransformError;

/// Output pixel dimensions of a transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetGeometry {
    pub width: u32,
    pub height: u32,
}

/// Compute the contain-fit target for an original and optional bounds.
///
/// - Neither bound: the original size.
/// - Width only: width is exact, height follows the aspect ratio.
/// - Height only: height is exact, width follows the aspect ratio.
/// - Both: the largest size that fits inside the box without cropping or
///   padding; one side equals its bound.
///
/// Enlargement is allowed. A zero-sized original, or a bound so small that a
/// side rounds to zero, is rejected instead of clamped.
///
/// # Examples
/// ```
/// # use imgforge::imaging::calculations::contain_fit;
/// // 1920x1080 into a 300x200 box → scale 0.15625 → 300x169
/// let t = contain_fit((1920, 1080), Some(300), Some(200)).unwrap();
/// assert_eq!((t.width, t.height), (300, 169));
/// ```
pub fn contain_fit(
    original: (u32, u32),
    width: Option<u32>,
    height: Option<u32>,
) -> Result<TargetGeometry, TransformError> {
    let (src_w, src_h) = original;
    if src_w == 0 || src_h == 0 {
        return Err(TransformError::InvalidParameter(format!(
            "source image has zero dimension ({src_w}x{src_h})"
        )));
    }

    let (w, h) = match (width, height) {
        (None, None) => (src_w, src_h),
        (Some(w), None) => (w, scale_side(src_h, w as f64 / src_w as f64)),
        (None, Some(h)) => (scale_side(src_w, h as f64 / src_h as f64), h),
        (Some(w), Some(h)) => {
            let scale = (w as f64 / src_w as f64).min(h as f64 / src_h as f64);
            (scale_side(src_w, scale), scale_side(src_h, scale))
        }
    };

    if w == 0 || h == 0 {
        return Err(TransformError::InvalidParameter(format!(
            "resize of {src_w}x{src_h} to fit {} would produce a zero-sized image",
            describe_bounds(width, height)
        )));
    }

    Ok(TargetGeometry {
        width: w,
        height: h,
    })
}

fn scale_side(side: u32, scale: f64) -> u32 {
    let scaled = (side as f64 * scale).round();
    if scaled >= u32::MAX as f64 {
        u32::MAX
    } else {
        scaled as u32
    }
}

fn describe_bounds(width: Option<u32>, height: Option<u32>) -> String {
    let side = |v: Option<u32>| v.map_or_else(|| "auto".to_string(), |v| v.to_string());
    format!("{}x{}", side(width), side(height))
}
