//! Pure calculation functions for thumbnail dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

use super::backend::Dimensions;

/// Fit a source image inside a bounding box, preserving aspect ratio.
///
/// Sources that already fit are returned unchanged; thumbnails are never
/// upscaled. Otherwise the axis with the larger overshoot ratio is pinned to
/// the box and the other axis is derived from it, rounding half to even.
/// Both output dimensions are at least 1.
///
/// # Examples
/// ```
/// # use embedded_thumbs::imaging::{Dimensions, scale_to_fit};
/// let bounds = Dimensions { width: 128, height: 128 };
///
/// // 512x256 landscape → width pinned to 128
/// let scaled = scale_to_fit(Dimensions { width: 512, height: 256 }, bounds);
/// assert_eq!(scaled, Dimensions { width: 128, height: 64 });
///
/// // 100x50 already fits → untouched
/// let small = scale_to_fit(Dimensions { width: 100, height: 50 }, bounds);
/// assert_eq!(small, Dimensions { width: 100, height: 50 });
/// ```
pub fn scale_to_fit(source: Dimensions, bounds: Dimensions) -> Dimensions {
    let Dimensions {
        width: src_w,
        height: src_h,
    } = source;
    let mut dest_w = bounds.width;
    let mut dest_h = bounds.height;

    if src_w <= dest_w && src_h <= dest_h {
        dest_w = src_w;
        dest_h = src_h;
    } else {
        let wratio = src_w as f64 / dest_w as f64;
        let hratio = src_h as f64 / dest_h as f64;
        if hratio > wratio {
            // Taller than the box: height is pinned
            dest_w = (src_w as f64 / hratio).round_ties_even() as u32;
        } else {
            // Wider (or equally proportioned): width is pinned
            dest_h = (src_h as f64 / wratio).round_ties_even() as u32;
        }
    }

    Dimensions {
        width: dest_w.max(1),
        height: dest_h.max(1),
    }
}
