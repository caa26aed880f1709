//! High-level image operations.
//!
//! These functions combine calculations with backend execution: the
//! bounding box of the request is turned into a size hint, and the backend
//! decodes straight to the fitted size.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::scale_to_fit;
use super::pixbuf::DecodedImage;
use std::io::Read;
use std::path::Path;

/// Result type for image operations.
pub type Result<T> = std::result::Result<T, BackendError>;

/// Decode `data` so that it fits inside `bounds`, never upscaling.
pub fn scale_image(
    backend: &dyn ImageBackend,
    data: &[u8],
    bounds: Dimensions,
) -> Result<DecodedImage> {
    backend.decode(data, &mut |natural| {
        let target = scale_to_fit(natural, bounds);
        tracing::trace!(
            natural_width = natural.width,
            natural_height = natural.height,
            target_width = target.width,
            target_height = target.height,
            "size negotiated"
        );
        target
    })
}

/// Read a source image from disk, refusing files over `max_bytes`.
pub fn read_source(path: &Path, max_bytes: u64) -> Result<Vec<u8>> {
    let mut file = std::fs::File::open(path)?;
    let size = file.metadata()?.len();
    if size > max_bytes {
        return Err(BackendError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut data = Vec::with_capacity(size as usize);
    file.read_to_end(&mut data)?;
    Ok(data)
}

/// Read an image file and scale it into `bounds`.
pub fn load_and_scale(
    backend: &dyn ImageBackend,
    path: &Path,
    bounds: Dimensions,
    max_bytes: u64,
) -> Result<DecodedImage> {
    let data = read_source(path, max_bytes)?;
    scale_image(backend, &data, bounds)
}
