//! Image decoding backend trait and shared types.
//!
//! The [`ImageBackend`] trait models a decoder with a size-negotiation hook:
//! as soon as the decoder knows the natural pixel dimensions of the source
//! (before any pixel data is materialized) it calls the hook, and the hook
//! answers with the dimensions the output must have. Backends that can
//! render at an arbitrary resolution (SVG) use the answer directly; raster
//! backends decode and resample once.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend): pure Rust, everything
//! statically linked into the binary.

use super::pixbuf::DecodedImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Source is {size} bytes, over the {limit} byte limit")]
    TooLarge { size: u64, limit: u64 },
    #[error("Unrecognized image format")]
    Unsupported,
    #[error("Decoding failed: {0}")]
    DecodeFailed(String),
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Trait for image decoding backends.
pub trait ImageBackend: Sync {
    /// Decode `data` completely.
    ///
    /// `size_hint` is called exactly once with the natural dimensions of the
    /// source and returns the dimensions of the returned image. A backend
    /// must return an error rather than a partially decoded image.
    fn decode(
        &self,
        data: &[u8],
        size_hint: &mut dyn FnMut(Dimensions) -> Dimensions,
    ) -> Result<DecodedImage, BackendError>;
}
