//! Image decoding and scaling, pure Rust with no system libraries.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Fit to box** | [`scale_to_fit`]: aspect-preserving, never upscales |
//! | **Raster decode** | `image` crate, header first, Lanczos3 resample |
//! | **SVG/SVGZ decode** | `resvg`, rendered at the target size |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Pixbuf**: [`DecodedImage`], the row-padded output buffer
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]
//! - **Operations**: High-level functions combining calculations + backend

pub mod backend;
mod calculations;
pub mod operations;
mod pixbuf;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use calculations::scale_to_fit;
pub use operations::{load_and_scale, read_source, scale_image};
pub use pixbuf::{Colorspace, DecodedImage};
pub use rust_backend::RustBackend;
