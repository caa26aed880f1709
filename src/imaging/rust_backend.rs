//! Pure Rust decoding backend with no system library dependencies.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Sniff format | `image::ImageReader::with_guessed_format` |
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate decoders, dimensions read from the header first |
//! | Resample | `image::DynamicImage::resize_exact` with `Lanczos3` |
//! | Decode (SVG, SVGZ) | `resvg::usvg` parse + `resvg::render` straight into a pixmap of the target size |

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::pixbuf::DecodedImage;
use image::imageops::FilterType;
use image::{DynamicImage, ImageDecoder, ImageReader};
use resvg::{tiny_skia, usvg};
use std::io::Cursor;
use std::sync::{Arc, LazyLock};

/// System fonts for SVG text, loaded once per process.
static FONT_DB: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

/// Pure Rust backend using the `image` and `resvg` crates.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a raster image whose container format was recognized.
///
/// The header is parsed first so the size hint runs before pixel data is
/// materialized; the full decode and the single resample follow.
fn decode_raster(
    reader: ImageReader<Cursor<&[u8]>>,
    size_hint: &mut dyn FnMut(Dimensions) -> Dimensions,
) -> Result<DecodedImage, BackendError> {
    let decoder = reader
        .into_decoder()
        .map_err(|e| BackendError::DecodeFailed(e.to_string()))?;

    let (width, height) = decoder.dimensions();
    let natural = Dimensions { width, height };
    let target = size_hint(natural);

    let img = DynamicImage::from_decoder(decoder)
        .map_err(|e| BackendError::DecodeFailed(e.to_string()))?;

    let img = if target == natural {
        img
    } else {
        img.resize_exact(target.width, target.height, FilterType::Lanczos3)
    };
    Ok(DecodedImage::from_dynamic(&img))
}

/// Parse and render an SVG (gzip-compressed SVGZ is detected by usvg).
///
/// The document is rendered directly at the negotiated size, with no
/// full-resolution intermediate.
fn decode_svg(
    data: &[u8],
    size_hint: &mut dyn FnMut(Dimensions) -> Dimensions,
) -> Result<DecodedImage, BackendError> {
    let options = usvg::Options {
        fontdb: Arc::clone(&FONT_DB),
        ..usvg::Options::default()
    };
    let tree = usvg::Tree::from_data(data, &options).map_err(|e| match e {
        usvg::Error::NotAnUtf8Str | usvg::Error::ParsingFailed(_) => BackendError::Unsupported,
        other => BackendError::DecodeFailed(other.to_string()),
    })?;

    let size = tree.size();
    let natural = Dimensions {
        width: (size.width().ceil() as u32).max(1),
        height: (size.height().ceil() as u32).max(1),
    };
    let target = size_hint(natural);

    let mut pixmap = tiny_skia::Pixmap::new(target.width, target.height).ok_or_else(|| {
        BackendError::DecodeFailed(format!(
            "Failed to allocate {}x{} pixmap",
            target.width, target.height
        ))
    })?;
    let transform = tiny_skia::Transform::from_scale(
        target.width as f32 / size.width(),
        target.height as f32 / size.height(),
    );
    resvg::render(&tree, transform, &mut pixmap.as_mut());

    // tiny-skia stores premultiplied alpha
    let packed: Vec<u8> = pixmap
        .pixels()
        .iter()
        .flat_map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
        .collect();
    Ok(DecodedImage::from_packed(
        &packed,
        target.width,
        target.height,
        true,
    ))
}

impl ImageBackend for RustBackend {
    fn decode(
        &self,
        data: &[u8],
        size_hint: &mut dyn FnMut(Dimensions) -> Dimensions,
    ) -> Result<DecodedImage, BackendError> {
        let reader = ImageReader::new(Cursor::new(data)).with_guessed_format()?;
        if reader.format().is_some() {
            decode_raster(reader, size_hint)
        } else {
            decode_svg(data, size_hint)
        }
    }
}
