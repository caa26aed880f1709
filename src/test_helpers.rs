//! Shared test utilities for the embedded-thumbs test suite.
//!
//! Fixtures are synthesized in memory rather than checked in: encoded images
//! of any size via the `image` crate encoders, and ZIP containers (FreeCAD
//! documents are plain ZIP archives) via `zip::ZipWriter`.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = tempfile::TempDir::new().unwrap();
//! let dir = thumbnails_dir(tmp.path(), &[("128.png", encode_png(128, 128))]);
//!
//! let fcstd = tmp.path().join("part.FCStd");
//! write_zip(&fcstd, &[("Thumbnails/Thumbnail.png", encode_png(512, 512))]);
//! ```

use image::{ImageEncoder, Rgb, RgbImage, Rgba, RgbaImage};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

// =========================================================================
// Encoded images
// =========================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    })
}

/// PNG bytes of an RGB gradient.
pub fn encode_png(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

/// PNG bytes of a half-transparent RGBA image.
pub fn encode_png_rgba(width: u32, height: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 128]));
    let mut out = Vec::new();
    image::codecs::png::PngEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
    out
}

/// JPEG bytes of an RGB gradient.
pub fn encode_jpeg(width: u32, height: u32) -> Vec<u8> {
    let img = gradient(width, height);
    let mut out = Vec::new();
    image::codecs::jpeg::JpegEncoder::new(&mut out)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
    out
}

// =========================================================================
// ZIP containers
// =========================================================================

/// Build a deflate-compressed ZIP archive in memory.
pub fn zip_bytes(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

/// Write a ZIP archive to `path`.
pub fn write_zip(path: &Path, entries: &[(&str, Vec<u8>)]) {
    std::fs::write(path, zip_bytes(entries)).unwrap();
}

// =========================================================================
// Directory fixtures
// =========================================================================

/// Create `<root>/.thumbnails/` holding the given files and return `root`.
pub fn thumbnails_dir(root: &Path, files: &[(&str, Vec<u8>)]) -> PathBuf {
    let cache = root.join(".thumbnails");
    std::fs::create_dir_all(&cache).unwrap();
    for (name, data) in files {
        std::fs::write(cache.join(name), data).unwrap();
    }
    root.to_path_buf()
}
