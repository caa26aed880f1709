//! Decoded pixel buffers handed to the cache writer.
//!
//! Rows are padded to a 4-byte boundary, so `rowstride` can exceed
//! `width * channels`. Anything reading [`DecodedImage::pixels`] must step by
//! `rowstride`; [`DecodedImage::packed_pixels`] strips the padding for
//! encoders that expect tightly packed rows.

use image::DynamicImage;

/// Colorspace tag of a decoded buffer. Only RGB is produced today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Colorspace {
    Rgb,
}

/// Final pixel data of one thumbnail job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row, including trailing padding.
    pub rowstride: usize,
    pub bits_per_sample: u8,
    pub has_alpha: bool,
    pub colorspace: Colorspace,
}

/// Row length rounded up to the next multiple of 4 bytes.
pub(crate) fn padded_rowstride(width: u32, channels: usize) -> usize {
    (width as usize * channels + 3) & !3
}

impl DecodedImage {
    /// Lay out packed 8-bit RGB or RGBA rows with 4-byte row alignment.
    pub fn from_packed(packed: &[u8], width: u32, height: u32, has_alpha: bool) -> Self {
        let channels = if has_alpha { 4 } else { 3 };
        let row_len = width as usize * channels;
        let rowstride = padded_rowstride(width, channels);

        let mut pixels = vec![0u8; rowstride * height as usize];
        if row_len > 0 {
            for (dst, src) in pixels
                .chunks_exact_mut(rowstride)
                .zip(packed.chunks_exact(row_len))
            {
                dst[..row_len].copy_from_slice(src);
            }
        }

        Self {
            pixels,
            width,
            height,
            rowstride,
            bits_per_sample: 8,
            has_alpha,
            colorspace: Colorspace::Rgb,
        }
    }

    /// Convert a decoded image, keeping an alpha channel only if the source has one.
    pub fn from_dynamic(img: &DynamicImage) -> Self {
        if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            Self::from_packed(rgba.as_raw(), rgba.width(), rgba.height(), true)
        } else {
            let rgb = img.to_rgb8();
            Self::from_packed(rgb.as_raw(), rgb.width(), rgb.height(), false)
        }
    }

    pub fn channels(&self) -> usize {
        if self.has_alpha { 4 } else { 3 }
    }

    /// Pixel rows without padding, `width * channels` bytes each.
    pub fn packed_pixels(&self) -> Vec<u8> {
        let row_len = self.width as usize * self.channels();
        if row_len == self.rowstride {
            return self.pixels.clone();
        }
        self.pixels
            .chunks_exact(self.rowstride)
            .flat_map(|row| &row[..row_len])
            .copied()
            .collect()
    }
}
