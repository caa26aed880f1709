//! # embedded-thumbs
//!
//! Thumbnail producers for files that already carry their own preview:
//!
//! - **Folders** with a `.thumbnails` subdirectory of images named after the
//!   size they were rendered at (`64.png`, `128.png`, `256.svg`). The best fit
//!   for the requested size is picked.
//! - **FreeCAD documents** (`.FCStd`), ZIP archives that embed
//!   `Thumbnails/Thumbnail.png` at save time.
//!
//! Nothing is rendered from scratch. The chosen image is decoded straight to
//! the requested bounding box and handed to a cache writer.
//!
//! # Architecture
//!
//! ```text
//! ThumbnailRequest ──► Registry ──► DirectoryProducer ──► path  ─┐
//!   (uri, mime,         (by MIME)   ArchiveProducer   ──► bytes ─┤
//!    flavor, cancel)                                              ▼
//!                                      imaging::scale_image (decode with size hint)
//!                                                                 ▼
//!                                      CacheWriter::save ──► JobOutcome
//! ```
//!
//! Each request is one [`job::ThumbnailJob::run`] call. Jobs share nothing
//! mutable, so a host can run as many in parallel as it likes; the CLI uses
//! rayon.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`request`] | `ThumbnailRequest`, `Flavor`, cancellation, URI → local path |
//! | [`directory`] | Best-fit selection among `.thumbnails/<size>.<ext>` images |
//! | [`archive`] | Embedded preview extraction from ZIP-structured documents |
//! | [`imaging`] | Decode-with-size-hint backend, fit-to-box math, pixel buffers |
//! | [`producer`] | `ThumbnailProducer` trait, built-in producers, MIME registry |
//! | [`job`] | Orchestration state machine, `JobOutcome`, error kinds |
//! | [`cache`] | `CacheWriter` trait and the filesystem writer used by the CLI |
//! | [`config`] | `config.toml` loading, validation and merging onto defaults |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Scale During Decode
//!
//! Backends receive a size-hint callback that is answered as soon as the
//! natural dimensions are known. SVG sources are rasterized once, directly
//! at the target size; raster sources are resampled once with Lanczos3.
//!
//! ## Fit, Then Overshoot
//!
//! A folder's best image is the largest one not exceeding the request. Only
//! when every image is larger does the smallest of them win. Downscaling a
//! slightly larger image would look sharper, but upscaling is never done, so
//! a fitting image is always preferred.
//!
//! ## Pure-Rust Decoding
//!
//! The `image` crate and `resvg` cover PNG, JPEG and SVG without system
//! libraries, so the binary is self-contained.

pub mod archive;
pub mod cache;
pub mod config;
pub mod directory;
pub mod imaging;
pub mod job;
pub mod output;
pub mod producer;
pub mod request;

#[cfg(test)]
pub(crate) mod test_helpers;
