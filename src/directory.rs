//! Best-fit selection among pre-rendered directory thumbnails.
//!
//! A directory opts into custom thumbnails by carrying a `.thumbnails`
//! subdirectory of images named after the pixel size they were rendered at:
//!
//! ```text
//! project/
//! └── .thumbnails/
//!     ├── 64.png
//!     ├── 128.png
//!     ├── 256.svg
//!     └── notes.txt        # ignored: stem is not a number
//! ```
//!
//! ## Naming rules
//!
//! - The extension (case-insensitive) must be one of the configured image
//!   extensions (`png, jpg, jpeg, svg, svgz` by default).
//! - The stem must consist of ASCII digits only and parse to a positive
//!   `u32` (`0128.png` is 128; `+5.png`, ` 5.png`, `0.png` never qualify).
//!
//! ## Selection
//!
//! The requested size is the larger edge of the flavor. The largest
//! candidate that does not exceed it wins; if every candidate is larger,
//! the smallest of those wins. Candidates are compared in one pass over the
//! directory listing (whose order is filesystem-dependent) and the result
//! does not depend on that order.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("Directory does not have {cache_dir_name} subdirectory: {dir}")]
    NoCacheDirectory { dir: PathBuf, cache_dir_name: String },
    #[error("No suitable thumbnail image found in {0}")]
    NoCandidate(PathBuf),
    #[error("Failed to list {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// A cached image whose filename encodes the size it was rendered at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub path: PathBuf,
    pub size: u32,
}

/// Parse the encoded size from a `.thumbnails` entry name like `128.png`.
///
/// Returns `None` for names that don't qualify (see the module docs).
pub fn parse_candidate_size(file_name: &str, extensions: &[String]) -> Option<u32> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
        return None;
    }
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse::<u32>().ok().filter(|&size| size > 0)
}

/// Whether `size` should replace the current best `best` for `requested`.
///
/// - A candidate that fits beats any candidate that overshoots.
/// - Among fitting candidates, larger wins.
/// - Among overshooting candidates, smaller wins.
fn is_better(size: u32, best: u32, requested: u32) -> bool {
    if size <= requested {
        best > requested || size > best
    } else {
        best > requested && size < best
    }
}

/// Pick the best candidate for `requested`, or `None` if there are none.
pub fn select_best<I>(candidates: I, requested: u32) -> Option<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    candidates.into_iter().fold(None, |best, candidate| match best {
        None => Some(candidate),
        Some(current) if is_better(candidate.size, current.size, requested) => Some(candidate),
        keep => keep,
    })
}

/// Locates the best pre-rendered thumbnail of a directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    cache_dir_name: String,
    extensions: Vec<String>,
}

impl Default for DirectorySource {
    fn default() -> Self {
        Self::new(
            ".thumbnails",
            ["png", "jpg", "jpeg", "svg", "svgz"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
        )
    }
}

impl DirectorySource {
    pub fn new(cache_dir_name: impl Into<String>, extensions: Vec<String>) -> Self {
        Self {
            cache_dir_name: cache_dir_name.into(),
            extensions,
        }
    }

    pub fn cache_dir(&self, dir: &Path) -> PathBuf {
        dir.join(&self.cache_dir_name)
    }

    /// List every qualifying candidate in `cache_dir`, in listing order.
    pub fn candidates(&self, cache_dir: &Path) -> Result<Vec<Candidate>, DirectoryError> {
        let entries = fs::read_dir(cache_dir).map_err(|source| DirectoryError::Io {
            path: cache_dir.to_path_buf(),
            source,
        })?;

        let mut candidates = Vec::new();
        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!(dir = %cache_dir.display(), error = %e, "skipping unreadable entry");
                    continue;
                }
            };
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if let Some(size) = parse_candidate_size(name, &self.extensions) {
                candidates.push(Candidate {
                    path: entry.path(),
                    size,
                });
            }
        }
        Ok(candidates)
    }

    /// Find the best image for `requested_size` under `<dir>/.thumbnails`.
    ///
    /// [`DirectoryError::NoCacheDirectory`] is distinct from
    /// [`DirectoryError::NoCandidate`]: only the former means the directory
    /// no longer provides custom thumbnails at all.
    pub fn locate(&self, dir: &Path, requested_size: u32) -> Result<PathBuf, DirectoryError> {
        if !dir.is_dir() {
            return Err(DirectoryError::NotADirectory(dir.to_path_buf()));
        }

        let cache_dir = self.cache_dir(dir);
        if !cache_dir.is_dir() {
            return Err(DirectoryError::NoCacheDirectory {
                dir: dir.to_path_buf(),
                cache_dir_name: self.cache_dir_name.clone(),
            });
        }

        let candidates = self.candidates(&cache_dir)?;
        let count = candidates.len();
        let best = select_best(candidates, requested_size)
            .ok_or_else(|| DirectoryError::NoCandidate(cache_dir.clone()))?;

        tracing::debug!(
            dir = %dir.display(),
            requested_size,
            candidates = count,
            selected = best.size,
            "selected pre-rendered thumbnail"
        );
        Ok(best.path)
    }
}
