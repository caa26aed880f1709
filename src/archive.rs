//! Embedded preview extraction from ZIP-structured documents.
//!
//! FreeCAD stores a `.FCStd` document as a plain ZIP archive and embeds a
//! PNG rendered at save time. Only the central directory and the one preview
//! entry are read; the rest of the archive is never decompressed.

use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use thiserror::Error;
use zip::ZipArchive;
use zip::result::ZipError;

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to open as ZIP archive: {0}")]
    Malformed(ZipError),
    #[error("No preview image in archive (tried {})", .tried.join(", "))]
    NoPreview { tried: Vec<String> },
    #[error("Preview entry {name} is {size} bytes, limit is {limit}")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Errors from parsing the container. A stream that ends early or holds
/// garbage where a header should be is a malformed archive, not an I/O
/// failure; only genuine read errors stay [`ArchiveError::Io`].
impl From<ZipError> for ArchiveError {
    fn from(e: ZipError) -> Self {
        match e {
            ZipError::Io(err)
                if !matches!(
                    err.kind(),
                    io::ErrorKind::UnexpectedEof | io::ErrorKind::InvalidData
                ) =>
            {
                ArchiveError::Io(err)
            }
            other => ArchiveError::Malformed(other),
        }
    }
}

const INITIAL_CAPACITY: u64 = 64 * 1024;

/// A preview entry pulled out of an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub raw_bytes: Vec<u8>,
}

/// Locates and reads the embedded preview of a document archive.
#[derive(Debug, Clone)]
pub struct ArchiveSource {
    entries: Vec<String>,
    max_bytes: u64,
}

impl Default for ArchiveSource {
    fn default() -> Self {
        Self::new(
            vec![
                "Thumbnails/Thumbnail.png".to_string(),
                "thumbnails/Thumbnail.png".to_string(),
                "Thumbnail.png".to_string(),
            ],
            24 * 1024 * 1024,
        )
    }
}

impl ArchiveSource {
    /// `entries` are tried in order; the first one present wins.
    pub fn new(entries: Vec<String>, max_bytes: u64) -> Self {
        Self { entries, max_bytes }
    }

    /// Extract the preview from the archive at `path`.
    pub fn extract_file(&self, path: &Path) -> Result<ArchiveEntry, ArchiveError> {
        let file = File::open(path)?;
        let entry = self.extract(file)?;
        tracing::debug!(
            archive = %path.display(),
            entry = %entry.name,
            bytes = entry.raw_bytes.len(),
            "extracted embedded preview"
        );
        Ok(entry)
    }

    /// Extract the preview from any seekable stream holding a ZIP archive.
    pub fn extract<R: Read + Seek>(&self, reader: R) -> Result<ArchiveEntry, ArchiveError> {
        let mut archive = ZipArchive::new(reader)?;

        let Some((name, index)) = self
            .entries
            .iter()
            .find_map(|name| archive.index_for_name(name).map(|i| (name, i)))
        else {
            return Err(ArchiveError::NoPreview {
                tried: self.entries.clone(),
            });
        };

        let mut file = archive.by_index(index)?;
        let size = file.size();
        if size > self.max_bytes {
            return Err(ArchiveError::TooLarge {
                name: name.clone(),
                size,
                limit: self.max_bytes,
            });
        }

        // The header size is not trusted: reading stops one byte past the limit
        // and the buffer grows as bytes actually arrive.
        let mut raw_bytes = Vec::with_capacity(size.min(INITIAL_CAPACITY) as usize);
        file.by_ref()
            .take(self.max_bytes + 1)
            .read_to_end(&mut raw_bytes)?;
        if raw_bytes.len() as u64 > self.max_bytes {
            return Err(ArchiveError::TooLarge {
                name: name.clone(),
                size: raw_bytes.len() as u64,
                limit: self.max_bytes,
            });
        }

        Ok(ArchiveEntry {
            name: name.clone(),
            raw_bytes,
        })
    }
}
