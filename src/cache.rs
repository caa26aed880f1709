//! Thumbnail cache writer.
//!
//! The job hands every decoded thumbnail to a [`CacheWriter`] and, when a
//! directory stops providing custom thumbnails, asks it to forget the old
//! one. Hosts with their own thumbnail store implement the trait; the CLI
//! uses [`FsCacheWriter`].
//!
//! # Layout
//!
//! ```text
//! <root>/
//! ├── .cache-manifest.json     # {relative path → uri, flavor, mtime}
//! ├── normal/
//! │   └── 3f2a…e1.png          # sha256(uri).png
//! └── large/
//!     └── 3f2a…e1.png
//! ```
//!
//! Files are named by the SHA-256 of the source URI so that any URI maps to
//! a flat, filesystem-safe name. Each PNG is written to a sibling temporary
//! file and renamed into place, so a reader never sees a half-written
//! thumbnail.
//!
//! The manifest records the source modification time each thumbnail was
//! rendered from. It is loaded once when the writer is opened and written
//! back by [`FsCacheWriter::flush`]; a missing, corrupt or outdated manifest
//! loads as empty.

use crate::imaging::DecodedImage;
use crate::request::Flavor;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Name of the cache manifest file within the cache root.
const MANIFEST_FILENAME: &str = ".cache-manifest.json";

/// Version of the cache manifest format. Bump this to invalidate all
/// existing manifests when the format changes.
const MANIFEST_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("PNG encoding failed: {0}")]
    Encode(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Cache manifest lock poisoned")]
    Poisoned,
}

/// Destination for finished thumbnails.
pub trait CacheWriter: Sync {
    /// Persist `image` as the `flavor` thumbnail of `uri`, rendered from a
    /// source last modified at `mtime`.
    fn save(
        &self,
        uri: &str,
        flavor: &Flavor,
        image: &DecodedImage,
        mtime: SystemTime,
    ) -> Result<(), CacheError>;

    /// Drop any stored `flavor` thumbnail of `uri`. Deleting a thumbnail that
    /// was never stored is not an error.
    fn delete(&self, uri: &str, flavor: &Flavor) -> Result<(), CacheError>;
}

/// A single cached thumbnail.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CacheEntry {
    pub uri: String,
    pub flavor: String,
    /// Source modification time, whole seconds since the Unix epoch.
    pub mtime: u64,
}

/// On-disk manifest mapping thumbnail paths (relative to the cache root)
/// to the source they were rendered from.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CacheManifest {
    pub version: u32,
    pub entries: HashMap<String, CacheEntry>,
}

impl CacheManifest {
    pub fn empty() -> Self {
        Self {
            version: MANIFEST_VERSION,
            entries: HashMap::new(),
        }
    }

    /// Load from the cache root. Returns an empty manifest if the file
    /// doesn't exist or can't be parsed (version mismatch, corruption).
    pub fn load(root: &Path) -> Self {
        let content = match std::fs::read_to_string(manifest_path(root)) {
            Ok(c) => c,
            Err(_) => return Self::empty(),
        };
        let manifest: Self = match serde_json::from_str(&content) {
            Ok(m) => m,
            Err(e) => {
                tracing::warn!(root = %root.display(), error = %e, "ignoring unreadable cache manifest");
                return Self::empty();
            }
        };
        if manifest.version != MANIFEST_VERSION {
            return Self::empty();
        }
        manifest
    }

    pub fn save(&self, root: &Path) -> Result<(), CacheError> {
        std::fs::create_dir_all(root)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(manifest_path(root), json)?;
        Ok(())
    }

    pub fn get(&self, relative_path: &str) -> Option<&CacheEntry> {
        self.entries.get(relative_path)
    }
}

/// Resolve the cache manifest path for a cache root.
pub fn manifest_path(root: &Path) -> PathBuf {
    root.join(MANIFEST_FILENAME)
}

/// SHA-256 of a source URI, returned as a hex string.
pub fn hash_uri(uri: &str) -> String {
    format!("{:x}", Sha256::digest(uri.as_bytes()))
}

/// Path of a thumbnail relative to the cache root: `<flavor>/<sha256>.png`.
pub fn thumbnail_relpath(uri: &str, flavor: &Flavor) -> String {
    format!("{}/{}.png", flavor.name, hash_uri(uri))
}

fn unix_seconds(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Encode `image` as PNG at `path`, via a temporary sibling and a rename.
pub fn write_png(path: &Path, image: &DecodedImage) -> Result<(), CacheError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let color = if image.has_alpha {
        image::ColorType::Rgba8
    } else {
        image::ColorType::Rgb8
    };
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);

    let written = image::save_buffer_with_format(
        &tmp,
        &image.packed_pixels(),
        image.width,
        image.height,
        color,
        image::ImageFormat::Png,
    )
    .map_err(CacheError::from)
    .and_then(|()| std::fs::rename(&tmp, path).map_err(CacheError::from));

    if written.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    written
}

/// Filesystem cache writer used by the command line tool.
pub struct FsCacheWriter {
    root: PathBuf,
    manifest: Mutex<CacheManifest>,
}

impl FsCacheWriter {
    /// Open (or start) a cache under `root`. Nothing is written until the
    /// first save.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let manifest = CacheManifest::load(&root);
        Self {
            root,
            manifest: Mutex::new(manifest),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn thumbnail_path(&self, uri: &str, flavor: &Flavor) -> PathBuf {
        self.root.join(thumbnail_relpath(uri, flavor))
    }

    /// Manifest record for a stored thumbnail, if any.
    pub fn entry(&self, uri: &str, flavor: &Flavor) -> Option<CacheEntry> {
        let manifest = self.manifest.lock().ok()?;
        manifest.get(&thumbnail_relpath(uri, flavor)).cloned()
    }

    /// Write the manifest back to disk.
    pub fn flush(&self) -> Result<(), CacheError> {
        let manifest = self.manifest.lock().map_err(|_| CacheError::Poisoned)?;
        manifest.save(&self.root)
    }
}

impl CacheWriter for FsCacheWriter {
    fn save(
        &self,
        uri: &str,
        flavor: &Flavor,
        image: &DecodedImage,
        mtime: SystemTime,
    ) -> Result<(), CacheError> {
        let relpath = thumbnail_relpath(uri, flavor);
        let path = self.root.join(&relpath);
        write_png(&path, image)?;
        tracing::debug!(uri, flavor = %flavor.name, path = %path.display(), "saved thumbnail");

        let mut manifest = self.manifest.lock().map_err(|_| CacheError::Poisoned)?;
        manifest.entries.insert(
            relpath,
            CacheEntry {
                uri: uri.to_string(),
                flavor: flavor.name.clone(),
                mtime: unix_seconds(mtime),
            },
        );
        Ok(())
    }

    fn delete(&self, uri: &str, flavor: &Flavor) -> Result<(), CacheError> {
        let relpath = thumbnail_relpath(uri, flavor);
        match std::fs::remove_file(self.root.join(&relpath)) {
            Ok(()) => tracing::debug!(uri, flavor = %flavor.name, "deleted cached thumbnail"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        let mut manifest = self.manifest.lock().map_err(|_| CacheError::Poisoned)?;
        manifest.entries.remove(&relpath);
        Ok(())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::{ImageBackend, RustBackend};
    use std::fs;
    use tempfile::TempDir;

    fn read_back(path: &Path) -> DecodedImage {
        let data = fs::read(path).unwrap();
        RustBackend::new()
            .decode(&data, &mut |natural| natural)
            .unwrap()
    }

    /// Records every call instead of touching the filesystem.
    #[derive(Default)]
    pub struct RecordingWriter {
        pub saves: Mutex<Vec<SavedThumbnail>>,
        pub deletes: Mutex<Vec<(String, String)>>,
        fail_saves: bool,
        fail_deletes: bool,
    }

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct SavedThumbnail {
        pub uri: String,
        pub flavor: String,
        pub width: u32,
        pub height: u32,
        pub mtime: SystemTime,
    }

    impl RecordingWriter {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn failing_saves() -> Self {
            Self {
                fail_saves: true,
                ..Self::default()
            }
        }

        pub fn failing_deletes() -> Self {
            Self {
                fail_deletes: true,
                ..Self::default()
            }
        }

        pub fn get_saves(&self) -> Vec<SavedThumbnail> {
            self.saves.lock().unwrap().clone()
        }

        pub fn get_deletes(&self) -> Vec<(String, String)> {
            self.deletes.lock().unwrap().clone()
        }
    }

    impl CacheWriter for RecordingWriter {
        fn save(
            &self,
            uri: &str,
            flavor: &Flavor,
            image: &DecodedImage,
            mtime: SystemTime,
        ) -> Result<(), CacheError> {
            if self.fail_saves {
                return Err(CacheError::Io(io::Error::other("disk full")));
            }
            self.saves.lock().unwrap().push(SavedThumbnail {
                uri: uri.to_string(),
                flavor: flavor.name.clone(),
                width: image.width,
                height: image.height,
                mtime,
            });
            Ok(())
        }

        fn delete(&self, uri: &str, flavor: &Flavor) -> Result<(), CacheError> {
            self.deletes
                .lock()
                .unwrap()
                .push((uri.to_string(), flavor.name.clone()));
            if self.fail_deletes {
                return Err(CacheError::Io(io::Error::other("read-only")));
            }
            Ok(())
        }
    }

    fn rgb_image(width: u32, height: u32) -> DecodedImage {
        let packed: Vec<u8> = (0..width * height * 3).map(|i| (i % 251) as u8).collect();
        DecodedImage::from_packed(&packed, width, height, false)
    }

    fn normal() -> Flavor {
        Flavor::square("normal", 128)
    }

    // =========================================================================
    // Naming
    // =========================================================================

    #[test]
    fn uri_hash_is_stable_hex() {
        let h = hash_uri("file:///srv/models");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(h, hash_uri("file:///srv/models"));
        assert_ne!(h, hash_uri("file:///srv/models/"));
    }

    #[test]
    fn relpath_groups_by_flavor() {
        let rel = thumbnail_relpath("file:///a", &Flavor::square("large", 256));
        assert!(rel.starts_with("large/"));
        assert!(rel.ends_with(".png"));
    }

    // =========================================================================
    // Manifest
    // =========================================================================

    #[test]
    fn load_missing_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        let m = CacheManifest::load(tmp.path());
        assert_eq!(m.version, MANIFEST_VERSION);
        assert!(m.entries.is_empty());
    }

    #[test]
    fn load_corrupt_manifest_is_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(manifest_path(tmp.path()), "{ not json").unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    #[test]
    fn load_wrong_version_is_empty() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            manifest_path(tmp.path()),
            r#"{"version": 999, "entries": {"normal/x.png": {"uri": "u", "flavor": "normal", "mtime": 1}}}"#,
        )
        .unwrap();
        assert!(CacheManifest::load(tmp.path()).entries.is_empty());
    }

    // =========================================================================
    // FsCacheWriter
    // =========================================================================

    #[test]
    fn save_writes_png_and_records_mtime() {
        let tmp = TempDir::new().unwrap();
        let writer = FsCacheWriter::open(tmp.path());
        let mtime = UNIX_EPOCH + std::time::Duration::from_secs(1_700_000_000);

        writer
            .save("file:///srv/part.FCStd", &normal(), &rgb_image(5, 3), mtime)
            .unwrap();

        let path = writer.thumbnail_path("file:///srv/part.FCStd", &normal());
        assert!(path.exists());
        let decoded = read_back(&path);
        assert_eq!((decoded.width, decoded.height), (5, 3));
        assert_eq!(decoded.packed_pixels(), rgb_image(5, 3).packed_pixels());

        let entry = writer.entry("file:///srv/part.FCStd", &normal()).unwrap();
        assert_eq!(entry.mtime, 1_700_000_000);
        assert_eq!(entry.flavor, "normal");
    }

    #[test]
    fn save_leaves_no_temporary_file() {
        let tmp = TempDir::new().unwrap();
        let writer = FsCacheWriter::open(tmp.path());
        writer
            .save("file:///a", &normal(), &rgb_image(2, 2), SystemTime::now())
            .unwrap();

        let names: Vec<_> = fs::read_dir(tmp.path().join("normal"))
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].ends_with(".png"));
    }

    #[test]
    fn save_keeps_alpha() {
        let tmp = TempDir::new().unwrap();
        let writer = FsCacheWriter::open(tmp.path());
        let image = DecodedImage::from_packed(&[10, 20, 30, 40], 1, 1, true);
        writer
            .save("file:///a", &normal(), &image, SystemTime::now())
            .unwrap();

        let decoded = read_back(&writer.thumbnail_path("file:///a", &normal()));
        assert!(decoded.has_alpha);
        assert_eq!(decoded.packed_pixels(), vec![10, 20, 30, 40]);
    }

    #[test]
    fn delete_removes_file_and_entry() {
        let tmp = TempDir::new().unwrap();
        let writer = FsCacheWriter::open(tmp.path());
        writer
            .save("file:///a", &normal(), &rgb_image(2, 2), SystemTime::now())
            .unwrap();

        writer.delete("file:///a", &normal()).unwrap();

        assert!(!writer.thumbnail_path("file:///a", &normal()).exists());
        assert!(writer.entry("file:///a", &normal()).is_none());
    }

    #[test]
    fn delete_unknown_thumbnail_is_ok() {
        let tmp = TempDir::new().unwrap();
        let writer = FsCacheWriter::open(tmp.path());
        writer.delete("file:///never", &normal()).unwrap();
    }

    #[test]
    fn flush_persists_manifest() {
        let tmp = TempDir::new().unwrap();
        let mtime = UNIX_EPOCH + std::time::Duration::from_secs(42);
        {
            let writer = FsCacheWriter::open(tmp.path());
            writer
                .save("file:///a", &normal(), &rgb_image(2, 2), mtime)
                .unwrap();
            writer.flush().unwrap();
        }

        let reopened = FsCacheWriter::open(tmp.path());
        assert_eq!(reopened.entry("file:///a", &normal()).unwrap().mtime, 42);
    }

    #[test]
    fn save_into_unwritable_root_fails() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("file");
        fs::write(&blocker, b"x").unwrap();

        let writer = FsCacheWriter::open(&blocker);
        let result = writer.save("file:///a", &normal(), &rgb_image(2, 2), SystemTime::now());
        assert!(result.is_err());
        assert!(writer.entry("file:///a", &normal()).is_none());
    }
}
