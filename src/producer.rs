//! Thumbnail producers and the MIME type lookup table.
//!
//! A producer turns a resolved local path into something the image scaler
//! can consume: the directory producer picks a pre-rendered file, the
//! archive producer pulls the embedded preview out of a document. The
//! [`Registry`] maps each handled MIME type to exactly one producer.

use crate::archive::ArchiveSource;
use crate::config::ThumbsConfig;
use crate::directory::DirectorySource;
use crate::job::ThumbnailError;
use crate::request::Flavor;
use std::path::{Path, PathBuf};

pub const DIRECTORY_MIME: &str = "inode/directory";
pub const FCSTD_MIME: &str = "application/x-extension-fcstd";
pub const FCSTD_MIME_VND: &str = "application/vnd.freecad.fcstd";

/// What a producer hands to the image scaler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedSource {
    /// An encoded image on disk, read by the scaler itself.
    File(PathBuf),
    /// Encoded image bytes already in memory.
    Bytes(Vec<u8>),
}

pub trait ThumbnailProducer: Send + Sync {
    fn name(&self) -> &'static str;

    fn mime_types(&self) -> &'static [&'static str];

    /// Locate the encoded image for `path` at the given flavor.
    fn resolve(&self, path: &Path, flavor: &Flavor) -> Result<ResolvedSource, ThumbnailError>;
}

/// Directories carrying a `.thumbnails` folder of pre-rendered sizes.
#[derive(Debug, Clone, Default)]
pub struct DirectoryProducer {
    source: DirectorySource,
}

impl DirectoryProducer {
    pub fn new(source: DirectorySource) -> Self {
        Self { source }
    }
}

impl ThumbnailProducer for DirectoryProducer {
    fn name(&self) -> &'static str {
        "directory"
    }

    fn mime_types(&self) -> &'static [&'static str] {
        &[DIRECTORY_MIME]
    }

    fn resolve(&self, path: &Path, flavor: &Flavor) -> Result<ResolvedSource, ThumbnailError> {
        let best = self.source.locate(path, flavor.requested_size())?;
        Ok(ResolvedSource::File(best))
    }
}

/// FreeCAD documents with an embedded preview PNG.
#[derive(Debug, Clone, Default)]
pub struct ArchiveProducer {
    source: ArchiveSource,
}

impl ArchiveProducer {
    pub fn new(source: ArchiveSource) -> Self {
        Self { source }
    }
}

impl ThumbnailProducer for ArchiveProducer {
    fn name(&self) -> &'static str {
        "fcstd"
    }

    fn mime_types(&self) -> &'static [&'static str] {
        &[FCSTD_MIME, FCSTD_MIME_VND]
    }

    fn resolve(&self, path: &Path, _flavor: &Flavor) -> Result<ResolvedSource, ThumbnailError> {
        let entry = self.source.extract_file(path)?;
        Ok(ResolvedSource::Bytes(entry.raw_bytes))
    }
}

/// Static lookup table from MIME type to producer.
pub struct Registry {
    producers: Vec<Box<dyn ThumbnailProducer>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DirectoryProducer::default()),
            Box::new(ArchiveProducer::default()),
        ])
    }
}

impl Registry {
    pub fn new(producers: Vec<Box<dyn ThumbnailProducer>>) -> Self {
        Self { producers }
    }

    /// The two built-in producers, tuned by the `[directory]`, `[archive]`
    /// and `[limits]` config sections.
    pub fn from_config(config: &ThumbsConfig) -> Self {
        let directory = DirectorySource::new(
            config.directory.cache_dir_name.clone(),
            config.directory.extensions.clone(),
        );
        let archive = ArchiveSource::new(
            config.archive.preview_entries.clone(),
            config.limits.max_source_bytes,
        );
        Self::new(vec![
            Box::new(DirectoryProducer::new(directory)),
            Box::new(ArchiveProducer::new(archive)),
        ])
    }

    /// Producer handling `mime_type`. Matching ignores ASCII case.
    pub fn lookup(&self, mime_type: &str) -> Option<&dyn ThumbnailProducer> {
        self.producers
            .iter()
            .find(|p| p.mime_types().iter().any(|m| m.eq_ignore_ascii_case(mime_type)))
            .map(|p| p.as_ref())
    }

    /// Every MIME type some producer handles, in registration order.
    pub fn mime_types(&self) -> Vec<&'static str> {
        self.producers
            .iter()
            .flat_map(|p| p.mime_types().iter().copied())
            .collect()
    }
}

/// Best-effort MIME type for a local path, for callers without a sniffer.
pub fn guess_mime_type(path: &Path) -> Option<&'static str> {
    if path.is_dir() {
        return Some(DIRECTORY_MIME);
    }
    let ext = path.extension()?.to_str()?;
    ext.eq_ignore_ascii_case("fcstd").then_some(FCSTD_MIME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{thumbnails_dir, write_zip};

    #[test]
    fn registry_maps_builtin_mime_types() {
        let registry = Registry::default();
        assert_eq!(registry.lookup(DIRECTORY_MIME).unwrap().name(), "directory");
        assert_eq!(registry.lookup(FCSTD_MIME).unwrap().name(), "fcstd");
        assert_eq!(registry.lookup(FCSTD_MIME_VND).unwrap().name(), "fcstd");
        assert_eq!(
            registry.lookup("Application/X-Extension-FCStd").unwrap().name(),
            "fcstd"
        );
        assert!(registry.lookup("image/png").is_none());
    }

    #[test]
    fn registry_lists_mime_types_in_order() {
        assert_eq!(
            Registry::default().mime_types(),
            vec![DIRECTORY_MIME, FCSTD_MIME, FCSTD_MIME_VND]
        );
    }

    #[test]
    fn directory_producer_uses_larger_flavor_edge() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = thumbnails_dir(
            tmp.path(),
            &[("64.png", b"a".to_vec()), ("256.png", b"b".to_vec())],
        );

        let producer = DirectoryProducer::default();
        let wide = producer.resolve(&dir, &Flavor::new("wide", 300, 50)).unwrap();
        assert_eq!(wide, ResolvedSource::File(dir.join(".thumbnails/256.png")));

        let small = producer.resolve(&dir, &Flavor::square("normal", 128)).unwrap();
        assert_eq!(small, ResolvedSource::File(dir.join(".thumbnails/64.png")));
    }

    #[test]
    fn archive_producer_returns_bytes() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("part.FCStd");
        write_zip(&path, &[("Thumbnails/Thumbnail.png", b"png".to_vec())]);

        let source = ArchiveProducer::default()
            .resolve(&path, &Flavor::square("normal", 128))
            .unwrap();
        assert_eq!(source, ResolvedSource::Bytes(b"png".to_vec()));
    }

    #[test]
    fn from_config_applies_sections() {
        let mut config = ThumbsConfig::default();
        config.directory.cache_dir_name = ".previews".to_string();
        config.archive.preview_entries = vec!["preview.png".to_string()];

        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir(tmp.path().join(".previews")).unwrap();
        std::fs::write(tmp.path().join(".previews/32.png"), b"x").unwrap();
        let archive = tmp.path().join("part.fcstd");
        write_zip(&archive, &[("preview.png", b"custom".to_vec())]);

        let registry = Registry::from_config(&config);
        let flavor = Flavor::square("normal", 128);
        assert_eq!(
            registry
                .lookup(DIRECTORY_MIME)
                .unwrap()
                .resolve(tmp.path(), &flavor)
                .unwrap(),
            ResolvedSource::File(tmp.path().join(".previews/32.png"))
        );
        assert_eq!(
            registry
                .lookup(FCSTD_MIME)
                .unwrap()
                .resolve(&archive, &flavor)
                .unwrap(),
            ResolvedSource::Bytes(b"custom".to_vec())
        );
    }

    #[test]
    fn guesses_mime_from_path() {
        let tmp = tempfile::TempDir::new().unwrap();
        let part = tmp.path().join("Part.FCStd");
        std::fs::write(&part, b"x").unwrap();
        let notes = tmp.path().join("notes.txt");
        std::fs::write(&notes, b"x").unwrap();

        assert_eq!(guess_mime_type(tmp.path()), Some(DIRECTORY_MIME));
        assert_eq!(guess_mime_type(&part), Some(FCSTD_MIME));
        assert_eq!(guess_mime_type(&notes), None);
        assert_eq!(guess_mime_type(Path::new("/nonexistent/x.fcstd")), Some(FCSTD_MIME));
    }
}
