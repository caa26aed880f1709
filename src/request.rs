//! Thumbnail requests as handed over by the host service.
//!
//! A request names its source by URI (or plain path), carries the MIME type
//! the host detected, the [`Flavor`] it wants and a [`Cancellable`] the host
//! can trip before the job starts. Requests are immutable once built.

use crate::imaging::Dimensions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use url::Url;

/// A named output size profile, e.g. `normal` (128×128) or `large` (256×256).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flavor {
    pub name: String,
    width: u32,
    height: u32,
}

impl Flavor {
    /// A bounding box of `width` × `height`. Zero extents are raised to 1.
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn square(name: impl Into<String>, size: u32) -> Self {
        Self::new(name, size, size)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// The box the thumbnail must fit in.
    pub fn bounds(&self) -> Dimensions {
        Dimensions {
            width: self.width,
            height: self.height,
        }
    }

    /// The single size used to pick among pre-rendered images: the larger edge.
    pub fn requested_size(&self) -> u32 {
        self.width.max(self.height)
    }
}

/// Cooperative cancellation flag shared between the host and a job.
///
/// Jobs poll it once, before any work begins.
#[derive(Debug, Clone, Default)]
pub struct Cancellable(Arc<AtomicBool>);

impl Cancellable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct ThumbnailRequest {
    pub uri: String,
    pub mime_type: String,
    pub flavor: Flavor,
    pub cancellable: Cancellable,
}

impl ThumbnailRequest {
    pub fn new(uri: impl Into<String>, mime_type: impl Into<String>, flavor: Flavor) -> Self {
        Self {
            uri: uri.into(),
            mime_type: mime_type.into(),
            flavor,
            cancellable: Cancellable::new(),
        }
    }

    /// Build a request for a local path, using a `file://` URI when the path
    /// is absolute.
    pub fn for_path(path: &Path, mime_type: impl Into<String>, flavor: Flavor) -> Self {
        let uri = Url::from_file_path(path)
            .map(String::from)
            .unwrap_or_else(|()| path.to_string_lossy().into_owned());
        Self::new(uri, mime_type, flavor)
    }

    pub fn with_cancellable(mut self, cancellable: Cancellable) -> Self {
        self.cancellable = cancellable;
        self
    }

    /// Resolve the URI to a local filesystem path.
    ///
    /// Strings without a scheme separator are taken as paths. `file://` URIs
    /// are decoded; any other scheme has no local path, so a job for an
    /// `sftp://` or other virtual-filesystem URI fails as
    /// [`ErrorKind::InvalidFormat`](crate::job::ErrorKind::InvalidFormat).
    /// Hosts serving such files must mount them locally first.
    pub fn local_path(&self) -> Option<PathBuf> {
        if !self.uri.contains("://") {
            return Some(PathBuf::from(&self.uri));
        }
        let url = Url::parse(&self.uri).ok()?;
        if url.scheme() != "file" {
            return None;
        }
        url.to_file_path().ok()
    }
}
