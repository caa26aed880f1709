//! One thumbnail request, end to end.
//!
//! ```text
//! Start → ResolvingSource → DecodingImage → Saving → Done
//!               │                 │            │
//!               └─────────────────┴────────────┴──→ Failed
//! ```
//!
//! A job checks its cancellation flag once, before any work. From then on
//! it runs to completion and yields exactly one [`JobOutcome`]: `Ready` with
//! the saved image, or `Failed` with an [`ErrorKind`] and message. Nothing
//! is saved unless decoding succeeded.
//!
//! When a directory has lost its `.thumbnails` folder the job also asks the
//! cache writer to drop the thumbnail it stored earlier, so the generic
//! folder icon comes back.

use crate::archive::ArchiveError;
use crate::cache::{CacheError, CacheWriter};
use crate::directory::DirectoryError;
use crate::imaging::{BackendError, DecodedImage, ImageBackend, load_and_scale, scale_image};
use crate::producer::{Registry, ResolvedSource};
use crate::request::ThumbnailRequest;
use std::fmt;
use std::path::PathBuf;
use std::time::SystemTime;
use thiserror::Error;

/// Failure categories reported to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Not a directory, not a ZIP archive, unresolvable URI, unknown type.
    InvalidFormat,
    /// Nothing to make a thumbnail from.
    NoContent,
    /// The image decoder rejected the data.
    DecodeFailure,
    /// Reading the source failed.
    IoFailure,
    /// The cache writer could not store the result.
    SaveFailed,
}

impl ErrorKind {
    /// Stable numeric code carried by failure outcomes.
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::InvalidFormat => 1,
            ErrorKind::NoContent => 2,
            ErrorKind::DecodeFailure => 3,
            ErrorKind::IoFailure => 4,
            ErrorKind::SaveFailed => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::InvalidFormat => "invalid-format",
            ErrorKind::NoContent => "no-content",
            ErrorKind::DecodeFailure => "decode-failure",
            ErrorKind::IoFailure => "io-failure",
            ErrorKind::SaveFailed => "save-failed",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum ThumbnailError {
    #[error("Failed to get a local path for {0}")]
    Unresolvable(String),
    #[error("No thumbnailer for MIME type {0}")]
    UnsupportedMime(String),
    #[error(transparent)]
    Directory(#[from] DirectoryError),
    #[error(transparent)]
    Archive(#[from] ArchiveError),
    #[error("Failed to load image: {0}")]
    Image(#[from] BackendError),
    #[error("Failed to read modification time of {path}: {source}")]
    Metadata {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to save thumbnail: {0}")]
    Save(#[from] CacheError),
}

impl ThumbnailError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ThumbnailError::Unresolvable(_) | ThumbnailError::UnsupportedMime(_) => {
                ErrorKind::InvalidFormat
            }
            ThumbnailError::Directory(e) => match e {
                DirectoryError::NotADirectory(_) => ErrorKind::InvalidFormat,
                DirectoryError::NoCacheDirectory { .. } | DirectoryError::NoCandidate(_) => {
                    ErrorKind::NoContent
                }
                DirectoryError::Io { .. } => ErrorKind::IoFailure,
            },
            ThumbnailError::Archive(e) => match e {
                ArchiveError::Malformed(_) | ArchiveError::TooLarge { .. } => {
                    ErrorKind::InvalidFormat
                }
                ArchiveError::NoPreview { .. } => ErrorKind::NoContent,
                ArchiveError::Io(_) => ErrorKind::IoFailure,
            },
            ThumbnailError::Image(e) => match e {
                BackendError::Io(_) => ErrorKind::IoFailure,
                BackendError::TooLarge { .. } => ErrorKind::InvalidFormat,
                BackendError::Unsupported | BackendError::DecodeFailed(_) => {
                    ErrorKind::DecodeFailure
                }
            },
            ThumbnailError::Metadata { .. } => ErrorKind::IoFailure,
            ThumbnailError::Save(_) => ErrorKind::SaveFailed,
        }
    }

    /// Whether a previously stored thumbnail of the source is now stale.
    pub fn invalidates_cache(&self) -> bool {
        matches!(
            self,
            ThumbnailError::Directory(DirectoryError::NoCacheDirectory { .. })
        )
    }
}

/// The single result of a job.
#[derive(Debug)]
pub enum JobOutcome {
    Ready {
        uri: String,
        image: DecodedImage,
        mtime: SystemTime,
    },
    Failed {
        uri: String,
        kind: ErrorKind,
        message: String,
    },
}

impl JobOutcome {
    pub fn uri(&self) -> &str {
        match self {
            JobOutcome::Ready { uri, .. } | JobOutcome::Failed { uri, .. } => uri,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, JobOutcome::Ready { .. })
    }

    /// Numeric error code, for failures.
    pub fn code(&self) -> Option<i32> {
        match self {
            JobOutcome::Ready { .. } => None,
            JobOutcome::Failed { kind, .. } => Some(kind.code()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobState {
    Start,
    ResolvingSource,
    DecodingImage,
    Saving,
    Done,
    Failed,
}

struct Progress<'a> {
    uri: &'a str,
    state: JobState,
}

impl<'a> Progress<'a> {
    fn new(uri: &'a str) -> Self {
        Self {
            uri,
            state: JobState::Start,
        }
    }

    fn advance(&mut self, next: JobState) {
        tracing::trace!(uri = self.uri, from = ?self.state, to = ?next, "job state");
        self.state = next;
    }
}

/// Runs thumbnail requests against a producer registry, an image backend
/// and a cache writer.
pub struct ThumbnailJob<'a> {
    registry: &'a Registry,
    backend: &'a dyn ImageBackend,
    writer: &'a dyn CacheWriter,
    max_source_bytes: u64,
}

impl<'a> ThumbnailJob<'a> {
    pub fn new(
        registry: &'a Registry,
        backend: &'a dyn ImageBackend,
        writer: &'a dyn CacheWriter,
    ) -> Self {
        Self {
            registry,
            backend,
            writer,
            max_source_bytes: 24 * 1024 * 1024,
        }
    }

    /// Cap on the size of source image files read from disk.
    pub fn with_max_source_bytes(mut self, max_source_bytes: u64) -> Self {
        self.max_source_bytes = max_source_bytes;
        self
    }

    /// Run one request. Returns `None` only when the request was cancelled
    /// before it started.
    pub fn run(&self, request: &ThumbnailRequest) -> Option<JobOutcome> {
        if request.cancellable.is_cancelled() {
            tracing::debug!(uri = %request.uri, "job cancelled before start");
            return None;
        }

        let mut progress = Progress::new(&request.uri);
        let outcome = match self.produce(request, &mut progress) {
            Ok((image, mtime)) => {
                progress.advance(JobState::Done);
                JobOutcome::Ready {
                    uri: request.uri.clone(),
                    image,
                    mtime,
                }
            }
            Err(e) => {
                if e.invalidates_cache()
                    && let Err(delete_err) = self.writer.delete(&request.uri, &request.flavor)
                {
                    tracing::warn!(
                        uri = %request.uri,
                        error = %delete_err,
                        "failed to delete stale thumbnail"
                    );
                }
                progress.advance(JobState::Failed);
                let kind = e.kind();
                tracing::debug!(uri = %request.uri, %kind, error = %e, "job failed");
                JobOutcome::Failed {
                    uri: request.uri.clone(),
                    kind,
                    message: e.to_string(),
                }
            }
        };
        Some(outcome)
    }

    fn produce(
        &self,
        request: &ThumbnailRequest,
        progress: &mut Progress<'_>,
    ) -> Result<(DecodedImage, SystemTime), ThumbnailError> {
        progress.advance(JobState::ResolvingSource);
        let path = request
            .local_path()
            .ok_or_else(|| ThumbnailError::Unresolvable(request.uri.clone()))?;
        let producer = self
            .registry
            .lookup(&request.mime_type)
            .ok_or_else(|| ThumbnailError::UnsupportedMime(request.mime_type.clone()))?;
        let source = producer.resolve(&path, &request.flavor)?;
        let mtime = std::fs::metadata(&path)
            .and_then(|m| m.modified())
            .map_err(|source| ThumbnailError::Metadata {
                path: path.clone(),
                source,
            })?;

        progress.advance(JobState::DecodingImage);
        let bounds = request.flavor.bounds();
        let image = match source {
            ResolvedSource::File(file) => {
                load_and_scale(self.backend, &file, bounds, self.max_source_bytes)?
            }
            ResolvedSource::Bytes(bytes) => scale_image(self.backend, &bytes, bounds)?,
        };

        progress.advance(JobState::Saving);
        self.writer
            .save(&request.uri, &request.flavor, &image, mtime)?;
        Ok((image, mtime))
    }
}
