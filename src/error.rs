//! Application-wide error types.
//!
//! One flat enum covers every failure the core can surface: missing
//! entities, argument validation, state-machine violations, wrapped
//! backend and repository failures, and scan cancellation. Services wrap
//! low-level causes at their boundary ([`Error::backend`],
//! [`Error::repository`]) and return validation errors synchronously;
//! validation errors are never published as events.

use std::path::PathBuf;
use std::time::Duration;

use crate::model::Track;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Boxed cause carried by wrapper variants.
pub type Cause = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error for the player core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // --- not found -------------------------------------------------------
    /// No queue entry matches the given path.
    #[error("track not found in queue: {0}")]
    TrackNotFound(PathBuf),

    /// No stored playlist with the given id.
    #[error("playlist not found: {0}")]
    PlaylistNotFound(String),

    /// The file does not exist on disk.
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    // --- invalid argument ------------------------------------------------
    /// Volume outside `[0.0, 1.0]`.
    #[error("invalid volume {0}: must be between 0.0 and 1.0")]
    InvalidVolume(f32),

    /// Seek target beyond the end of the track.
    #[error("seek position {position:?} is past the track end ({duration:?})")]
    SeekOutOfRange {
        position: Duration,
        duration: Duration,
    },

    /// Queue index outside the current bounds.
    #[error("invalid queue index {index}: queue has {len} track(s)")]
    InvalidIndex { index: usize, len: usize },

    /// Theme tag other than "light" or "dark".
    #[error("invalid theme {0:?}: expected \"light\" or \"dark\"")]
    InvalidTheme(String),

    // --- invalid state ---------------------------------------------------
    /// An operation that needs a loaded track was called without one.
    #[error("no track loaded")]
    NoTrackLoaded,

    #[error("queue is empty")]
    QueueEmpty,

    #[error("already at the end of the queue")]
    EndOfQueue,

    #[error("already at the start of the queue")]
    StartOfQueue,

    /// The queue already holds an entry with this file path.
    #[error("track already in queue: {0}")]
    DuplicateTrack(PathBuf),

    #[error("a scan is already in progress")]
    ScanInProgress,

    #[error("no scan in progress")]
    NoScanInProgress,

    /// The event bus was closed (double close, publish races aside).
    #[error("event bus is closed")]
    BusClosed,

    // --- wrapped failures ------------------------------------------------
    /// An audio backend operation failed.
    #[error("audio backend {operation} failed (code {code}){}", path_suffix(path))]
    Backend {
        /// Backend operation name, e.g. "load" or "set_volume".
        operation: &'static str,
        /// File the operation was acting on, when relevant.
        path: Option<PathBuf>,
        /// Backend-specific numeric error code.
        code: i32,
        #[source]
        source: Option<Cause>,
    },

    /// A persistence operation failed.
    #[error("{store} repository {operation} failed: {message}")]
    Repository {
        /// Which repository kind: "history", "playlist", or "preferences".
        store: &'static str,
        operation: &'static str,
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// A service-level failure that is neither backend nor repository.
    #[error("{service}.{operation}: {message}")]
    Service {
        service: &'static str,
        operation: &'static str,
        message: String,
        #[source]
        source: Option<Cause>,
    },

    /// A scan was cancelled mid-walk. Carries whatever was found before
    /// the token tripped.
    #[error("scan cancelled: {reason}")]
    ScanCancelled {
        reason: String,
        tracks: Vec<Track>,
    },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(": {}", p.display()),
        None => String::new(),
    }
}

impl Error {
    /// Wrap an audio backend failure.
    pub fn backend(operation: &'static str, path: Option<PathBuf>, code: i32) -> Self {
        Self::Backend {
            operation,
            path,
            code,
            source: None,
        }
    }

    /// Wrap an audio backend failure with an underlying cause.
    pub fn backend_with(
        operation: &'static str,
        path: Option<PathBuf>,
        code: i32,
        source: impl Into<Cause>,
    ) -> Self {
        Self::Backend {
            operation,
            path,
            code,
            source: Some(source.into()),
        }
    }

    /// Wrap a repository failure.
    pub fn repository(
        store: &'static str,
        operation: &'static str,
        source: impl Into<Cause>,
    ) -> Self {
        let source = source.into();
        Self::Repository {
            store,
            operation,
            message: source.to_string(),
            source: Some(source),
        }
    }

    /// Wrap a service failure.
    pub fn service(
        service: &'static str,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::Service {
            service,
            operation,
            message: message.into(),
            source: None,
        }
    }

    /// A scan cancellation carrying partial results.
    pub fn scan_cancelled(reason: impl Into<String>, tracks: Vec<Track>) -> Self {
        Self::ScanCancelled {
            reason: reason.into(),
            tracks,
        }
    }

    /// True for validation errors, which are returned to the caller and
    /// never published on the bus.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidVolume(_)
                | Self::SeekOutOfRange { .. }
                | Self::InvalidIndex { .. }
                | Self::InvalidTheme(_)
        )
    }
}
