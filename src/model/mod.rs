//! Core data models for the player.
//!
//! Defines the entities shared across services: [`Track`] (an immutable
//! audio file description), [`TrackHandle`] (the backend's opaque stream
//! id), playback status and state snapshots, scan progress, and the
//! persisted [`Preferences`] and [`Playlist`] shapes.
//!
//! Tracks are values: once constructed they are never mutated, and
//! "updating" one produces a new instance. They travel by clone through
//! events and by reference inside the queue.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Opaque identifier for a stream loaded by the audio backend.
///
/// Minted by `AudioEngine::load` and required by every subsequent engine
/// call on that stream. The zero value is the "no handle" sentinel. The
/// playback service owns the live handle exclusively; it only escapes
/// inside `TrackLoaded` events for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TrackHandle(u64);

impl TrackHandle {
    /// The "no stream loaded" sentinel.
    pub const NONE: TrackHandle = TrackHandle(0);

    /// Wrap a raw backend handle value.
    pub fn new(raw: u64) -> Self {
        TrackHandle(raw)
    }

    /// The raw backend value.
    pub fn raw(self) -> u64 {
        self.0
    }

    /// True when this is the sentinel (no stream loaded).
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl std::fmt::Display for TrackHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_none() {
            write!(f, "<none>")
        } else {
            write!(f, "#{}", self.0)
        }
    }
}

/// Extended tag data carried by tracks that have been fully probed.
///
/// Tracker modules populate these from module-specific fields (song name,
/// message, author, instrument names) rather than conventional tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtendedMetadata {
    pub composer: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub track_number: Option<u32>,
    pub disc_number: Option<u32>,
    /// Embedded cover image, as raw bytes.
    pub cover_art: Option<Vec<u8>>,
    /// Average bit rate in kbps.
    pub bit_rate: Option<u32>,
    /// Sample rate in Hz.
    pub sample_rate: Option<u32>,
    pub comment: Option<String>,
}

/// A single audio file known to the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Stable identifier: the canonical absolute-path string.
    pub id: String,
    /// Absolute path on disk. Unique within a queue.
    pub file_path: PathBuf,
    /// Display title (tag title, or file stem when untagged).
    pub title: String,
    pub artist: String,
    pub album: String,
    /// Total duration as reported by the backend probe.
    pub duration: Duration,
    /// Lowercased extension with leading dot, e.g. `".flac"`.
    pub extension: String,
    /// True for tracker-module formats (.mod/.xm/.it/...), which use
    /// module-specific metadata extraction.
    pub is_tracker: bool,
    /// Extended tag block, when a full probe ran.
    pub extended: Option<ExtendedMetadata>,
}

impl Track {
    /// Build a track from a path and basic tag data.
    ///
    /// The id and extension are derived from the path; the tracker flag
    /// defaults to false (set it via [`Track::with_tracker_flag`] when the
    /// extension is a module format).
    pub fn new(
        path: impl Into<PathBuf>,
        title: impl Into<String>,
        artist: impl Into<String>,
        album: impl Into<String>,
        duration: Duration,
    ) -> Self {
        let file_path = path.into();
        Self {
            id: file_path.to_string_lossy().into_owned(),
            extension: extension_of(&file_path),
            file_path,
            title: title.into(),
            artist: artist.into(),
            album: album.into(),
            duration,
            is_tracker: false,
            extended: None,
        }
    }

    /// Copy with the tracker-module flag set.
    pub fn with_tracker_flag(mut self, is_tracker: bool) -> Self {
        self.is_tracker = is_tracker;
        self
    }

    /// Copy with an extended metadata block attached.
    pub fn with_extended(mut self, extended: ExtendedMetadata) -> Self {
        self.extended = Some(extended);
        self
    }

    /// Display title, falling back to the file stem when the tag is empty.
    pub fn display_title(&self) -> String {
        if !self.title.is_empty() {
            return self.title.clone();
        }
        self.file_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown".to_string())
    }
}

/// Lowercased extension with leading dot, or empty when the path has none.
pub fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_default()
}

/// Current playback status as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackStatus {
    #[default]
    Stopped,
    Playing,
    Paused,
    /// The backend is buffering or otherwise wedged mid-stream.
    Stalled,
}

/// Snapshot of the playback service, derived on demand.
///
/// Never stored: every call to `PlaybackService::state` rebuilds it from
/// the service fields plus live engine queries.
#[derive(Debug, Clone, Default)]
pub struct PlaybackState {
    pub track: Option<Track>,
    /// Queue position of the current track; −1 when none.
    pub queue_index: i32,
    pub status: PlaybackStatus,
    pub position: Duration,
    pub duration: Duration,
    /// Volume in `[0.0, 1.0]`. While muted this holds the pre-mute value.
    pub volume: f32,
    pub muted: bool,
    pub looping: bool,
}

impl PlaybackState {
    /// Compact summary for log lines, e.g. `"Playing@1:23/4:56"`.
    pub fn debug_summary(&self) -> String {
        let status = match self.status {
            PlaybackStatus::Stopped => "Stopped",
            PlaybackStatus::Playing => "Playing",
            PlaybackStatus::Paused => "Paused",
            PlaybackStatus::Stalled => "Stalled",
        };
        format!(
            "{}@{}/{}",
            status,
            format_duration(self.position),
            format_duration(self.duration)
        )
    }
}

/// Format a duration as MM:SS or HH:MM:SS.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, mins, secs)
    } else {
        format!("{}:{:02}", mins, secs)
    }
}

/// Progress report emitted per admitted file during a library scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanProgress {
    /// File currently being inspected.
    pub current_file: PathBuf,
    /// Files looked at so far, supported or not.
    pub files_scanned: usize,
    /// Total files, when known up front (file-list scans). `None` while a
    /// recursive walk is still discovering.
    pub total_files: Option<usize>,
    /// Supported tracks admitted so far.
    pub tracks_found: usize,
}

impl ScanProgress {
    /// Completion percentage; only defined once the total is known.
    pub fn percent(&self) -> Option<f32> {
        let total = self.total_files?;
        if total == 0 {
            return Some(100.0);
        }
        Some(self.files_scanned as f32 / total as f32 * 100.0)
    }
}

/// User preferences cached by the preference service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    /// Playback volume in `[0.0, 1.0]`.
    pub volume: f32,
    pub loop_enabled: bool,
    /// Theme tag: `"light"` or `"dark"`.
    pub theme: String,
    /// Folders the user has scanned, most recent last.
    pub scan_paths: Vec<PathBuf>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            volume: 0.8,
            loop_enabled: false,
            theme: "dark".to_string(),
            scan_paths: Vec::new(),
        }
    }
}

impl Preferences {
    /// The folder the user opened most recently, if any.
    pub fn last_folder(&self) -> Option<&Path> {
        self.scan_paths.last().map(PathBuf::as_path)
    }
}

/// A named, persisted playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub tracks: Vec<Track>,
}
