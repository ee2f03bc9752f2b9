//! Persistence capability contracts.
//!
//! The services own *what* is persisted; these traits own *where*. Any
//! conforming store is acceptable; the crate ships file-backed defaults
//! in [`crate::storage`], and tests use in-memory fakes.

use std::path::PathBuf;

use crate::error::Result;
use crate::model::{Playlist, Track};

/// Store for named playlists.
pub trait PlaylistRepository: Send + Sync {
    /// Insert or replace a playlist by id.
    fn save(&self, playlist: &Playlist) -> Result<()>;

    /// Load one playlist. Missing ids are `Error::PlaylistNotFound`.
    fn load(&self, id: &str) -> Result<Playlist>;

    /// Every stored playlist, in unspecified order.
    fn load_all(&self) -> Result<Vec<Playlist>>;

    fn delete(&self, id: &str) -> Result<()>;

    fn exists(&self, id: &str) -> Result<bool>;
}

/// Store for the play queue as it was when the app last ran.
pub trait HistoryRepository: Send + Sync {
    fn save_queue(&self, tracks: &[Track]) -> Result<()>;

    /// The persisted queue; empty when nothing was saved.
    fn load_queue(&self) -> Result<Vec<Track>>;

    fn save_current_index(&self, index: i32) -> Result<()>;

    /// The persisted cursor; −1 when nothing was saved.
    fn load_current_index(&self) -> Result<i32>;

    /// Forget everything.
    fn clear(&self) -> Result<()>;
}

/// Store for user preferences, as named scalars.
///
/// Contract defaults apply when a key was never written: volume 1.0, loop
/// off, theme `"system"`, no scan paths. (First-run behaviour above this
/// layer is governed by the preference service's own defaults.)
pub trait PreferencesRepository: Send + Sync {
    fn save_volume(&self, volume: f32) -> Result<()>;
    fn load_volume(&self) -> Result<f32>;

    fn save_loop_mode(&self, enabled: bool) -> Result<()>;
    fn load_loop_mode(&self) -> Result<bool>;

    fn save_theme(&self, theme: &str) -> Result<()>;
    fn load_theme(&self) -> Result<String>;

    fn save_scan_paths(&self, paths: &[PathBuf]) -> Result<()>;
    fn load_scan_paths(&self) -> Result<Vec<PathBuf>>;

    /// Forget everything.
    fn clear(&self) -> Result<()>;
}
