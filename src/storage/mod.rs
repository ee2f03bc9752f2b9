//! File-backed repository implementations.
//!
//! Default adapters for the persistence ports: the queue and named
//! playlists as JSON documents, preferences as a TOML file. State lives
//! in OS-standard directories:
//! - queue + playlists: `<data_dir>/tonearm/`
//! - preferences: `<config_dir>/tonearm/preferences.toml`
//!
//! Writes create parent directories and rewrite whole files; loads of
//! absent files produce the contract defaults. Tests (and embedders that
//! want state elsewhere) use the explicit-path constructors.

mod history;
mod playlists;
mod preferences;

pub use history::JsonHistoryStore;
pub use playlists::JsonPlaylistStore;
pub use preferences::TomlPreferenceStore;

use std::path::PathBuf;

/// Default directory for queue and playlist state.
pub fn data_dir() -> Option<PathBuf> {
    dirs::data_dir().map(|d| d.join("tonearm"))
}

/// Default directory for the preferences file.
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("tonearm"))
}
