//! Named playlist persistence as a directory of JSON documents.

use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::Playlist;
use crate::repository::PlaylistRepository;

/// [`PlaylistRepository`] storing one `<id>.json` file per playlist.
pub struct JsonPlaylistStore {
    dir: PathBuf,
}

impl JsonPlaylistStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the OS data directory (`.../tonearm/playlists/`).
    pub fn at_default_location() -> Result<Self> {
        let dir = super::data_dir().ok_or(Error::Repository {
            store: "playlist",
            operation: "open",
            message: "could not determine a data directory".to_string(),
            source: None,
        })?;
        Ok(Self::new(dir.join("playlists")))
    }

    fn file_for(&self, id: &str) -> Result<PathBuf> {
        if id.is_empty() || id.contains(['/', '\\']) {
            return Err(Error::Repository {
                store: "playlist",
                operation: "resolve",
                message: format!("invalid playlist id {id:?}"),
                source: None,
            });
        }
        Ok(self.dir.join(format!("{id}.json")))
    }
}

impl PlaylistRepository for JsonPlaylistStore {
    fn save(&self, playlist: &Playlist) -> Result<()> {
        let path = self.file_for(&playlist.id)?;
        fs::create_dir_all(&self.dir).map_err(|e| Error::repository("playlist", "write", e))?;
        let contents = serde_json::to_string_pretty(playlist)
            .map_err(|e| Error::repository("playlist", "serialize", e))?;
        fs::write(path, contents).map_err(|e| Error::repository("playlist", "write", e))
    }

    fn load(&self, id: &str) -> Result<Playlist> {
        let path = self.file_for(id)?;
        if !path.exists() {
            return Err(Error::PlaylistNotFound(id.to_string()));
        }
        let contents =
            fs::read_to_string(path).map_err(|e| Error::repository("playlist", "read", e))?;
        serde_json::from_str(&contents).map_err(|e| Error::repository("playlist", "parse", e))
    }

    fn load_all(&self) -> Result<Vec<Playlist>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::repository("playlist", "read", e)),
        };

        let mut playlists = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Error::repository("playlist", "read", e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            // One unreadable file must not hide the rest.
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str(&c).map_err(|e| e.to_string()))
            {
                Ok(playlist) => playlists.push(playlist),
                Err(e) => {
                    tracing::warn!("skipping unreadable playlist {}: {}", path.display(), e);
                }
            }
        }
        Ok(playlists)
    }

    fn delete(&self, id: &str) -> Result<()> {
        let path = self.file_for(id)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::repository("playlist", "delete", e)),
        }
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.file_for(id)?.exists())
    }
}
