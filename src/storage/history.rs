//! Queue history persistence as a single JSON document.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::Track;
use crate::repository::HistoryRepository;

/// On-disk shape: the queue and its cursor, saved independently but
/// stored together.
#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct HistoryDoc {
    queue: Vec<Track>,
    current_index: i32,
}

impl Default for HistoryDoc {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            current_index: -1,
        }
    }
}

/// [`HistoryRepository`] backed by one JSON file.
pub struct JsonHistoryStore {
    path: PathBuf,
}

impl JsonHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the OS data directory (`.../tonearm/history.json`).
    pub fn at_default_location() -> Result<Self> {
        let dir = super::data_dir().ok_or(Error::Repository {
            store: "history",
            operation: "open",
            message: "could not determine a data directory".to_string(),
            source: None,
        })?;
        Ok(Self::new(dir.join("history.json")))
    }

    fn read_doc(&self) -> Result<HistoryDoc> {
        if !self.path.exists() {
            return Ok(HistoryDoc::default());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| Error::repository("history", "read", e))?;
        serde_json::from_str(&contents).map_err(|e| Error::repository("history", "parse", e))
    }

    fn write_doc(&self, doc: &HistoryDoc) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::repository("history", "write", e))?;
        }
        let contents = serde_json::to_string_pretty(doc)
            .map_err(|e| Error::repository("history", "serialize", e))?;
        fs::write(&self.path, contents).map_err(|e| Error::repository("history", "write", e))
    }
}

impl HistoryRepository for JsonHistoryStore {
    fn save_queue(&self, tracks: &[Track]) -> Result<()> {
        let mut doc = self.read_doc().unwrap_or_default();
        doc.queue = tracks.to_vec();
        self.write_doc(&doc)
    }

    fn load_queue(&self) -> Result<Vec<Track>> {
        Ok(self.read_doc()?.queue)
    }

    fn save_current_index(&self, index: i32) -> Result<()> {
        let mut doc = self.read_doc().unwrap_or_default();
        doc.current_index = index;
        self.write_doc(&doc)
    }

    fn load_current_index(&self) -> Result<i32> {
        Ok(self.read_doc()?.current_index)
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::repository("history", "clear", e)),
        }
    }
}
