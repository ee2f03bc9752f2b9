//! Preference persistence as a TOML file.
//!
//! Every key is optional on disk; reads of unset keys produce the
//! repository-contract defaults (volume 1.0, loop off, theme "system",
//! no scan paths). The preference service applies its own first-run
//! defaults above this layer.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::repository::PreferencesRepository;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct PreferencesDoc {
    // Unset keys stay out of the file entirely.
    #[serde(skip_serializing_if = "Option::is_none")]
    volume: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    loop_mode: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    theme: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan_paths: Option<Vec<PathBuf>>,
}

/// [`PreferencesRepository`] backed by `preferences.toml`.
pub struct TomlPreferenceStore {
    path: PathBuf,
}

impl TomlPreferenceStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under the OS config directory
    /// (`.../tonearm/preferences.toml`).
    pub fn at_default_location() -> Result<Self> {
        let dir = super::config_dir().ok_or(Error::Repository {
            store: "preferences",
            operation: "open",
            message: "could not determine a config directory".to_string(),
            source: None,
        })?;
        Ok(Self::new(dir.join("preferences.toml")))
    }

    fn read_doc(&self) -> Result<PreferencesDoc> {
        if !self.path.exists() {
            return Ok(PreferencesDoc::default());
        }
        let contents = fs::read_to_string(&self.path)
            .map_err(|e| Error::repository("preferences", "read", e))?;
        toml::from_str(&contents).map_err(|e| Error::repository("preferences", "parse", e))
    }

    fn write_doc(&self, doc: &PreferencesDoc) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| Error::repository("preferences", "write", e))?;
        }
        let contents =
            toml::to_string_pretty(doc).map_err(|e| Error::repository("preferences", "serialize", e))?;
        fs::write(&self.path, contents).map_err(|e| Error::repository("preferences", "write", e))
    }

    fn update(&self, mutate: impl FnOnce(&mut PreferencesDoc)) -> Result<()> {
        let mut doc = self.read_doc().unwrap_or_default();
        mutate(&mut doc);
        self.write_doc(&doc)
    }
}

impl PreferencesRepository for TomlPreferenceStore {
    fn save_volume(&self, volume: f32) -> Result<()> {
        self.update(|doc| doc.volume = Some(volume))
    }

    fn load_volume(&self) -> Result<f32> {
        Ok(self.read_doc()?.volume.unwrap_or(1.0))
    }

    fn save_loop_mode(&self, enabled: bool) -> Result<()> {
        self.update(|doc| doc.loop_mode = Some(enabled))
    }

    fn load_loop_mode(&self) -> Result<bool> {
        Ok(self.read_doc()?.loop_mode.unwrap_or(false))
    }

    fn save_theme(&self, theme: &str) -> Result<()> {
        self.update(|doc| doc.theme = Some(theme.to_string()))
    }

    fn load_theme(&self) -> Result<String> {
        Ok(self
            .read_doc()?
            .theme
            .unwrap_or_else(|| "system".to_string()))
    }

    fn save_scan_paths(&self, paths: &[PathBuf]) -> Result<()> {
        self.update(|doc| doc.scan_paths = Some(paths.to_vec()))
    }

    fn load_scan_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.read_doc()?.scan_paths.unwrap_or_default())
    }

    fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::repository("preferences", "clear", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_defaults_on_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlPreferenceStore::new(dir.path().join("preferences.toml"));

        assert_eq!(store.load_volume().unwrap(), 1.0);
        assert!(!store.load_loop_mode().unwrap());
        assert_eq!(store.load_theme().unwrap(), "system");
        assert!(store.load_scan_paths().unwrap().is_empty());
    }

    #[test]
    fn test_keys_persist_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlPreferenceStore::new(dir.path().join("preferences.toml"));

        store.save_volume(0.4).unwrap();
        store.save_theme("light").unwrap();

        assert_eq!(store.load_volume().unwrap(), 0.4);
        assert_eq!(store.load_theme().unwrap(), "light");
        // Untouched keys keep their defaults.
        assert!(!store.load_loop_mode().unwrap());
    }

    #[test]
    fn test_scan_paths_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlPreferenceStore::new(dir.path().join("preferences.toml"));

        let paths = vec![PathBuf::from("/music"), PathBuf::from("/downloads")];
        store.save_scan_paths(&paths).unwrap();
        assert_eq!(store.load_scan_paths().unwrap(), paths);
    }

    #[test]
    fn test_clear_resets_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = TomlPreferenceStore::new(dir.path().join("preferences.toml"));

        store.save_volume(0.1).unwrap();
        store.clear().unwrap();
        assert_eq!(store.load_volume().unwrap(), 1.0);
        store.clear().unwrap();
    }
}
