//! Preference service: a read-through cache over the preferences store.
//!
//! Reads are cache hits; writes validate, persist, then update the
//! cache. On first run (nothing persisted yet) the service's own
//! defaults govern (volume 0.8, loop off, dark theme) and are written
//! through so every later run finds a fully populated store.

use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::model::Preferences;
use crate::repository::PreferencesRepository;

/// Cached user preferences with write-through persistence.
pub struct PreferenceService {
    repo: Arc<dyn PreferencesRepository>,
    cache: RwLock<Preferences>,
}

impl PreferenceService {
    /// Build the cache from the store. Store errors are logged, never
    /// fatal: the service falls back to its defaults.
    pub fn new(repo: Arc<dyn PreferencesRepository>) -> Arc<Self> {
        let cache = Self::load_initial(repo.as_ref());
        Arc::new(Self {
            repo,
            cache: RwLock::new(cache),
        })
    }

    fn load_initial(repo: &dyn PreferencesRepository) -> Preferences {
        // The store-level theme default is "system", which this service
        // never writes: seeing it means nothing was persisted yet, so
        // first-run defaults apply and are written through.
        let theme = repo.load_theme().unwrap_or_else(|e| {
            tracing::warn!("failed to load theme, using defaults: {e}");
            "system".to_string()
        });
        if theme == "system" {
            let defaults = Preferences::default();
            if let Err(e) = Self::persist_all(repo, &defaults) {
                tracing::warn!("failed to persist first-run preferences: {e}");
            }
            return defaults;
        }

        let fallback = Preferences::default();
        Preferences {
            volume: repo
                .load_volume()
                .unwrap_or(fallback.volume)
                .clamp(0.0, 1.0),
            loop_enabled: repo.load_loop_mode().unwrap_or(fallback.loop_enabled),
            theme,
            scan_paths: repo.load_scan_paths().unwrap_or_default(),
        }
    }

    fn persist_all(repo: &dyn PreferencesRepository, prefs: &Preferences) -> Result<()> {
        repo.save_volume(prefs.volume)?;
        repo.save_loop_mode(prefs.loop_enabled)?;
        repo.save_theme(&prefs.theme)?;
        repo.save_scan_paths(&prefs.scan_paths)?;
        Ok(())
    }

    pub fn volume(&self) -> f32 {
        self.cache.read().volume
    }

    pub fn loop_enabled(&self) -> bool {
        self.cache.read().loop_enabled
    }

    pub fn theme(&self) -> String {
        self.cache.read().theme.clone()
    }

    pub fn last_folder(&self) -> Option<PathBuf> {
        self.cache.read().last_folder().map(Path::to_path_buf)
    }

    pub fn scan_paths(&self) -> Vec<PathBuf> {
        self.cache.read().scan_paths.clone()
    }

    /// Snapshot of everything cached.
    pub fn preferences(&self) -> Preferences {
        self.cache.read().clone()
    }

    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(Error::InvalidVolume(volume));
        }
        self.repo.save_volume(volume)?;
        self.cache.write().volume = volume;
        Ok(())
    }

    pub fn set_loop_enabled(&self, enabled: bool) -> Result<()> {
        self.repo.save_loop_mode(enabled)?;
        self.cache.write().loop_enabled = enabled;
        Ok(())
    }

    pub fn set_theme(&self, theme: &str) -> Result<()> {
        if theme != "light" && theme != "dark" {
            return Err(Error::InvalidTheme(theme.to_string()));
        }
        self.repo.save_theme(theme)?;
        self.cache.write().theme = theme.to_string();
        Ok(())
    }

    /// Remember the folder the user just opened. Re-opening a known
    /// folder moves it to the end (most recent last).
    pub fn set_last_folder(&self, folder: &Path) -> Result<()> {
        let paths = {
            let cache = self.cache.read();
            let mut paths: Vec<PathBuf> = cache
                .scan_paths
                .iter()
                .filter(|p| p.as_path() != folder)
                .cloned()
                .collect();
            paths.push(folder.to_path_buf());
            paths
        };
        self.repo.save_scan_paths(&paths)?;
        self.cache.write().scan_paths = paths;
        Ok(())
    }

    /// Rewrite every key back to the defaults.
    pub fn reset(&self) -> Result<()> {
        let defaults = Preferences::default();
        Self::persist_all(self.repo.as_ref(), &defaults)?;
        *self.cache.write() = defaults;
        Ok(())
    }
}
