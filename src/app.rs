//! Application assembly.
//!
//! Builds the event bus and the services in dependency order, applies
//! persisted preferences, restores the last queue, and tears everything
//! down in reverse on shutdown. The bus created here is the only
//! process-wide shared object.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bus::EventBus;
use crate::engine::AudioEngine;
use crate::error::Result;
use crate::library::LibraryService;
use crate::playback::PlaybackService;
use crate::playlist::PlaylistService;
use crate::prefs::PreferenceService;
use crate::presenter::{Presenter, View};
use crate::repository::{HistoryRepository, PlaylistRepository, PreferencesRepository};

/// The composed player core: every service wired to one bus.
pub struct App {
    bus: Arc<EventBus>,
    engine: Arc<dyn AudioEngine>,
    playback: Arc<PlaybackService>,
    playlist: Arc<PlaylistService>,
    library: Arc<LibraryService>,
    prefs: Arc<PreferenceService>,
    presenter: Arc<Presenter>,
    shut_down: AtomicBool,
}

impl App {
    /// Initialise the engine and wire the services.
    ///
    /// Persisted preferences are applied once the presenter is
    /// listening, so the view renders the restored volume and loop
    /// state; a missing persisted queue is not an error.
    pub fn new(
        engine: Arc<dyn AudioEngine>,
        history: Arc<dyn HistoryRepository>,
        playlists: Arc<dyn PlaylistRepository>,
        preferences: Arc<dyn PreferencesRepository>,
        view: Arc<dyn View>,
    ) -> Result<Arc<Self>> {
        engine.initialize(-1, 44_100, 0)?;

        let bus = EventBus::new();
        let prefs = PreferenceService::new(preferences);
        let playback = PlaybackService::new(Arc::clone(&engine), Arc::clone(&bus));
        let playlist = PlaylistService::new(
            Arc::clone(&playback),
            history,
            playlists,
            Arc::clone(&bus),
        );
        let library = LibraryService::new(Arc::clone(&engine), Arc::clone(&bus));
        let presenter = Presenter::new(
            Arc::clone(&playback),
            Arc::clone(&playlist),
            Arc::clone(&library),
            Arc::clone(&prefs),
            view,
            Arc::clone(&bus),
        );

        playback.set_volume(prefs.volume())?;
        playback.set_looping(prefs.loop_enabled())?;
        if let Err(e) = playlist.restore_queue() {
            tracing::warn!("failed to restore the previous queue: {e}");
        }

        tracing::info!("player core assembled");
        Ok(Arc::new(Self {
            bus,
            engine,
            playback,
            playlist,
            library,
            prefs,
            presenter,
            shut_down: AtomicBool::new(false),
        }))
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn playback(&self) -> &Arc<PlaybackService> {
        &self.playback
    }

    pub fn playlist(&self) -> &Arc<PlaylistService> {
        &self.playlist
    }

    pub fn library(&self) -> &Arc<LibraryService> {
        &self.library
    }

    pub fn prefs(&self) -> &Arc<PreferenceService> {
        &self.prefs
    }

    pub fn presenter(&self) -> &Arc<Presenter> {
        &self.presenter
    }

    /// Tear down in reverse dependency order. Idempotent.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("shutting down player core");
        self.presenter.shutdown();
        self.library.shutdown();
        self.playlist.shutdown();
        self.playback.shutdown();
        if self.bus.close().is_err() {
            tracing::debug!("bus was already closed");
        }
        if let Err(e) = self.engine.shutdown() {
            tracing::warn!("engine shutdown failed: {e}");
        }
    }
}
