//! Presenter: bridges bus events to view updates and view gestures to
//! service calls.
//!
//! The widget toolkit behind the [`View`] trait stays dumb: it renders
//! what it is told and forwards gestures. Every gesture handler here maps
//! to service calls, and every bus event maps to view calls. Errors
//! surfaced by gestures become transient notifications; the application
//! never crashes on a backend or repository failure.
//!
//! Besides the event-driven updates, a view-refresh ticker polls the
//! playback state at [`REFRESH_INTERVAL`] to drive the progress slider
//! and time labels. It is distinct from the 3 Hz progress ticker inside
//! playback: the view may redraw more smoothly than the domain publishes.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::bus::{EventBus, SubscriptionId};
use crate::error::{Error, Result};
use crate::events::{Event, EventPayload};
use crate::library::LibraryService;
use crate::model::PlaybackStatus;
use crate::playback::PlaybackService;
use crate::playlist::PlaylistService;
use crate::prefs::PreferenceService;

/// Cadence of the view-refresh ticker (4 Hz).
pub const REFRESH_INTERVAL: Duration = Duration::from_millis(250);

/// The capability set the presenter requires from the widget layer.
pub trait View: Send + Sync {
    fn set_play_state(&self, playing: bool);
    fn set_mute_state(&self, muted: bool);
    fn set_loop_state(&self, looping: bool);
    fn set_volume(&self, volume: f32);
    fn set_track_info(&self, title: &str, artist: &str, album: &str);
    fn set_album_art(&self, image: &[u8]);
    fn clear_album_art(&self);
    fn set_current_time(&self, time: Duration);
    fn set_total_time(&self, time: Duration);
    fn set_progress(&self, position: Duration, duration: Duration);
    /// Highlight the queue row at `index` (−1 clears the highlight).
    fn update_playlist_selection(&self, index: i32);
    fn show_playlist_window(&self);
    fn close_playlist_window(&self);
    fn is_playlist_window_open(&self) -> bool;
    /// Transient toast with a short title and detail text.
    fn show_notification(&self, title: &str, message: &str);
}

struct Ticker {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Translates between the domain services and the widget layer.
pub struct Presenter {
    playback: Arc<PlaybackService>,
    playlist: Arc<PlaylistService>,
    library: Arc<LibraryService>,
    prefs: Arc<PreferenceService>,
    view: Arc<dyn View>,
    bus: Arc<EventBus>,
    subscription: Mutex<Option<SubscriptionId>>,
    ticker: Mutex<Option<Ticker>>,
    scan_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Presenter {
    /// Wire the presenter: subscribe to every event and start the
    /// view-refresh ticker.
    pub fn new(
        playback: Arc<PlaybackService>,
        playlist: Arc<PlaylistService>,
        library: Arc<LibraryService>,
        prefs: Arc<PreferenceService>,
        view: Arc<dyn View>,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        Self::with_refresh_interval(playback, playlist, library, prefs, view, bus, REFRESH_INTERVAL)
    }

    /// Like [`Presenter::new`] with a custom refresh cadence.
    pub fn with_refresh_interval(
        playback: Arc<PlaybackService>,
        playlist: Arc<PlaylistService>,
        library: Arc<LibraryService>,
        prefs: Arc<PreferenceService>,
        view: Arc<dyn View>,
        bus: Arc<EventBus>,
        interval: Duration,
    ) -> Arc<Self> {
        let presenter = Arc::new(Self {
            playback,
            playlist,
            library,
            prefs,
            view,
            bus: Arc::clone(&bus),
            subscription: Mutex::new(None),
            ticker: Mutex::new(None),
            scan_worker: Mutex::new(None),
        });

        let weak: Weak<Presenter> = Arc::downgrade(&presenter);
        let sub = bus.subscribe_all(move |event| {
            if let Some(presenter) = weak.upgrade() {
                presenter.on_event(event);
            }
        });
        *presenter.subscription.lock() = Some(sub);

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let weak: Weak<Presenter> = Arc::downgrade(&presenter);
        let thread = std::thread::Builder::new()
            .name("view-refresh".to_string())
            .spawn(move || {
                let tick = crossbeam_channel::tick(interval);
                loop {
                    crossbeam_channel::select! {
                        recv(tick) -> _ => {
                            let Some(presenter) = weak.upgrade() else { break };
                            presenter.refresh_view();
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .expect("failed to spawn view refresh ticker");
        *presenter.ticker.lock() = Some(Ticker {
            stop: stop_tx,
            thread,
        });
        presenter
    }

    // --- bus events → view ------------------------------------------------

    fn on_event(&self, event: &Event) {
        match &event.payload {
            EventPayload::TrackLoaded {
                track, duration, ..
            } => {
                self.view
                    .set_track_info(&track.display_title(), &track.artist, &track.album);
                match track.extended.as_ref().and_then(|ext| ext.cover_art.as_deref()) {
                    Some(image) => self.view.set_album_art(image),
                    None => self.view.clear_album_art(),
                }
                self.view.set_total_time(*duration);
            }
            EventPayload::TrackStarted { .. } => self.view.set_play_state(true),
            EventPayload::TrackPaused { position, .. } => {
                self.view.set_play_state(false);
                self.view.set_current_time(*position);
            }
            EventPayload::TrackStopped { .. } => {
                self.view.set_play_state(false);
                self.view.set_current_time(Duration::ZERO);
                self.view.set_progress(Duration::ZERO, Duration::ZERO);
            }
            EventPayload::TrackCompleted { .. } => self.view.set_play_state(false),
            EventPayload::TrackProgress { position, duration } => {
                self.view.set_progress(*position, *duration);
                self.view.set_current_time(*position);
                self.view.set_total_time(*duration);
            }
            EventPayload::TrackError { track, cause } => {
                self.view.show_notification(
                    "Playback error",
                    &format!("{}: {cause}", track.display_title()),
                );
            }
            // Internal to the playback/playlist pair.
            EventPayload::AutoNext { .. } => {}
            EventPayload::VolumeChanged { volume } => self.view.set_volume(*volume),
            EventPayload::MuteToggled { muted } => self.view.set_mute_state(*muted),
            EventPayload::LoopToggled { enabled } => self.view.set_loop_state(*enabled),
            EventPayload::PlaylistUpdated { index, .. } => {
                self.view.update_playlist_selection(*index);
            }
            EventPayload::QueueChanged { .. } => self.view.update_playlist_selection(-1),
            // Rows are rebuilt from the PlaylistUpdated snapshot.
            EventPayload::TrackAdded { .. } => {}
            EventPayload::ScanStarted { root } => {
                self.view
                    .show_notification("Library scan", &format!("Scanning {}", root.display()));
            }
            EventPayload::ScanProgress { .. } => {}
            EventPayload::ScanCompleted { tracks } => {
                let count = tracks.len();
                if let Err(e) = self.playlist.add_tracks(tracks, false) {
                    self.view.show_notification("Library scan", &e.to_string());
                    return;
                }
                self.view
                    .show_notification("Library scan", &format!("Added {count} track(s)"));
            }
            EventPayload::ScanCancelled { reason } => {
                self.view.show_notification("Scan cancelled", reason);
            }
        }
    }

    /// One view-refresh iteration: poll the playback state and redraw
    /// the progress slider and time labels. Exposed for tests.
    pub fn refresh_view(&self) {
        let state = self.playback.state();
        self.view.set_progress(state.position, state.duration);
        self.view.set_current_time(state.position);
        self.view.set_total_time(state.duration);
    }

    // --- view gestures → services -----------------------------------------

    /// Toggle between play and pause, reading the current status.
    pub fn on_play_pause(&self) {
        let state = self.playback.state();
        let result = match state.status {
            PlaybackStatus::Playing => self.playback.pause(),
            PlaybackStatus::Paused => self.playback.play(),
            PlaybackStatus::Stopped | PlaybackStatus::Stalled => {
                if state.track.is_some() {
                    self.playback.play()
                } else if !self.playlist.is_empty() {
                    let index = self.playlist.current_index().max(0) as usize;
                    self.playlist.play_track_at(index)
                } else {
                    Ok(())
                }
            }
        };
        self.report("Playback", result);
    }

    pub fn on_stop(&self) {
        self.report("Playback", self.playback.stop());
    }

    pub fn on_next(&self) {
        self.report("Playback", self.playlist.play_next());
    }

    pub fn on_previous(&self) {
        self.report("Playback", self.playlist.play_previous());
    }

    /// Volume slider moved. The new value is persisted as a preference.
    pub fn on_volume_changed(&self, volume: f32) {
        let result = self
            .playback
            .set_volume(volume)
            .and_then(|()| self.prefs.set_volume(volume));
        self.report("Volume", result);
    }

    pub fn on_mute_toggled(&self) {
        let muted = self.playback.state().muted;
        self.report("Volume", self.playback.set_muted(!muted));
    }

    /// Loop button toggled. The new mode is persisted as a preference.
    pub fn on_loop_toggled(&self) {
        let looping = !self.playback.state().looping;
        let result = self
            .playback
            .set_looping(looping)
            .and_then(|()| self.prefs.set_loop_enabled(looping));
        self.report("Loop", result);
    }

    pub fn on_seek(&self, position: Duration) {
        self.report("Seek", self.playback.seek(position));
    }

    /// A file picked in the open dialog: enqueue it and play. Picking a
    /// file that is already queued jumps to it instead.
    pub fn on_open_file(&self, path: &Path) {
        let result = self
            .library
            .extract_metadata(path)
            .and_then(|track| match self.playlist.add_track(&track, true) {
                Err(Error::DuplicateTrack(_)) => self.playlist.play_track_by_path(path),
                other => other,
            });
        self.report("Open file", result);
    }

    /// A folder picked in the open dialog: remember it and scan it on a
    /// worker thread. The `ScanCompleted` handler enqueues the results.
    pub fn on_open_folder(&self, path: &Path) {
        if self.library.is_scanning() {
            self.view
                .show_notification("Library scan", "A scan is already in progress");
            return;
        }
        if let Err(e) = self.prefs.set_last_folder(path) {
            tracing::warn!("failed to remember folder {}: {e}", path.display());
        }

        let library = Arc::clone(&self.library);
        let root = path.to_path_buf();
        let worker = std::thread::Builder::new()
            .name("library-scan".to_string())
            .spawn(move || match library.scan_folder(&root) {
                Ok(_) | Err(Error::ScanCancelled { .. }) => {}
                Err(e) => tracing::warn!("scan of {} failed: {e}", root.display()),
            })
            .expect("failed to spawn scan worker");

        let previous = self.scan_worker.lock().replace(worker);
        if let Some(previous) = previous {
            // The previous scan already finished (the flag was down).
            let _ = previous.join();
        }
    }

    pub fn on_cancel_scan(&self) {
        self.report("Library scan", self.library.cancel_scan());
    }

    /// A queue row double-clicked.
    pub fn on_track_selected(&self, index: usize) {
        self.report("Playback", self.playlist.play_track_at(index));
    }

    pub fn on_toggle_playlist_window(&self) {
        if self.view.is_playlist_window_open() {
            self.view.close_playlist_window();
        } else {
            self.view.show_playlist_window();
        }
    }

    /// Stop the refresh ticker, join any scan worker, and unsubscribe.
    /// Idempotent; the ticker channel is closed exactly once.
    pub fn shutdown(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            drop(ticker.stop);
            if ticker.thread.join().is_err() {
                tracing::error!("view refresh ticker panicked");
            }
        }
        // Join the scan worker before unsubscribing so a scan that just
        // finished still delivers its terminal event.
        let worker = self.scan_worker.lock().take();
        if let Some(worker) = worker {
            self.library.shutdown();
            if worker.join().is_err() {
                tracing::error!("scan worker panicked");
            }
        }
        if let Some(sub) = self.subscription.lock().take() {
            self.bus.unsubscribe(sub);
        }
    }

    /// Surface a gesture failure as a transient notification.
    fn report(&self, title: &str, result: Result<()>) {
        if let Err(e) = result {
            tracing::debug!(target: "presenter::gestures", "{title}: {e}");
            self.view.show_notification(title, &e.to_string());
        }
    }
}

impl Drop for Presenter {
    fn drop(&mut self) {
        if let Some(ticker) = self.ticker.lock().take() {
            drop(ticker.stop);
        }
    }
}
