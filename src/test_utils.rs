//! Test utilities and fixtures shared across module tests.
//!
//! Provides in-memory implementations of every port the core consumes:
//! the audio engine, the three repositories, and the view, plus an
//! [`EventRecorder`] that captures bus traffic for assertions.
//!
//! The fakes are scriptable where tests need failure paths:
//!
//! ```ignore
//! let engine = FakeEngine::new();
//! engine.fail_load(Path::new("/m/broken.mp3"));
//! engine.set_duration(Path::new("/m/long.flac"), Duration::from_secs(3600));
//! ```

use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::bus::{EventBus, SubscriptionId};
use crate::engine::AudioEngine;
use crate::error::{Error, Result};
use crate::events::{EventKind, EventPayload};
use crate::library::formats;
use crate::model::{
    extension_of, Playlist, PlaybackStatus, Preferences, Track, TrackHandle,
};
use crate::presenter::View;
use crate::repository::{HistoryRepository, PlaylistRepository, PreferencesRepository};

/// A mock track with sensible defaults: 180 s, tagged, title from the
/// file stem.
pub fn test_track(path: &str) -> Track {
    let path = PathBuf::from(path);
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tracker = formats::is_tracker_extension(&extension_of(&path));
    Track::new(path, title, "Test Artist", "Test Album", Duration::from_secs(180))
        .with_tracker_flag(tracker)
}

// ============================================================================
// Fake audio engine
// ============================================================================

struct Stream {
    path: PathBuf,
    status: PlaybackStatus,
    position: Duration,
    duration: Duration,
    volume: f32,
}

type MetadataHook = Arc<dyn Fn(&Path) + Send + Sync>;

#[derive(Default)]
struct EngineState {
    initialized: bool,
    next_handle: u64,
    streams: HashMap<TrackHandle, Stream>,
    durations: HashMap<PathBuf, Duration>,
    fail_load: HashSet<PathBuf>,
    fail_metadata: HashSet<PathBuf>,
    fail_stop: bool,
    metadata_hook: Option<MetadataHook>,
}

/// In-memory [`AudioEngine`]: mints real-looking handles, tracks stream
/// status, and fails on request. Backend codes mimic a native library
/// (2 = file open failure, 5 = invalid handle, 37 = data not available).
#[derive(Default)]
pub struct FakeEngine {
    state: Mutex<EngineState>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Script the probed duration for a path (default 180 s).
    pub fn set_duration(&self, path: &Path, duration: Duration) {
        self.state.lock().durations.insert(path.to_path_buf(), duration);
    }

    /// Make `load` fail for this path.
    pub fn fail_load(&self, path: &Path) {
        self.state.lock().fail_load.insert(path.to_path_buf());
    }

    /// Make `metadata` fail for this path.
    pub fn fail_metadata(&self, path: &Path) {
        self.state.lock().fail_metadata.insert(path.to_path_buf());
    }

    /// Make every `stop` fail until reset.
    pub fn fail_stop(&self, fail: bool) {
        self.state.lock().fail_stop = fail;
    }

    /// Run a hook on every `metadata` call (e.g. to cancel a scan
    /// mid-walk from inside the pipeline).
    pub fn on_metadata(&self, hook: impl Fn(&Path) + Send + Sync + 'static) {
        self.state.lock().metadata_hook = Some(Arc::new(hook));
    }

    /// Number of live (loaded, not yet stopped/unloaded) streams.
    pub fn live_streams(&self) -> usize {
        self.state.lock().streams.len()
    }

    fn only_handle(&self) -> TrackHandle {
        let state = self.state.lock();
        assert_eq!(state.streams.len(), 1, "expected exactly one live stream");
        *state.streams.keys().next().unwrap()
    }

    /// Simulate the single live stream reaching its natural end: the
    /// backend reports stopped with the position at the duration.
    pub fn finish_only_stream(&self) {
        let handle = self.only_handle();
        let mut state = self.state.lock();
        let stream = state.streams.get_mut(&handle).unwrap();
        stream.status = PlaybackStatus::Stopped;
        stream.position = stream.duration;
    }

    pub fn set_position_of_only_stream(&self, position: Duration) {
        let handle = self.only_handle();
        self.state.lock().streams.get_mut(&handle).unwrap().position = position;
    }

    pub fn volume_of_only_stream(&self) -> f32 {
        let handle = self.only_handle();
        self.state.lock().streams[&handle].volume
    }

    fn duration_for(state: &EngineState, path: &Path) -> Duration {
        state
            .durations
            .get(path)
            .copied()
            .unwrap_or(Duration::from_secs(180))
    }

    fn with_stream<T>(
        &self,
        operation: &'static str,
        handle: TrackHandle,
        f: impl FnOnce(&mut Stream) -> T,
    ) -> Result<T> {
        let mut state = self.state.lock();
        match state.streams.get_mut(&handle) {
            Some(stream) => Ok(f(stream)),
            None => Err(Error::backend(operation, None, 5)),
        }
    }
}

impl AudioEngine for FakeEngine {
    fn initialize(&self, _device: i32, _frequency: u32, _flags: u32) -> Result<()> {
        self.state.lock().initialized = true;
        Ok(())
    }

    fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock();
        state.initialized = false;
        state.streams.clear();
        Ok(())
    }

    fn load(&self, path: &Path) -> Result<TrackHandle> {
        let mut state = self.state.lock();
        if state.fail_load.contains(path) {
            return Err(Error::backend("load", Some(path.to_path_buf()), 2));
        }
        state.next_handle += 1;
        let handle = TrackHandle::new(state.next_handle);
        let duration = Self::duration_for(&state, path);
        state.streams.insert(
            handle,
            Stream {
                path: path.to_path_buf(),
                status: PlaybackStatus::Stopped,
                position: Duration::ZERO,
                duration,
                volume: 1.0,
            },
        );
        Ok(handle)
    }

    fn unload(&self, handle: TrackHandle) -> Result<()> {
        let mut state = self.state.lock();
        state
            .streams
            .remove(&handle)
            .map(|_| ())
            .ok_or(Error::backend("unload", None, 5))
    }

    fn play(&self, handle: TrackHandle) -> Result<()> {
        self.with_stream("play", handle, |s| s.status = PlaybackStatus::Playing)
    }

    fn pause(&self, handle: TrackHandle) -> Result<()> {
        self.with_stream("pause", handle, |s| s.status = PlaybackStatus::Paused)
    }

    fn stop(&self, handle: TrackHandle) -> Result<()> {
        let mut state = self.state.lock();
        if state.fail_stop {
            return Err(Error::backend("stop", None, 5));
        }
        state
            .streams
            .remove(&handle)
            .map(|_| ())
            .ok_or(Error::backend("stop", None, 5))
    }

    fn status(&self, handle: TrackHandle) -> Result<PlaybackStatus> {
        self.with_stream("status", handle, |s| s.status)
    }

    fn position(&self, handle: TrackHandle) -> Result<Duration> {
        self.with_stream("position", handle, |s| s.position)
    }

    fn duration(&self, handle: TrackHandle) -> Result<Duration> {
        self.with_stream("duration", handle, |s| s.duration)
    }

    fn seek(&self, handle: TrackHandle, position: Duration) -> Result<()> {
        self.with_stream("seek", handle, |s| s.position = position)
    }

    fn set_volume(&self, handle: TrackHandle, volume: f32) -> Result<()> {
        self.with_stream("set_volume", handle, |s| s.volume = volume)
    }

    fn volume(&self, handle: TrackHandle) -> Result<f32> {
        self.with_stream("volume", handle, |s| s.volume)
    }

    fn metadata(&self, path: &Path) -> Result<Track> {
        let hook = {
            let state = self.state.lock();
            if state.fail_metadata.contains(path) {
                return Err(Error::backend("metadata", Some(path.to_path_buf()), 2));
            }
            state.metadata_hook.clone()
        };
        // Run hooks outside the lock; they may call back into services.
        if let Some(hook) = hook {
            hook(path);
        }
        let duration = Self::duration_for(&self.state.lock(), path);
        let mut track = test_track(&path.to_string_lossy());
        track.duration = duration;
        Ok(track)
    }

    fn fft_data(&self, handle: TrackHandle) -> Result<Vec<f32>> {
        let state = self.state.lock();
        match state.streams.get(&handle) {
            Some(s) if s.status == PlaybackStatus::Playing => Ok(vec![0.0; 512]),
            Some(_) => Err(Error::backend("fft_data", None, 37)),
            None => Err(Error::backend("fft_data", None, 5)),
        }
    }
}

// ============================================================================
// Event recorder
// ============================================================================

/// Wildcard bus subscriber that captures every payload for assertions.
pub struct EventRecorder {
    events: Arc<Mutex<Vec<EventPayload>>>,
    #[allow(dead_code)]
    id: SubscriptionId,
}

impl EventRecorder {
    pub fn attach(bus: &Arc<EventBus>) -> Self {
        let events: Arc<Mutex<Vec<EventPayload>>> = Arc::default();
        let sink = Arc::clone(&events);
        let id = bus.subscribe_all(move |event| sink.lock().push(event.payload.clone()));
        Self { events, id }
    }

    pub fn payloads(&self) -> Vec<EventPayload> {
        self.events.lock().clone()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.lock().iter().map(EventPayload::kind).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

// ============================================================================
// In-memory repositories
// ============================================================================

/// In-memory [`HistoryRepository`] with a switchable failure mode for
/// best-effort-persistence tests.
pub struct MemoryHistory {
    state: Mutex<(Vec<Track>, i32)>,
    fail_saves: AtomicBool,
}

impl MemoryHistory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new((Vec::new(), -1)),
            fail_saves: AtomicBool::new(false),
        })
    }

    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self, operation: &'static str) -> Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(Error::Repository {
                store: "history",
                operation,
                message: "store unavailable".to_string(),
                source: None,
            });
        }
        Ok(())
    }
}

impl HistoryRepository for MemoryHistory {
    fn save_queue(&self, tracks: &[Track]) -> Result<()> {
        self.check_writable("save_queue")?;
        self.state.lock().0 = tracks.to_vec();
        Ok(())
    }

    fn load_queue(&self) -> Result<Vec<Track>> {
        Ok(self.state.lock().0.clone())
    }

    fn save_current_index(&self, index: i32) -> Result<()> {
        self.check_writable("save_current_index")?;
        self.state.lock().1 = index;
        Ok(())
    }

    fn load_current_index(&self) -> Result<i32> {
        Ok(self.state.lock().1)
    }

    fn clear(&self) -> Result<()> {
        *self.state.lock() = (Vec::new(), -1);
        Ok(())
    }
}

/// In-memory [`PlaylistRepository`].
#[derive(Default)]
pub struct MemoryPlaylists {
    playlists: Mutex<HashMap<String, Playlist>>,
}

impl MemoryPlaylists {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl PlaylistRepository for MemoryPlaylists {
    fn save(&self, playlist: &Playlist) -> Result<()> {
        self.playlists
            .lock()
            .insert(playlist.id.clone(), playlist.clone());
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Playlist> {
        self.playlists
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::PlaylistNotFound(id.to_string()))
    }

    fn load_all(&self) -> Result<Vec<Playlist>> {
        Ok(self.playlists.lock().values().cloned().collect())
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.playlists.lock().remove(id);
        Ok(())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(self.playlists.lock().contains_key(id))
    }
}

/// In-memory [`PreferencesRepository`], every key optional like the file
/// store.
#[derive(Default)]
pub struct MemoryPreferences {
    state: Mutex<StoredPreferences>,
}

#[derive(Default)]
struct StoredPreferences {
    volume: Option<f32>,
    loop_mode: Option<bool>,
    theme: Option<String>,
    scan_paths: Option<Vec<PathBuf>>,
}

impl MemoryPreferences {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed the store as if a previous run had saved these values.
    pub fn seed(&self, prefs: &Preferences) {
        let mut state = self.state.lock();
        state.volume = Some(prefs.volume);
        state.loop_mode = Some(prefs.loop_enabled);
        state.theme = Some(prefs.theme.clone());
        state.scan_paths = Some(prefs.scan_paths.clone());
    }
}

impl PreferencesRepository for MemoryPreferences {
    fn save_volume(&self, volume: f32) -> Result<()> {
        self.state.lock().volume = Some(volume);
        Ok(())
    }

    fn load_volume(&self) -> Result<f32> {
        Ok(self.state.lock().volume.unwrap_or(1.0))
    }

    fn save_loop_mode(&self, enabled: bool) -> Result<()> {
        self.state.lock().loop_mode = Some(enabled);
        Ok(())
    }

    fn load_loop_mode(&self) -> Result<bool> {
        Ok(self.state.lock().loop_mode.unwrap_or(false))
    }

    fn save_theme(&self, theme: &str) -> Result<()> {
        self.state.lock().theme = Some(theme.to_string());
        Ok(())
    }

    fn load_theme(&self) -> Result<String> {
        Ok(self
            .state
            .lock()
            .theme
            .clone()
            .unwrap_or_else(|| "system".to_string()))
    }

    fn save_scan_paths(&self, paths: &[PathBuf]) -> Result<()> {
        self.state.lock().scan_paths = Some(paths.to_vec());
        Ok(())
    }

    fn load_scan_paths(&self) -> Result<Vec<PathBuf>> {
        Ok(self.state.lock().scan_paths.clone().unwrap_or_default())
    }

    fn clear(&self) -> Result<()> {
        *self.state.lock() = StoredPreferences::default();
        Ok(())
    }
}

// ============================================================================
// Recording view
// ============================================================================

/// Everything the presenter pushed at the view, for assertions.
#[derive(Default)]
pub struct ViewState {
    pub play_state: Option<bool>,
    pub mute_state: Option<bool>,
    pub loop_state: Option<bool>,
    pub volume: Option<f32>,
    pub track_info: Option<(String, String, String)>,
    pub album_art: Option<Vec<u8>>,
    pub album_art_cleared: bool,
    pub current_time: Option<Duration>,
    pub total_time: Option<Duration>,
    pub progress: Vec<(Duration, Duration)>,
    pub selection: Option<i32>,
    pub playlist_window_open: bool,
    pub notifications: Vec<(String, String)>,
}

/// [`View`] implementation that records every call.
#[derive(Default)]
pub struct RecordingView {
    pub state: Mutex<ViewState>,
}

impl RecordingView {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notifications(&self) -> Vec<(String, String)> {
        self.state.lock().notifications.clone()
    }
}

impl View for RecordingView {
    fn set_play_state(&self, playing: bool) {
        self.state.lock().play_state = Some(playing);
    }

    fn set_mute_state(&self, muted: bool) {
        self.state.lock().mute_state = Some(muted);
    }

    fn set_loop_state(&self, looping: bool) {
        self.state.lock().loop_state = Some(looping);
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = Some(volume);
    }

    fn set_track_info(&self, title: &str, artist: &str, album: &str) {
        self.state.lock().track_info =
            Some((title.to_string(), artist.to_string(), album.to_string()));
    }

    fn set_album_art(&self, image: &[u8]) {
        let mut state = self.state.lock();
        state.album_art = Some(image.to_vec());
        state.album_art_cleared = false;
    }

    fn clear_album_art(&self) {
        let mut state = self.state.lock();
        state.album_art = None;
        state.album_art_cleared = true;
    }

    fn set_current_time(&self, time: Duration) {
        self.state.lock().current_time = Some(time);
    }

    fn set_total_time(&self, time: Duration) {
        self.state.lock().total_time = Some(time);
    }

    fn set_progress(&self, position: Duration, duration: Duration) {
        self.state.lock().progress.push((position, duration));
    }

    fn update_playlist_selection(&self, index: i32) {
        self.state.lock().selection = Some(index);
    }

    fn show_playlist_window(&self) {
        self.state.lock().playlist_window_open = true;
    }

    fn close_playlist_window(&self) {
        self.state.lock().playlist_window_open = false;
    }

    fn is_playlist_window_open(&self) -> bool {
        self.state.lock().playlist_window_open
    }

    fn show_notification(&self, title: &str, message: &str) {
        self.state
            .lock()
            .notifications
            .push((title.to_string(), message.to_string()));
    }
}
