//! Playback service: owns the current track and its backend handle.
//!
//! All playback-controlling engine calls in the system go through this
//! service. It holds the one live [`TrackHandle`], the volume/mute/loop
//! flags, and the two flags the progress ticker needs to tell a natural
//! end from a user stop (`manual_stop`, `has_played`).
//!
//! # Locking
//!
//! One `RwLock` guards the fields. The write guard is only ever held
//! across local mutation; engine calls and bus publishes happen with no
//! guard held (take-then-commit). This matters because publishing can
//! re-enter this service: the natural-completion path publishes
//! `AutoNext`, the playlist's handler calls back into `load_track`, and
//! any lock still held here would deadlock.
//!
//! # Progress ticker
//!
//! A background thread polls the engine at [`PROGRESS_INTERVAL`] while a
//! handle is held, publishes `TrackProgress`, and detects natural
//! completion: the backend reports stopped, the user did not stop it, and
//! the track actually played. On completion it either restarts the track
//! (loop on) or publishes `AutoNext` (loop off).

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::bus::EventBus;
use crate::engine::AudioEngine;
use crate::error::{Error, Result};
use crate::events::EventPayload;
use crate::model::{PlaybackState, PlaybackStatus, Track, TrackHandle};

/// Cadence of the background progress ticker (~3 Hz).
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(333);

struct Fields {
    track: Option<Track>,
    handle: TrackHandle,
    /// Queue position of the current track; −1 when none.
    index: i32,
    volume: f32,
    /// Volume to restore when unmuting.
    saved_volume: f32,
    muted: bool,
    looping: bool,
    /// Set by `stop`, cleared by `load_track`/`play`. A stopped status
    /// with this flag up is the user's doing, not a completed track.
    manual_stop: bool,
    /// Set by `play`. Guards against treating a freshly loaded,
    /// never-started track as completed.
    has_played: bool,
}

impl Default for Fields {
    fn default() -> Self {
        Self {
            track: None,
            handle: TrackHandle::NONE,
            index: -1,
            volume: 1.0,
            saved_volume: 1.0,
            muted: false,
            looping: false,
            manual_stop: false,
            has_played: false,
        }
    }
}

struct Ticker {
    stop: Sender<()>,
    thread: JoinHandle<()>,
}

/// Drives the audio engine and publishes every playback transition.
pub struct PlaybackService {
    engine: Arc<dyn AudioEngine>,
    bus: Arc<EventBus>,
    fields: RwLock<Fields>,
    ticker: Mutex<Option<Ticker>>,
}

impl PlaybackService {
    /// Create the service and start its progress ticker.
    pub fn new(engine: Arc<dyn AudioEngine>, bus: Arc<EventBus>) -> Arc<Self> {
        Self::with_progress_interval(engine, bus, PROGRESS_INTERVAL)
    }

    /// Like [`PlaybackService::new`] with a custom ticker cadence.
    pub fn with_progress_interval(
        engine: Arc<dyn AudioEngine>,
        bus: Arc<EventBus>,
        interval: Duration,
    ) -> Arc<Self> {
        let service = Arc::new(Self {
            engine,
            bus,
            fields: RwLock::new(Fields::default()),
            ticker: Mutex::new(None),
        });

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(0);
        let weak: Weak<PlaybackService> = Arc::downgrade(&service);
        let thread = std::thread::Builder::new()
            .name("playback-progress".to_string())
            .spawn(move || {
                let tick = crossbeam_channel::tick(interval);
                loop {
                    crossbeam_channel::select! {
                        recv(tick) -> _ => {
                            let Some(service) = weak.upgrade() else { break };
                            service.poll_progress();
                        }
                        recv(stop_rx) -> _ => break,
                    }
                }
            })
            .expect("failed to spawn playback progress ticker");
        *service.ticker.lock() = Some(Ticker {
            stop: stop_tx,
            thread,
        });
        service
    }

    /// Load a track for playback, replacing whatever was loaded.
    ///
    /// `index` is the track's queue position, echoed back in events and
    /// state snapshots. Publishes `TrackLoaded` on success, `TrackError`
    /// on backend failure.
    pub fn load_track(&self, track: &Track, index: usize) -> Result<()> {
        // Take the old handle first; the engine call happens lock-free.
        let old = {
            let mut fields = self.fields.write();
            std::mem::take(&mut fields.handle)
        };
        if !old.is_none() {
            if let Err(e) = self.engine.stop(old) {
                tracing::warn!("failed to stop previous stream {old}: {e}");
            }
        }

        let handle = match self.engine.load(&track.file_path) {
            Ok(handle) => handle,
            Err(e) => {
                // The old stream is already gone; don't keep its track.
                self.clear_stream();
                return Err(self.track_error(track, e));
            }
        };

        // Apply the effective volume to the new stream; a muted player
        // keeps the engine at zero.
        let effective = {
            let fields = self.fields.read();
            if fields.muted { 0.0 } else { fields.volume }
        };
        if let Err(e) = self.engine.set_volume(handle, effective) {
            let _ = self.engine.unload(handle);
            self.clear_stream();
            return Err(self.track_error(track, e));
        }

        let duration = match self.engine.duration(handle) {
            Ok(duration) => duration,
            Err(e) => {
                let _ = self.engine.unload(handle);
                self.clear_stream();
                return Err(self.track_error(track, e));
            }
        };

        {
            let mut fields = self.fields.write();
            fields.handle = handle;
            fields.track = Some(track.clone());
            fields.index = index as i32;
            fields.manual_stop = false;
            fields.has_played = false;
        }
        tracing::debug!(
            target: "playback::events",
            "loaded {} as {handle} ({duration:?})",
            track.file_path.display()
        );
        self.bus.publish(EventPayload::TrackLoaded {
            track: track.clone(),
            handle,
            duration,
            index,
        });
        Ok(())
    }

    /// Start or resume the loaded track. A no-op when already playing.
    pub fn play(&self) -> Result<()> {
        let (handle, track) = self.require_loaded()?;

        if matches!(self.engine.status(handle), Ok(PlaybackStatus::Playing)) {
            return Ok(());
        }

        {
            let mut fields = self.fields.write();
            fields.manual_stop = false;
            fields.has_played = true;
        }
        if let Err(e) = self.engine.play(handle) {
            self.fields.write().has_played = false;
            self.clear_stream();
            return Err(self.track_error(&track, e));
        }
        self.bus.publish(EventPayload::TrackStarted { track });
        Ok(())
    }

    /// Pause the loaded track, capturing the position it paused at.
    pub fn pause(&self) -> Result<()> {
        let (handle, track) = self.require_loaded()?;

        // Zero when the engine refuses to report.
        let position = self.engine.position(handle).unwrap_or_default();
        if let Err(e) = self.engine.pause(handle) {
            self.clear_stream();
            return Err(self.track_error(&track, e));
        }
        self.bus.publish(EventPayload::TrackPaused { track, position });
        Ok(())
    }

    /// Stop and unload the current track. Succeeds silently when nothing
    /// is loaded.
    ///
    /// The in-memory fields are cleared before the backend call can fail:
    /// after this returns the service never believes it still owns a
    /// handle, whatever the backend did.
    pub fn stop(&self) -> Result<()> {
        let (handle, track) = {
            let mut fields = self.fields.write();
            if fields.handle.is_none() {
                return Ok(());
            }
            fields.manual_stop = true;
            fields.has_played = false;
            fields.index = -1;
            (std::mem::take(&mut fields.handle), fields.track.take())
        };

        if let Err(e) = self.engine.stop(handle) {
            // Degrade: the stream is gone from our side regardless.
            tracing::warn!("backend stop of {handle} failed: {e}");
        }
        if let Some(track) = track {
            self.bus.publish(EventPayload::TrackStopped { track });
        }
        Ok(())
    }

    /// Set the playback volume. While muted the value is stored (and
    /// `VolumeChanged` still published, so sliders re-render) but the
    /// engine stays at zero until unmute.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(Error::InvalidVolume(volume));
        }

        let (handle, muted, track) = {
            let mut fields = self.fields.write();
            fields.volume = volume;
            if fields.muted {
                fields.saved_volume = volume;
            }
            (fields.handle, fields.muted, fields.track.clone())
        };

        if !muted && !handle.is_none() {
            if let Err(e) = self.engine.set_volume(handle, volume) {
                if let Some(track) = track {
                    return Err(self.track_error(&track, e));
                }
                return Err(e);
            }
        }
        self.bus.publish(EventPayload::VolumeChanged { volume });
        Ok(())
    }

    /// Mute or unmute. Idempotent: repeated calls with the same value
    /// publish nothing. Unmuting restores the pre-mute volume.
    pub fn set_muted(&self, muted: bool) -> Result<()> {
        let (handle, target) = {
            let mut fields = self.fields.write();
            if fields.muted == muted {
                return Ok(());
            }
            fields.muted = muted;
            if muted {
                fields.saved_volume = fields.volume;
                (fields.handle, 0.0)
            } else {
                fields.volume = fields.saved_volume;
                (fields.handle, fields.saved_volume)
            }
        };

        if !handle.is_none() {
            self.engine.set_volume(handle, target)?;
        }
        self.bus.publish(EventPayload::MuteToggled { muted });
        Ok(())
    }

    /// Enable or disable looping. Idempotent: repeated calls with the
    /// same value publish nothing.
    pub fn set_looping(&self, looping: bool) -> Result<()> {
        {
            let mut fields = self.fields.write();
            if fields.looping == looping {
                return Ok(());
            }
            fields.looping = looping;
        }
        self.bus
            .publish(EventPayload::LoopToggled { enabled: looping });
        Ok(())
    }

    /// Seek within the loaded track. Positions up to and including the
    /// duration are accepted.
    pub fn seek(&self, position: Duration) -> Result<()> {
        let (handle, track) = self.require_loaded()?;

        let duration = self.engine.duration(handle)?;
        if position > duration {
            return Err(Error::SeekOutOfRange { position, duration });
        }
        if let Err(e) = self.engine.seek(handle, position) {
            self.clear_stream();
            return Err(self.track_error(&track, e));
        }
        self.bus
            .publish(EventPayload::TrackProgress { position, duration });
        Ok(())
    }

    /// Snapshot of the full playback state, augmented with live engine
    /// queries while a handle is held.
    pub fn state(&self) -> PlaybackState {
        let fields = self.fields.read();
        let mut state = PlaybackState {
            track: fields.track.clone(),
            queue_index: fields.index,
            status: PlaybackStatus::Stopped,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            volume: fields.volume,
            muted: fields.muted,
            looping: fields.looping,
        };
        if !fields.handle.is_none() {
            state.status = self
                .engine
                .status(fields.handle)
                .unwrap_or(PlaybackStatus::Stopped);
            state.position = self.engine.position(fields.handle).unwrap_or_default();
            state.duration = self.engine.duration(fields.handle).unwrap_or_default();
        }
        state
    }

    /// One progress-ticker iteration. Called by the background thread;
    /// exposed so tests can drive completion detection deterministically.
    pub fn poll_progress(&self) {
        let (position, duration, should_finish) = {
            let fields = self.fields.read();
            if fields.handle.is_none() {
                return;
            }
            let status = match self.engine.status(fields.handle) {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(target: "playback::ticker", "status query failed: {e}");
                    return;
                }
            };
            let position = self.engine.position(fields.handle).unwrap_or_default();
            let duration = self.engine.duration(fields.handle).unwrap_or_default();
            let should_finish = status == PlaybackStatus::Stopped
                && !fields.manual_stop
                && fields.has_played;
            (position, duration, should_finish)
            // Read guard drops here, before any publish: the completion
            // path below re-enters this service via the playlist.
        };

        self.bus
            .publish(EventPayload::TrackProgress { position, duration });
        if should_finish {
            self.handle_natural_completion();
        }
    }

    /// The track played to its end on its own. Either restart it (loop
    /// on) or hand the decision to the playlist via `AutoNext`.
    fn handle_natural_completion(&self) {
        let (track, index, looping, handle) = {
            let mut fields = self.fields.write();
            let Some(track) = fields.track.clone() else {
                return;
            };
            fields.has_played = false;
            (track, fields.index.max(0) as usize, fields.looping, fields.handle)
        };

        self.bus.publish(EventPayload::TrackCompleted {
            track: track.clone(),
        });

        if looping {
            {
                let mut fields = self.fields.write();
                fields.handle = TrackHandle::NONE;
                fields.track = None;
            }
            if let Err(e) = self.engine.stop(handle) {
                tracing::debug!("stop of finished stream {handle} failed: {e}");
            }
            self.bus.publish(EventPayload::TrackStopped {
                track: track.clone(),
            });
            // Restart through the public paths; they take their own locks.
            if let Err(e) = self
                .load_track(&track, index)
                .and_then(|()| self.play())
            {
                tracing::warn!("loop restart of {} failed: {e}", track.file_path.display());
            }
        } else {
            self.bus.publish(EventPayload::AutoNext { track, index });
        }
    }

    /// Stop the ticker, join it, and stop the current track. Idempotent.
    pub fn shutdown(&self) {
        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            drop(ticker.stop);
            if ticker.thread.join().is_err() {
                tracing::error!("playback progress ticker panicked");
            }
        }
        if let Err(e) = self.stop() {
            tracing::warn!("stop during shutdown failed: {e}");
        }
    }

    fn require_loaded(&self) -> Result<(TrackHandle, Track)> {
        let fields = self.fields.read();
        if fields.handle.is_none() {
            return Err(Error::NoTrackLoaded);
        }
        let track = fields.track.clone().ok_or(Error::NoTrackLoaded)?;
        Ok((fields.handle, track))
    }

    /// An engine failure invalidates the handle by fiat: forget the
    /// stream so no later call touches a handle the backend disowned.
    fn clear_stream(&self) {
        let mut fields = self.fields.write();
        fields.handle = TrackHandle::NONE;
        fields.track = None;
        fields.index = -1;
    }

    /// Publish `TrackError` for passive observers and pass the error on.
    fn track_error(&self, track: &Track, error: Error) -> Error {
        self.bus.publish(EventPayload::TrackError {
            track: track.clone(),
            cause: error.to_string(),
        });
        error
    }
}

impl Drop for PlaybackService {
    fn drop(&mut self) {
        // The ticker holds only a weak reference, so it unblocks on its
        // next tick even without an explicit shutdown; joining here would
        // deadlock when the drop happens on the ticker thread itself.
        if let Some(ticker) = self.ticker.lock().take() {
            drop(ticker.stop);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use crate::test_utils::{test_track, EventRecorder, FakeEngine};

    fn fixture() -> (Arc<FakeEngine>, Arc<EventBus>, Arc<PlaybackService>, EventRecorder) {
        let engine = FakeEngine::new();
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);
        let service = PlaybackService::with_progress_interval(
            engine.clone(),
            bus.clone(),
            Duration::from_secs(3600), // background ticker effectively off
        );
        (engine, bus, service, recorder)
    }

    #[test]
    fn test_load_publishes_track_loaded_with_minted_handle() {
        let (_, _, service, recorder) = fixture();
        let track = test_track("/m/a.mp3");

        service.load_track(&track, 0).unwrap();

        let events = recorder.payloads();
        assert_eq!(events.len(), 1);
        match &events[0] {
            EventPayload::TrackLoaded {
                track: t,
                handle,
                duration,
                index,
            } => {
                assert_eq!(t.file_path, track.file_path);
                assert!(!handle.is_none());
                assert_eq!(*duration, Duration::from_secs(180));
                assert_eq!(*index, 0);
            }
            other => panic!("expected TrackLoaded, got {other:?}"),
        }

        let state = service.state();
        assert_eq!(state.track.unwrap().file_path, track.file_path);
        assert_eq!(state.queue_index, 0);
    }

    #[test]
    fn test_load_failure_publishes_track_error() {
        let (engine, _, service, recorder) = fixture();
        let track = test_track("/m/broken.mp3");
        engine.fail_load(&track.file_path);

        assert!(service.load_track(&track, 0).is_err());
        assert_eq!(recorder.kinds(), vec![EventKind::TrackError]);
        assert!(service.state().track.is_none());
    }

    #[test]
    fn test_play_publishes_started_once() {
        let (_, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        recorder.clear();

        service.play().unwrap();
        service.play().unwrap(); // already playing: no second event

        assert_eq!(recorder.kinds(), vec![EventKind::TrackStarted]);
        assert_eq!(service.state().status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_play_without_track_is_invalid_state() {
        let (_, _, service, _) = fixture();
        assert!(matches!(service.play(), Err(Error::NoTrackLoaded)));
    }

    #[test]
    fn test_pause_captures_position() {
        let (engine, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        service.play().unwrap();
        engine.set_position_of_only_stream(Duration::from_secs(42));
        recorder.clear();

        service.pause().unwrap();

        match &recorder.payloads()[0] {
            EventPayload::TrackPaused { position, .. } => {
                assert_eq!(*position, Duration::from_secs(42));
            }
            other => panic!("expected TrackPaused, got {other:?}"),
        }
        assert_eq!(service.state().status, PlaybackStatus::Paused);
    }

    #[test]
    fn test_stop_clears_handle_even_when_backend_fails() {
        let (engine, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        service.play().unwrap();
        engine.fail_stop(true);
        recorder.clear();

        service.stop().unwrap();

        let state = service.state();
        assert!(state.track.is_none());
        assert_eq!(state.status, PlaybackStatus::Stopped);
        assert_eq!(state.queue_index, -1);
        assert_eq!(recorder.kinds(), vec![EventKind::TrackStopped]);

        // A second stop with nothing loaded succeeds silently.
        recorder.clear();
        service.stop().unwrap();
        assert!(recorder.kinds().is_empty());
    }

    #[test]
    fn test_volume_bounds() {
        let (_, _, service, _) = fixture();
        assert!(service.set_volume(0.0).is_ok());
        assert!(service.set_volume(1.0).is_ok());
        assert!(matches!(
            service.set_volume(-0.01),
            Err(Error::InvalidVolume(_))
        ));
        assert!(matches!(
            service.set_volume(1.01),
            Err(Error::InvalidVolume(_))
        ));
    }

    #[test]
    fn test_set_volume_while_muted_keeps_engine_silent() {
        let (engine, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        service.set_volume(0.6).unwrap();
        service.set_muted(true).unwrap();
        recorder.clear();

        service.set_volume(0.9).unwrap();

        // Event still fires so sliders can re-render.
        assert_eq!(recorder.kinds(), vec![EventKind::VolumeChanged]);
        assert_eq!(engine.volume_of_only_stream(), 0.0);
        assert_eq!(service.state().volume, 0.9);

        // Unmute restores the value chosen while muted.
        service.set_muted(false).unwrap();
        assert_eq!(engine.volume_of_only_stream(), 0.9);
    }

    #[test]
    fn test_mute_round_trip_restores_premute_volume() {
        let (engine, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        service.set_volume(0.6).unwrap();
        recorder.clear();

        service.set_muted(true).unwrap();
        assert_eq!(engine.volume_of_only_stream(), 0.0);
        service.set_muted(true).unwrap(); // idempotent: no extra event

        service.set_muted(false).unwrap();
        assert_eq!(engine.volume_of_only_stream(), 0.6);
        assert_eq!(
            recorder.kinds(),
            vec![EventKind::MuteToggled, EventKind::MuteToggled]
        );
    }

    #[test]
    fn test_set_looping_publishes_at_most_once() {
        let (_, _, service, recorder) = fixture();
        service.set_looping(true).unwrap();
        service.set_looping(true).unwrap();
        assert_eq!(recorder.kinds(), vec![EventKind::LoopToggled]);
        assert!(service.state().looping);
    }

    #[test]
    fn test_seek_boundaries() {
        let (_, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        recorder.clear();

        service.seek(Duration::ZERO).unwrap();
        service.seek(Duration::from_secs(180)).unwrap(); // exactly the end
        assert!(matches!(
            service.seek(Duration::from_secs(181)),
            Err(Error::SeekOutOfRange { .. })
        ));
        assert_eq!(
            recorder.kinds(),
            vec![EventKind::TrackProgress, EventKind::TrackProgress]
        );
    }

    #[test]
    fn test_natural_completion_publishes_auto_next() {
        let (engine, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 3).unwrap();
        service.play().unwrap();
        engine.finish_only_stream();
        recorder.clear();

        service.poll_progress();

        let kinds = recorder.kinds();
        assert_eq!(
            kinds,
            vec![
                EventKind::TrackProgress,
                EventKind::TrackCompleted,
                EventKind::AutoNext
            ]
        );
        match recorder.payloads().last().unwrap() {
            EventPayload::AutoNext { index, .. } => assert_eq!(*index, 3),
            other => panic!("expected AutoNext, got {other:?}"),
        }
    }

    #[test]
    fn test_never_started_track_does_not_complete() {
        let (engine, _, service, recorder) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        // Backend reports stopped (it was never started), but has_played
        // is false so this is not a completion.
        engine.finish_only_stream();
        recorder.clear();

        service.poll_progress();

        assert_eq!(recorder.kinds(), vec![EventKind::TrackProgress]);
    }

    #[test]
    fn test_looping_completion_restarts_track() {
        let (engine, _, service, recorder) = fixture();
        service.set_looping(true).unwrap();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        service.play().unwrap();
        engine.finish_only_stream();
        recorder.clear();

        service.poll_progress();

        assert_eq!(
            recorder.kinds(),
            vec![
                EventKind::TrackProgress,
                EventKind::TrackCompleted,
                EventKind::TrackStopped,
                EventKind::TrackLoaded,
                EventKind::TrackStarted,
            ]
        );
        assert_eq!(service.state().status, PlaybackStatus::Playing);
    }

    #[test]
    fn test_background_ticker_emits_progress() {
        let engine = FakeEngine::new();
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);
        let service = PlaybackService::with_progress_interval(
            engine,
            bus,
            Duration::from_millis(5),
        );
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        service.play().unwrap();

        std::thread::sleep(Duration::from_millis(60));
        assert!(recorder.kinds().contains(&EventKind::TrackProgress));
        service.shutdown();
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let (_, _, service, _) = fixture();
        service.load_track(&test_track("/m/a.mp3"), 0).unwrap();
        service.shutdown();
        service.shutdown();
        assert!(service.state().track.is_none());
    }
}
