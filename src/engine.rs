//! Audio backend capability contract.
//!
//! The core never talks to a sound card or a decoder directly; it requires
//! this trait from whoever embeds it. Implementations wrap a native audio
//! library; tests substitute an in-memory fake.
//!
//! Ownership rules: only the playback service may call the
//! playback-controlling methods; the library service is limited to
//! [`AudioEngine::metadata`]. A handle minted by [`AudioEngine::load`]
//! becomes invalid after `stop` or `unload`; any later use of it fails
//! with the backend's invalid-handle error.

use std::path::Path;
use std::time::Duration;

use crate::error::Result;
use crate::model::{PlaybackStatus, Track, TrackHandle};

/// The capability set the core requires from an audio backend.
///
/// Every method reports failure as `Error::Backend`, carrying the
/// operation name, the file path when relevant, the backend's numeric
/// code, and an optional wrapped cause.
pub trait AudioEngine: Send + Sync {
    /// Bring up the output device. `device` of −1 selects the default.
    fn initialize(&self, device: i32, frequency: u32, flags: u32) -> Result<()>;

    /// Release the device. Idempotent.
    fn shutdown(&self) -> Result<()>;

    /// Decode a file and mint a handle for the stream.
    fn load(&self, path: &Path) -> Result<TrackHandle>;

    /// Release a stream without playing it.
    fn unload(&self, handle: TrackHandle) -> Result<()>;

    fn play(&self, handle: TrackHandle) -> Result<()>;

    fn pause(&self, handle: TrackHandle) -> Result<()>;

    /// Halt playback. Stopping also releases the handle: using it again
    /// yields the backend's invalid-handle failure.
    fn stop(&self, handle: TrackHandle) -> Result<()>;

    fn status(&self, handle: TrackHandle) -> Result<PlaybackStatus>;

    /// Current position within the stream.
    fn position(&self, handle: TrackHandle) -> Result<Duration>;

    /// Total stream duration.
    fn duration(&self, handle: TrackHandle) -> Result<Duration>;

    fn seek(&self, handle: TrackHandle, position: Duration) -> Result<()>;

    /// Set the stream volume, `[0.0, 1.0]`.
    fn set_volume(&self, handle: TrackHandle, volume: f32) -> Result<()>;

    fn volume(&self, handle: TrackHandle) -> Result<f32>;

    /// Probe a file's tags and stream properties without loading it for
    /// playback. Tracker modules are probed with module-specific fields.
    fn metadata(&self, path: &Path) -> Result<Track>;

    /// Frequency-domain snapshot of the currently playing stream, for
    /// visualisers. May fail when the handle is not actively playing.
    fn fft_data(&self, handle: TrackHandle) -> Result<Vec<f32>>;
}
