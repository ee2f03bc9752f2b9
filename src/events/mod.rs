//! Domain events published on the bus.
//!
//! Every notification the services emit is an [`Event`]: a UTC timestamp
//! plus an [`EventPayload`] variant. [`EventKind`] is the fieldless
//! parallel of the payload enum and is what subscribers key on.
//!
//! Events are values. They are cloned into every handler; consumers never
//! mutate them. Producers can check `EventBus::has_subscribers` before
//! building an expensive payload (e.g. a full queue snapshot).

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::time::Duration;

use crate::model::{ScanProgress, Track, TrackHandle};

/// Envelope for bus traffic: when it happened plus what happened.
#[derive(Debug, Clone)]
pub struct Event {
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

impl Event {
    /// Stamp a payload with the current time.
    pub fn new(payload: EventPayload) -> Self {
        Self {
            timestamp: Utc::now(),
            payload,
        }
    }

    /// The subscription key for this event.
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

/// Everything the core can announce.
#[derive(Debug, Clone)]
pub enum EventPayload {
    /// A track was decoded and is ready to play.
    TrackLoaded {
        track: Track,
        /// Backend stream handle, exposed for diagnostics only.
        handle: TrackHandle,
        duration: Duration,
        /// Queue position the track was loaded from.
        index: usize,
    },
    TrackStarted {
        track: Track,
    },
    TrackPaused {
        track: Track,
        /// Position captured at the moment of pausing.
        position: Duration,
    },
    TrackStopped {
        track: Track,
    },
    /// A track played to its natural end.
    TrackCompleted {
        track: Track,
    },
    /// Periodic position report from the progress ticker.
    TrackProgress {
        position: Duration,
        duration: Duration,
    },
    /// A backend operation on a track failed.
    TrackError {
        track: Track,
        cause: String,
    },
    /// A track completed with looping off; the playlist should advance.
    AutoNext {
        track: Track,
        /// Queue position of the finished track. Stale-index guard: the
        /// playlist ignores the event when this no longer matches.
        index: usize,
    },
    VolumeChanged {
        volume: f32,
    },
    MuteToggled {
        muted: bool,
    },
    LoopToggled {
        enabled: bool,
    },
    /// Queue contents or cursor changed.
    PlaylistUpdated {
        queue: Vec<Track>,
        /// Current cursor; −1 when nothing is selected.
        index: i32,
    },
    /// The queue was replaced wholesale (currently: cleared).
    QueueChanged {
        queue: Vec<Track>,
    },
    TrackAdded {
        track: Track,
        /// Position the track landed at.
        index: usize,
    },
    ScanStarted {
        root: PathBuf,
    },
    ScanProgress {
        progress: ScanProgress,
    },
    ScanCompleted {
        tracks: Vec<Track>,
    },
    ScanCancelled {
        reason: String,
    },
}

impl EventPayload {
    /// The subscription key for this payload.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::TrackLoaded { .. } => EventKind::TrackLoaded,
            Self::TrackStarted { .. } => EventKind::TrackStarted,
            Self::TrackPaused { .. } => EventKind::TrackPaused,
            Self::TrackStopped { .. } => EventKind::TrackStopped,
            Self::TrackCompleted { .. } => EventKind::TrackCompleted,
            Self::TrackProgress { .. } => EventKind::TrackProgress,
            Self::TrackError { .. } => EventKind::TrackError,
            Self::AutoNext { .. } => EventKind::AutoNext,
            Self::VolumeChanged { .. } => EventKind::VolumeChanged,
            Self::MuteToggled { .. } => EventKind::MuteToggled,
            Self::LoopToggled { .. } => EventKind::LoopToggled,
            Self::PlaylistUpdated { .. } => EventKind::PlaylistUpdated,
            Self::QueueChanged { .. } => EventKind::QueueChanged,
            Self::TrackAdded { .. } => EventKind::TrackAdded,
            Self::ScanStarted { .. } => EventKind::ScanStarted,
            Self::ScanProgress { .. } => EventKind::ScanProgress,
            Self::ScanCompleted { .. } => EventKind::ScanCompleted,
            Self::ScanCancelled { .. } => EventKind::ScanCancelled,
        }
    }

    /// Short human-readable label used in log lines.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::TrackLoaded { .. } => "track loaded",
            Self::TrackStarted { .. } => "track started",
            Self::TrackPaused { .. } => "track paused",
            Self::TrackStopped { .. } => "track stopped",
            Self::TrackCompleted { .. } => "track completed",
            Self::TrackProgress { .. } => "track progress",
            Self::TrackError { .. } => "track error",
            Self::AutoNext { .. } => "auto next",
            Self::VolumeChanged { .. } => "volume changed",
            Self::MuteToggled { .. } => "mute toggled",
            Self::LoopToggled { .. } => "loop toggled",
            Self::PlaylistUpdated { .. } => "playlist updated",
            Self::QueueChanged { .. } => "queue changed",
            Self::TrackAdded { .. } => "track added",
            Self::ScanStarted { .. } => "scan started",
            Self::ScanProgress { .. } => "scan progress",
            Self::ScanCompleted { .. } => "scan completed",
            Self::ScanCancelled { .. } => "scan cancelled",
        }
    }
}

/// Type code of an event, used as the subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TrackLoaded,
    TrackStarted,
    TrackPaused,
    TrackStopped,
    TrackCompleted,
    TrackProgress,
    TrackError,
    AutoNext,
    VolumeChanged,
    MuteToggled,
    LoopToggled,
    PlaylistUpdated,
    QueueChanged,
    TrackAdded,
    ScanStarted,
    ScanProgress,
    ScanCompleted,
    ScanCancelled,
}
