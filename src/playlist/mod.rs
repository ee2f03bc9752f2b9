//! Playlist service: the queue, its cursor, and auto-advance.
//!
//! Owns the ordered track queue and the current index (−1 when nothing is
//! selected). Tracks are deduplicated by file path on every insertion.
//! Loading and starting tracks is delegated to the playback service; the
//! two are decoupled for natural completion by the `AutoNext` event: the
//! playback ticker publishes it, this service subscribes and advances.
//!
//! The queue lock is never held across playback calls or publishes:
//! the auto-next handler in particular runs on the progress-ticker thread
//! and re-enters the playback service.

use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::{Arc, Weak};

use crate::bus::{EventBus, SubscriptionId};
use crate::error::{Error, Result};
use crate::events::{EventKind, EventPayload};
use crate::model::{Playlist, Track};
use crate::playback::PlaybackService;
use crate::repository::{HistoryRepository, PlaylistRepository};

struct QueueState {
    queue: Vec<Track>,
    /// Cursor into `queue`; −1 when nothing is selected.
    current: i32,
}

/// Manages the play queue and drives the playback service.
pub struct PlaylistService {
    playback: Arc<PlaybackService>,
    history: Arc<dyn HistoryRepository>,
    playlists: Arc<dyn PlaylistRepository>,
    bus: Arc<EventBus>,
    state: RwLock<QueueState>,
    auto_next_sub: Mutex<Option<SubscriptionId>>,
}

impl PlaylistService {
    /// Create the service and subscribe it to `AutoNext`.
    pub fn new(
        playback: Arc<PlaybackService>,
        history: Arc<dyn HistoryRepository>,
        playlists: Arc<dyn PlaylistRepository>,
        bus: Arc<EventBus>,
    ) -> Arc<Self> {
        let service = Arc::new(Self {
            playback,
            history,
            playlists,
            bus: Arc::clone(&bus),
            state: RwLock::new(QueueState {
                queue: Vec::new(),
                current: -1,
            }),
            auto_next_sub: Mutex::new(None),
        });

        let weak: Weak<PlaylistService> = Arc::downgrade(&service);
        let sub = bus.subscribe(EventKind::AutoNext, move |event| {
            let EventPayload::AutoNext { index, .. } = &event.payload else {
                return;
            };
            if let Some(service) = weak.upgrade() {
                service.handle_auto_next(*index);
            }
        });
        *service.auto_next_sub.lock() = Some(sub);
        service
    }

    /// Append a track, optionally loading and playing it right away.
    ///
    /// Duplicates (same file path) are rejected. Event order per call:
    /// `TrackAdded`, then (when playing) `TrackLoaded`/`TrackStarted`,
    /// then exactly one `PlaylistUpdated`.
    pub fn add_track(&self, track: &Track, play_immediately: bool) -> Result<()> {
        let new_index = {
            let mut state = self.state.write();
            if state
                .queue
                .iter()
                .any(|t| t.file_path == track.file_path)
            {
                return Err(Error::DuplicateTrack(track.file_path.clone()));
            }
            state.queue.push(track.clone());
            state.queue.len() - 1
        };
        self.bus.publish(EventPayload::TrackAdded {
            track: track.clone(),
            index: new_index,
        });

        if play_immediately {
            self.state.write().current = new_index as i32;
            self.playback.load_track(track, new_index)?;
            self.playback.play()?;
        }
        self.publish_playlist_updated();
        Ok(())
    }

    /// Append a batch, skipping entries already queued. A fully filtered
    /// batch is a silent no-op (no `PlaylistUpdated`); otherwise one
    /// `TrackAdded` per admitted track and exactly one `PlaylistUpdated`.
    pub fn add_tracks(&self, tracks: &[Track], play_first: bool) -> Result<()> {
        let admitted: Vec<(Track, usize)> = {
            let mut state = self.state.write();
            let mut admitted = Vec::new();
            for track in tracks {
                if state
                    .queue
                    .iter()
                    .any(|t| t.file_path == track.file_path)
                {
                    continue;
                }
                state.queue.push(track.clone());
                admitted.push((track.clone(), state.queue.len() - 1));
            }
            admitted
        };
        if admitted.is_empty() {
            return Ok(());
        }

        for (track, index) in &admitted {
            self.bus.publish(EventPayload::TrackAdded {
                track: track.clone(),
                index: *index,
            });
        }
        if play_first {
            let (track, index) = &admitted[0];
            self.state.write().current = *index as i32;
            self.playback.load_track(track, *index)?;
            self.playback.play()?;
        }
        self.publish_playlist_updated();
        Ok(())
    }

    /// Remove the track at `index`. Removing the current track stops
    /// playback and deselects (the cursor does not auto-advance).
    pub fn remove_track(&self, index: usize) -> Result<()> {
        let was_current = {
            let mut state = self.state.write();
            let len = state.queue.len();
            if index >= len {
                return Err(Error::InvalidIndex { index, len });
            }
            let was_current = index as i32 == state.current;
            state.queue.remove(index);
            if was_current {
                state.current = -1;
            } else if (index as i32) < state.current {
                state.current -= 1;
            }
            was_current
        };
        if was_current {
            self.playback.stop()?;
        }
        self.publish_playlist_updated();
        Ok(())
    }

    /// Stop playback and empty the queue. A second clear on an already
    /// empty queue is a no-op.
    pub fn clear_queue(&self) -> Result<()> {
        {
            let state = self.state.read();
            if state.queue.is_empty() && state.current == -1 {
                return Ok(());
            }
        }
        self.playback.stop()?;
        {
            let mut state = self.state.write();
            state.queue.clear();
            state.current = -1;
        }
        self.bus
            .publish(EventPayload::QueueChanged { queue: Vec::new() });
        Ok(())
    }

    /// Move the cursor to `index` and play that track.
    pub fn play_track_at(&self, index: usize) -> Result<()> {
        let track = {
            let mut state = self.state.write();
            if state.queue.is_empty() {
                return Err(Error::QueueEmpty);
            }
            let len = state.queue.len();
            if index >= len {
                return Err(Error::InvalidIndex { index, len });
            }
            state.current = index as i32;
            state.queue[index].clone()
        };
        self.playback.load_track(&track, index)?;
        self.playback.play()?;
        self.publish_playlist_updated();
        Ok(())
    }

    /// Play the queued track with this file path.
    pub fn play_track_by_path(&self, path: &Path) -> Result<()> {
        let index = {
            let state = self.state.read();
            state
                .queue
                .iter()
                .position(|t| t.file_path == path)
                .ok_or_else(|| Error::TrackNotFound(path.to_path_buf()))?
        };
        self.play_track_at(index)
    }

    /// Advance to the next queued track.
    pub fn play_next(&self) -> Result<()> {
        let next = {
            let state = self.state.read();
            if state.queue.is_empty() {
                return Err(Error::QueueEmpty);
            }
            if state.current + 1 >= state.queue.len() as i32 {
                return Err(Error::EndOfQueue);
            }
            (state.current + 1) as usize
        };
        self.play_track_at(next)
    }

    /// Step back to the previous queued track.
    pub fn play_previous(&self) -> Result<()> {
        let previous = {
            let state = self.state.read();
            if state.queue.is_empty() {
                return Err(Error::QueueEmpty);
            }
            if state.current <= 0 {
                return Err(Error::StartOfQueue);
            }
            (state.current - 1) as usize
        };
        self.play_track_at(previous)
    }

    /// Reorder the queue, keeping the cursor on the same track.
    pub fn move_track(&self, from: usize, to: usize) -> Result<()> {
        {
            let mut state = self.state.write();
            let len = state.queue.len();
            if from >= len {
                return Err(Error::InvalidIndex { index: from, len });
            }
            if to >= len {
                return Err(Error::InvalidIndex { index: to, len });
            }
            if from != to {
                let track = state.queue.remove(from);
                state.queue.insert(to, track);

                if state.current >= 0 {
                    let current = state.current as usize;
                    if from == current {
                        state.current = to as i32;
                    } else if from < current && to >= current {
                        state.current -= 1;
                    } else if from > current && to <= current {
                        state.current += 1;
                    }
                }
            }
        }
        self.publish_playlist_updated();
        Ok(())
    }

    /// Snapshot of the queued tracks.
    pub fn queue(&self) -> Vec<Track> {
        self.state.read().queue.clone()
    }

    /// Current cursor; −1 when nothing is selected.
    pub fn current_index(&self) -> i32 {
        self.state.read().current
    }

    pub fn len(&self) -> usize {
        self.state.read().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().queue.is_empty()
    }

    /// Persist the queue and cursor through the history repository.
    pub fn persist_queue(&self) -> Result<()> {
        let (queue, current) = {
            let state = self.state.read();
            (state.queue.clone(), state.current)
        };
        self.history.save_queue(&queue)?;
        self.history.save_current_index(current)?;
        Ok(())
    }

    /// Replace the queue with the persisted one and publish
    /// `PlaylistUpdated` so the UI can rebuild.
    pub fn restore_queue(&self) -> Result<()> {
        let queue = self.history.load_queue()?;
        let index = self.history.load_current_index()?;
        {
            let mut state = self.state.write();
            let len = queue.len() as i32;
            state.current = if (0..len).contains(&index) { index } else { -1 };
            state.queue = queue;
        }
        self.publish_playlist_updated();
        Ok(())
    }

    // --- named playlists ---------------------------------------------------

    /// Store the current queue as a named playlist.
    pub fn save_playlist(&self, id: &str, name: &str) -> Result<()> {
        let playlist = Playlist {
            id: id.to_string(),
            name: name.to_string(),
            tracks: self.queue(),
        };
        self.playlists.save(&playlist)
    }

    /// Replace the queue with a stored playlist. Playback stops and the
    /// cursor deselects.
    pub fn load_playlist(&self, id: &str) -> Result<()> {
        let playlist = self.playlists.load(id)?;
        self.playback.stop()?;
        {
            let mut state = self.state.write();
            state.queue = playlist.tracks;
            state.current = -1;
        }
        self.publish_playlist_updated();
        Ok(())
    }

    /// Every stored playlist.
    pub fn saved_playlists(&self) -> Result<Vec<Playlist>> {
        self.playlists.load_all()
    }

    pub fn delete_playlist(&self, id: &str) -> Result<()> {
        self.playlists.delete(id)
    }

    /// Unsubscribe from `AutoNext` and persist the queue best-effort.
    /// Idempotent.
    pub fn shutdown(&self) {
        if let Some(sub) = self.auto_next_sub.lock().take() {
            self.bus.unsubscribe(sub);
        }
        if let Err(e) = self.persist_queue() {
            tracing::warn!("failed to persist queue during shutdown: {e}");
        }
    }

    /// A track finished naturally at `finished_index`. Advance, or stop
    /// at the end of the queue.
    fn handle_auto_next(&self, finished_index: usize) {
        let next = {
            let mut state = self.state.write();
            // Stale event: the queue moved on since the track finished.
            if state.current != finished_index as i32 {
                tracing::debug!(
                    target: "playlist::auto_next",
                    "ignoring stale auto-next for index {finished_index} (current {})",
                    state.current
                );
                return;
            }
            let next_index = state.current + 1;
            if next_index >= state.queue.len() as i32 {
                None
            } else {
                state.current = next_index;
                Some((state.queue[next_index as usize].clone(), next_index as usize))
            }
            // Queue lock drops here; the playback calls below re-enter
            // the engine and the bus.
        };

        match next {
            None => {
                // End of queue: stop for cleanup, cursor stays put.
                if let Err(e) = self.playback.stop() {
                    tracing::warn!("stop at end of queue failed: {e}");
                }
            }
            Some((track, index)) => {
                if let Err(e) = self
                    .playback
                    .load_track(&track, index)
                    .and_then(|()| self.playback.play())
                {
                    tracing::warn!(
                        "auto-advance to {} failed: {e}",
                        track.file_path.display()
                    );
                }
                self.publish_playlist_updated();
            }
        }
    }

    fn publish_playlist_updated(&self) {
        // The snapshot clones the whole queue; skip it with no listeners.
        if !self.bus.has_subscribers(EventKind::PlaylistUpdated) {
            return;
        }
        let (queue, index) = {
            let state = self.state.read();
            (state.queue.clone(), state.current)
        };
        self.bus
            .publish(EventPayload::PlaylistUpdated { queue, index });
    }
}
