//! Library service: recursive, cancellable discovery of audio files.
//!
//! Walks a folder tree (or a flat file list), filters by extension,
//! probes each admitted file through the engine's metadata call, and
//! reports progress on the bus. At most one scan runs at a time; the
//! cancellation token is checked at every walk entry, so a cancel lands
//! within one file-processing iteration.
//!
//! The scan call blocks until the walk finishes; callers that need it off
//! their thread (the presenter does) run it on a worker.

pub mod formats;

use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::bus::EventBus;
use crate::engine::AudioEngine;
use crate::error::{Error, Result};
use crate::events::EventPayload;
use crate::model::{ScanProgress, Track};

/// Scans folders and files into [`Track`]s.
pub struct LibraryService {
    engine: Arc<dyn AudioEngine>,
    bus: Arc<EventBus>,
    scanning: AtomicBool,
    cancel: Mutex<Option<Arc<AtomicBool>>>,
}

/// Clears the scanning flag and token on every scan exit path.
struct ScanGuard<'a>(&'a LibraryService);

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        *self.0.cancel.lock() = None;
        self.0.scanning.store(false, Ordering::SeqCst);
    }
}

impl LibraryService {
    pub fn new(engine: Arc<dyn AudioEngine>, bus: Arc<EventBus>) -> Arc<Self> {
        Arc::new(Self {
            engine,
            bus,
            scanning: AtomicBool::new(false),
            cancel: Mutex::new(None),
        })
    }

    /// Recursively scan `root` for supported audio files.
    ///
    /// Blocks until the walk finishes. Publishes `ScanStarted`, one
    /// `ScanProgress` per admitted file, and `ScanCompleted`, or
    /// `ScanCancelled` when the token trips, in which case the returned
    /// error carries the tracks found so far. Files whose metadata probe
    /// fails are skipped with a warning; one bad file never aborts the
    /// scan.
    pub fn scan_folder(&self, root: &Path) -> Result<Vec<Track>> {
        let token = self.begin_scan()?;
        let _guard = ScanGuard(self);

        self.bus.publish(EventPayload::ScanStarted {
            root: root.to_path_buf(),
        });
        tracing::info!("scanning {}", root.display());

        let mut tracks = Vec::new();
        let mut files_scanned = 0usize;
        for entry in WalkDir::new(root) {
            if token.load(Ordering::SeqCst) {
                return self.cancelled(tracks);
            }
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::debug!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            files_scanned += 1;
            self.process_file(entry.path(), files_scanned, None, &mut tracks);
        }

        tracing::info!(
            "scan of {} found {} track(s) in {} file(s)",
            root.display(),
            tracks.len(),
            files_scanned
        );
        self.bus.publish(EventPayload::ScanCompleted {
            tracks: tracks.clone(),
        });
        Ok(tracks)
    }

    /// Run the scan pipeline over an explicit file list (no walk), e.g.
    /// a multi-file open dialog. The total is known up front, so
    /// progress percentages are defined.
    pub fn scan_files(&self, paths: &[PathBuf]) -> Result<Vec<Track>> {
        let token = self.begin_scan()?;
        let _guard = ScanGuard(self);

        let mut tracks = Vec::new();
        for (i, path) in paths.iter().enumerate() {
            if token.load(Ordering::SeqCst) {
                return self.cancelled(tracks);
            }
            self.process_file(path, i + 1, Some(paths.len()), &mut tracks);
        }

        self.bus.publish(EventPayload::ScanCompleted {
            tracks: tracks.clone(),
        });
        Ok(tracks)
    }

    /// Trip the cancellation token of the running scan.
    pub fn cancel_scan(&self) -> Result<()> {
        let token = self.cancel.lock().clone();
        match token {
            Some(token) if self.scanning.load(Ordering::SeqCst) => {
                token.store(true, Ordering::SeqCst);
                Ok(())
            }
            _ => Err(Error::NoScanInProgress),
        }
    }

    /// True between `ScanStarted` and the terminal scan event.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// True when the file's extension is in the supported set,
    /// case-insensitively.
    pub fn is_format_supported(&self, path: &Path) -> bool {
        formats::is_supported_file(path)
    }

    /// Probe a single file through the engine, checking support and
    /// existence first.
    pub fn extract_metadata(&self, path: &Path) -> Result<Track> {
        if !formats::is_supported_file(path) {
            return Err(Error::service(
                "library",
                "extract_metadata",
                format!("unsupported format: {}", path.display()),
            ));
        }
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        self.engine.metadata(path)
    }

    /// Cancel any running scan. Idempotent.
    pub fn shutdown(&self) {
        if self.cancel_scan().is_ok() {
            tracing::debug!("cancelled running scan during shutdown");
        }
    }

    /// Acquire the single-scan flag and install a fresh token.
    fn begin_scan(&self) -> Result<Arc<AtomicBool>> {
        if self
            .scanning
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(Error::ScanInProgress);
        }
        let token = Arc::new(AtomicBool::new(false));
        *self.cancel.lock() = Some(Arc::clone(&token));
        Ok(token)
    }

    fn process_file(
        &self,
        path: &Path,
        files_scanned: usize,
        total_files: Option<usize>,
        tracks: &mut Vec<Track>,
    ) {
        if !formats::is_supported_file(path) {
            return;
        }
        match self.engine.metadata(path) {
            Ok(track) => {
                tracks.push(track);
                self.bus.publish(EventPayload::ScanProgress {
                    progress: ScanProgress {
                        current_file: path.to_path_buf(),
                        files_scanned,
                        total_files,
                        tracks_found: tracks.len(),
                    },
                });
            }
            Err(e) => {
                tracing::warn!("skipping {}: {e}", path.display());
            }
        }
    }

    fn cancelled(&self, tracks: Vec<Track>) -> Result<Vec<Track>> {
        let reason = "user cancelled";
        tracing::info!("scan cancelled with {} track(s) found", tracks.len());
        self.bus.publish(EventPayload::ScanCancelled {
            reason: reason.to_string(),
        });
        Err(Error::scan_cancelled(reason, tracks))
    }
}
