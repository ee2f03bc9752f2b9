//! tonearm - the concurrent core of a desktop audio player.
//!
//! This crate owns everything of architectural interest in the player:
//! the playback state machine and its opaque backend handle, the queue
//! and its auto-advance policy, the cancellable library scanner, the
//! preference cache, and the synchronous event bus that fans every state
//! change out to its observers.
//!
//! It owns none of the edges. The audio backend, the widget toolkit, and
//! the persistence stores are consumed through ports:
//!
//! - [`engine::AudioEngine`] - decoding, device output, tag probing
//! - [`presenter::View`] - the widget layer the presenter drives
//! - [`repository`] - playlist, queue-history, and preference stores
//!   (file-backed defaults in [`storage`])
//!
//! # Architecture
//!
//! ```text
//! gesture ──> Presenter ──> Service ──> AudioEngine (side effect)
//!                ^             │
//!                │             v
//!                └───────── EventBus <── progress ticker / scan worker
//! ```
//!
//! Services never call each other sideways; everything cross-service
//! rides the bus. The playback progress ticker detects natural track
//! completion and publishes `AutoNext`; the playlist subscribes and
//! advances through the public playback API.
//!
//! [`app::App`] wires the whole core together for embedders.

pub mod app;
pub mod bus;
pub mod engine;
pub mod error;
pub mod events;
pub mod library;
pub mod logging;
pub mod model;
pub mod playback;
pub mod playlist;
pub mod prefs;
pub mod presenter;
pub mod repository;
pub mod storage;
#[cfg(test)]
pub mod test_utils;

pub use error::{Error, Result};
