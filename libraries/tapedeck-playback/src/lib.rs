//! Tapedeck - Playback Engine
//!
//! Platform-agnostic playback state machine for Tapedeck.
//!
//! This crate provides:
//! - Sample-accurate scheduling against a render graph (`RenderGraph`)
//! - Seek epochs that make stale hardware completions inert (`SeekEpoch`)
//! - Guarded end-of-track handling with completion grace and seek guard
//! - Playlist advance policy (shuffle, Repeat Off/All/One, stream handoff)
//! - Asynchronous metadata resolution (`MetadataTasks`)
//! - An event queue for UI synchronization (`PlaybackEvent`)
//!
//! # Architecture
//!
//! `tapedeck-playback` has no audio backend dependency. The desktop crate
//! implements [`RenderGraph`] on cpal; the `test-utils` feature provides a
//! simulated graph and a manual clock.
//!
//! All engine methods run on one control context. The render graph talks
//! back only through its completion channel, drained by
//! [`PlaybackEngine::pump`] together with metadata results and the engine's
//! timers.
//!
//! # Example
//!
//! ```rust
//! use tapedeck_core::PlaybackSettings;
//! use tapedeck_playback::test_utils::{ManualClock, MockRenderGraph};
//! use tapedeck_playback::{PlaybackEngine, PlaybackState};
//!
//! let graph = MockRenderGraph::new().with_file("/music/a.wav", 44_100, 441_000);
//! let mut engine = PlaybackEngine::new(
//!     graph,
//!     &PlaybackSettings::default(),
//!     Box::new(ManualClock::new()),
//! );
//! # use tapedeck_core::{Track, TrackLocator};
//! let track = Track::new(TrackLocator::LocalFile("/music/a.wav".into()), "A", "", 10.0);
//! engine.play_track(track).unwrap();
//! assert_eq!(engine.playback_state(), PlaybackState::Playing);
//! assert!((engine.duration() - 10.0).abs() < 1e-9);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod clock;
mod engine;
mod epoch;
mod error;
mod events;
mod media;
mod metadata;
mod playlist;
mod render;
mod state;
mod timer;

#[cfg(feature = "test-utils")]
pub mod test_utils;

// Public exports
pub use clock::{Clock, SystemClock};
pub use engine::PlaybackEngine;
pub use epoch::{EpochSource, SeekEpoch};
pub use error::{PlaybackError, Result};
pub use events::PlaybackEvent;
pub use media::MediaKind;
pub use metadata::{MetadataLoader, MetadataOutcome, MetadataTasks};
pub use playlist::{AdvanceAction, Playlist};
pub use render::{AudioFileInfo, Completion, RenderGraph};
pub use state::{PlaybackState, StopReason};
pub use timer::TaggedTimers;
