//! Tapedeck Core
//!
//! Platform-agnostic types, settings and error handling shared by the
//! visualizer, playback and desktop crates.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Track`, `TrackId`, `TrackLocator`, metadata records
//! - **Settings**: `PlayerSettings`, an explicitly constructed configuration
//!   object owned by the application root and lent to components
//! - **Error Handling**: `CoreError` and `Result`
//!
//! # Example
//!
//! ```rust
//! use tapedeck_core::{PlayerSettings, Track, TrackLocator};
//! use std::path::PathBuf;
//!
//! let settings = PlayerSettings::default();
//! assert!(settings.validate().is_ok());
//!
//! let track = Track::placeholder(TrackLocator::LocalFile(PathBuf::from("/music/song.flac")));
//! assert_eq!(track.duration_secs, 0.0);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod settings;
pub mod types;

pub use error::{CoreError, Result};
pub use settings::{PlaybackSettings, PlayerSettings, VisualizerSettings};
pub use types::{AudioProperties, RepeatMode, Track, TrackId, TrackLocator, TrackMetadata};
