//! Error types for playback management

use std::path::PathBuf;
use tapedeck_core::TrackId;
use thiserror::Error;

/// Playback errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No file is loaded into the render graph
    #[error("No track loaded")]
    NoTrackLoaded,

    /// A stream locator reached the sample-accurate scheduler
    #[error("Track {0} is a stream and cannot be scheduled sample-accurately")]
    StreamNotSchedulable(TrackId),

    /// Track id not present in the playlist
    #[error("Track not found: {0}")]
    TrackNotFound(TrackId),

    /// File could not be opened or decoded
    #[error("Failed to load {path}: {reason}")]
    Load {
        /// File that failed
        path: PathBuf,
        /// Decoder or I/O message
        reason: String,
    },

    /// Render graph rejected an operation
    #[error("Render graph error: {0}")]
    Render(String),

    /// Metadata loader failure
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    /// Create a load error
    pub fn load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a render graph error
    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }
}

impl From<tapedeck_core::CoreError> for PlaybackError {
    fn from(err: tapedeck_core::CoreError) -> Self {
        Self::Metadata(err.to_string())
    }
}

/// Result type for playback operations
pub type Result<T> = std::result::Result<T, PlaybackError>;
