/// Desktop backend errors
use std::path::PathBuf;
use thiserror::Error;

/// Result type for desktop backend operations
pub type Result<T> = std::result::Result<T, DesktopError>;

/// Desktop backend errors
#[derive(Debug, Error)]
pub enum DesktopError {
    /// No output device
    #[error("Audio device not found")]
    DeviceNotFound,

    /// Device query failed
    #[error("Device error: {0}")]
    DeviceError(String),

    /// Failed to build output stream
    #[error("Failed to build output stream: {0}")]
    StreamBuildError(String),

    /// Failed to start stream
    #[error("Failed to play stream: {0}")]
    PlayError(String),

    /// The device or file uses a format that cannot be rendered
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    /// Decoding failed
    #[error("Failed to decode {path}: {reason}")]
    Decode {
        /// File being decoded
        path: PathBuf,
        /// Decoder message
        reason: String,
    },

    /// Sample rate conversion failed
    #[error("Sample rate conversion error: {0}")]
    ResampleError(String),

    /// Tag reading failed
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// The audio thread exited
    #[error("Audio thread unavailable")]
    AudioThreadGone,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DesktopError {
    /// Create a decode error
    pub fn decode(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<cpal::BuildStreamError> for DesktopError {
    fn from(err: cpal::BuildStreamError) -> Self {
        DesktopError::StreamBuildError(err.to_string())
    }
}

impl From<cpal::PlayStreamError> for DesktopError {
    fn from(err: cpal::PlayStreamError) -> Self {
        DesktopError::PlayError(err.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for DesktopError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        DesktopError::DeviceError(err.to_string())
    }
}

impl From<DesktopError> for tapedeck_playback::PlaybackError {
    fn from(err: DesktopError) -> Self {
        match err {
            DesktopError::Decode { path, reason } => Self::load(path, reason),
            other => Self::render(other.to_string()),
        }
    }
}
