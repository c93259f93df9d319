/// Metadata records produced by the asynchronous metadata loader
use serde::{Deserialize, Serialize};

/// Display metadata for a track
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    /// Track title
    pub title: String,

    /// Artist name
    pub artist: String,

    /// Duration in seconds (0 when the container does not say)
    pub duration_secs: f64,
}

/// Technical properties of the audio stream inside a file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioProperties {
    /// Number of channels
    pub channel_count: u16,

    /// Average bitrate in kbit/s (0 when unknown)
    pub bitrate_kbps: u32,

    /// Sample rate in Hz
    pub sample_rate_hz: u32,
}
