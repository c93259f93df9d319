//! Playback state

use serde::{Deserialize, Serialize};

/// Why playback stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// User or caller requested the stop
    Manual,
    /// The track played to its end
    Completed,
    /// The playlist was ejected
    Ejected,
}

/// Engine state
///
/// `Stopped` always precedes either a new `Preparing` or idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackState {
    /// Nothing loaded
    #[default]
    Idle,
    /// Loading and scheduling a track
    Preparing,
    /// Audio is rendering
    Playing,
    /// Scheduled but paused
    Paused,
    /// Stopped for the given reason
    Stopped(StopReason),
}

impl PlaybackState {
    /// Whether completions must be ignored in this state
    pub fn is_intentionally_stopped(self) -> bool {
        matches!(
            self,
            Self::Stopped(StopReason::Manual | StopReason::Ejected)
        )
    }
}
