//! Playback Events
//!
//! The engine queues events as it changes state; the UI collaborator drains
//! them with [`crate::PlaybackEngine::drain_events`] on each tick.

use crate::media::MediaKind;
use crate::state::PlaybackState;
use serde::{Deserialize, Serialize};
use tapedeck_core::{Track, TrackId};

/// Events emitted by the playback engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlaybackEvent {
    /// State changed (only on an actual transition)
    StateChanged {
        /// The new state
        state: PlaybackState,
    },

    /// A different track became current
    TrackChanged {
        /// ID of the new track
        track_id: TrackId,
        /// ID of the track it replaced
        previous_track_id: Option<TrackId>,
    },

    /// Periodic position report
    Progress {
        /// Position in seconds
        current_time: f64,
        /// File length in seconds
        duration: f64,
        /// Position as a fraction of the file length
        progress: f64,
    },

    /// A completion was accepted for this track
    PlaybackEnded {
        /// ID of the finished track
        track_id: TrackId,
    },

    /// A track must be played by an external coordinator
    HandOffToExternalPlayer {
        /// The track to hand off
        track: Track,
        /// Why it cannot be scheduled here
        kind: MediaKind,
    },

    /// A track failed to open; playback stays stopped on it
    LoadFailed {
        /// ID of the failed track
        track_id: TrackId,
        /// Error message
        reason: String,
    },

    /// Asynchronous metadata was applied to a track
    MetadataResolved {
        /// ID of the updated track
        track_id: TrackId,
    },

    /// Sequential playback ran past the last track
    PlaylistEnded,
}
