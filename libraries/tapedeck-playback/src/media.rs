//! Media kind detection

use serde::{Deserialize, Serialize};
use tapedeck_core::TrackLocator;

/// Extensions handed to an external video player
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mov", "avi", "mkv", "webm", "wmv", "flv", "mpg", "mpeg",
];

/// How a track must be played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    /// Local audio for the sample-accurate scheduler
    Audio,
    /// Local video, played by an external coordinator
    Video,
    /// Network stream, never scheduled sample-accurately
    Stream,
}

impl MediaKind {
    /// Classify a locator
    pub fn detect(locator: &TrackLocator) -> Self {
        match locator {
            TrackLocator::Stream(_) => Self::Stream,
            TrackLocator::LocalFile(path) => {
                let is_video = path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| {
                        VIDEO_EXTENSIONS
                            .iter()
                            .any(|video| video.eq_ignore_ascii_case(ext))
                    });
                if is_video {
                    Self::Video
                } else {
                    Self::Audio
                }
            }
        }
    }
}
