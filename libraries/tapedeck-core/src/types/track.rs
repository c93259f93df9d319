/// Track domain type
use super::{TrackId, TrackMetadata};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Artist shown for a track whose metadata has not resolved yet
pub const LOADING_ARTIST: &str = "Loading…";

/// Where a track's audio comes from
///
/// Local files go through the sample-accurate scheduler; streams never do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "location", rename_all = "snake_case")]
pub enum TrackLocator {
    /// File on local disk
    LocalFile(PathBuf),

    /// Network stream URL
    Stream(String),
}

impl TrackLocator {
    /// Local path, if this is a local file
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            Self::LocalFile(path) => Some(path),
            Self::Stream(_) => None,
        }
    }

    /// Whether this locator is a network stream
    pub fn is_stream(&self) -> bool {
        matches!(self, Self::Stream(_))
    }

    /// A display title derived from the locator (file stem or URL)
    pub fn display_name(&self) -> String {
        match self {
            Self::LocalFile(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Stream(url) => url.clone(),
        }
    }
}

/// Playlist entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique track identifier
    pub id: TrackId,

    /// Source of the audio
    pub locator: TrackLocator,

    /// Display title
    pub title: String,

    /// Display artist
    pub artist: String,

    /// Duration in seconds, 0 until known
    pub duration_secs: f64,

    metadata_resolved: bool,
}

impl Track {
    /// Create a track with known metadata
    pub fn new(
        locator: TrackLocator,
        title: impl Into<String>,
        artist: impl Into<String>,
        duration_secs: f64,
    ) -> Self {
        Self {
            id: TrackId::generate(),
            locator,
            title: title.into(),
            artist: artist.into(),
            duration_secs,
            metadata_resolved: true,
        }
    }

    /// Create a placeholder shown while metadata loads
    pub fn placeholder(locator: TrackLocator) -> Self {
        Self {
            id: TrackId::generate(),
            title: locator.display_name(),
            locator,
            artist: LOADING_ARTIST.to_string(),
            duration_secs: 0.0,
            metadata_resolved: false,
        }
    }

    /// Apply resolved metadata
    ///
    /// Only the first call has an effect; later results are ignored so a slow
    /// loader cannot overwrite an explicit edit. Returns whether it applied.
    pub fn apply_metadata(&mut self, metadata: &TrackMetadata) -> bool {
        if self.metadata_resolved {
            return false;
        }
        if !metadata.title.is_empty() {
            self.title.clone_from(&metadata.title);
        }
        self.artist.clone_from(&metadata.artist);
        self.duration_secs = metadata.duration_secs.max(0.0);
        self.metadata_resolved = true;
        true
    }

    /// Whether metadata has been resolved
    pub fn is_metadata_resolved(&self) -> bool {
        self.metadata_resolved
    }

    /// Whether this track plays from a local file
    pub fn is_local(&self) -> bool {
        matches!(self.locator, TrackLocator::LocalFile(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(path: &str) -> TrackLocator {
        TrackLocator::LocalFile(PathBuf::from(path))
    }

    #[test]
    fn placeholder_uses_file_stem_and_loading_artist() {
        let track = Track::placeholder(local("/music/Intro.mp3"));
        assert_eq!(track.title, "Intro");
        assert_eq!(track.artist, LOADING_ARTIST);
        assert_eq!(track.duration_secs, 0.0);
        assert!(!track.is_metadata_resolved());
    }

    #[test]
    fn metadata_applies_once() {
        let mut track = Track::placeholder(local("/music/a.flac"));
        let first = TrackMetadata {
            title: "Real Title".into(),
            artist: "Real Artist".into(),
            duration_secs: 212.5,
        };
        assert!(track.apply_metadata(&first));
        assert_eq!(track.title, "Real Title");
        assert_eq!(track.duration_secs, 212.5);

        let late = TrackMetadata {
            title: "Stale".into(),
            artist: "Stale".into(),
            duration_secs: 1.0,
        };
        assert!(!track.apply_metadata(&late));
        assert_eq!(track.artist, "Real Artist");
    }

    #[test]
    fn empty_title_keeps_placeholder_title() {
        let mut track = Track::placeholder(local("/music/untagged.wav"));
        track.apply_metadata(&TrackMetadata {
            title: String::new(),
            artist: "Someone".into(),
            duration_secs: 3.0,
        });
        assert_eq!(track.title, "untagged");
    }

    #[test]
    fn stream_locator_is_not_local() {
        let track = Track::placeholder(TrackLocator::Stream("http://radio.example/live".into()));
        assert!(!track.is_local());
        assert!(track.locator.is_stream());
        assert!(track.locator.local_path().is_none());
    }
}
