/// Tag and stream property loading using lofty
use lofty::{Accessor, AudioFile, Probe, TaggedFileExt};
use std::path::Path;
use tapedeck_core::{AudioProperties, TrackMetadata};
use tapedeck_playback::{MetadataLoader, PlaybackError, Result};

/// Metadata loader backed by lofty
#[derive(Debug, Default, Clone, Copy)]
pub struct LoftyMetadataLoader;

impl LoftyMetadataLoader {
    /// Create a loader
    pub fn new() -> Self {
        Self
    }
}

impl MetadataLoader for LoftyMetadataLoader {
    fn load(&self, path: &Path) -> Result<(TrackMetadata, AudioProperties)> {
        let tagged_file = Probe::open(path)
            .map_err(|e| PlaybackError::Metadata(format!("Failed to open file: {}", e)))?
            .read()
            .map_err(|e| PlaybackError::Metadata(format!("Failed to read file: {}", e)))?;

        let tag = tagged_file.primary_tag().or(tagged_file.first_tag());
        let properties = tagged_file.properties();

        let metadata = TrackMetadata {
            title: tag
                .and_then(|t| t.title().map(|s| s.to_string()))
                .unwrap_or_default(),
            artist: tag
                .and_then(|t| t.artist().map(|s| s.to_string()))
                .unwrap_or_default(),
            duration_secs: properties.duration().as_secs_f64(),
        };

        let audio = AudioProperties {
            channel_count: properties.channels().map(u16::from).unwrap_or(0),
            bitrate_kbps: properties.audio_bitrate().unwrap_or(0),
            sample_rate_hz: properties.sample_rate().unwrap_or(0),
        };

        Ok((metadata, audio))
    }
}
