/// Turning command-line arguments into playlist entries
use std::path::PathBuf;
use tapedeck_core::{Track, TrackLocator};

/// Classify an argument as a stream URL or a local file
pub fn locator_for(arg: &str) -> TrackLocator {
    let lower = arg.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        TrackLocator::Stream(arg.to_string())
    } else {
        TrackLocator::LocalFile(PathBuf::from(arg))
    }
}

/// Placeholder tracks for every argument, in order
pub fn placeholders<'a>(args: impl IntoIterator<Item = &'a str>) -> Vec<Track> {
    args.into_iter()
        .map(|arg| Track::placeholder(locator_for(arg)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_become_streams() {
        assert!(locator_for("https://radio.example/live").is_stream());
        assert!(locator_for("HTTP://radio.example/live").is_stream());
    }

    #[test]
    fn everything_else_is_a_local_file() {
        let locator = locator_for("music/song.flac");
        assert_eq!(
            locator.local_path(),
            Some(std::path::Path::new("music/song.flac"))
        );
    }

    #[test]
    fn placeholders_keep_order_and_are_unresolved() {
        let tracks = placeholders(["a.wav", "b.wav"]);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks[0].locator, locator_for("a.wav"));
        assert!(tracks.iter().all(|t| !t.is_metadata_resolved()));
    }
}
