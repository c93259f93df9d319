mod ids;
mod metadata;
mod repeat;
mod track;

pub use ids::TrackId;
pub use metadata::{AudioProperties, TrackMetadata};
pub use repeat::RepeatMode;
pub use track::{Track, TrackLocator, LOADING_ARTIST};
