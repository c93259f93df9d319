//! Desktop backend for Tapedeck
//!
//! Implements the playback engine's render graph on CPAL and hosts the
//! visualizer tap inside the output callback.
//!
//! # Features
//!
//! - Whole-file decoding with Symphonia, conformed to the device format
//! - Sample-rate conversion with rubato
//! - Gain and stereo balance applied in the callback
//! - Tag and stream property loading with lofty
//!
//! # Example
//!
//! ```no_run
//! use tapedeck_core::PlaybackSettings;
//! use tapedeck_desktop::CpalRenderGraph;
//! use tapedeck_playback::{PlaybackEngine, SystemClock};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let graph = CpalRenderGraph::new()?;
//! let settings = PlaybackSettings::default();
//! let mut engine = PlaybackEngine::new(graph, &settings, Box::new(SystemClock));
//! engine.pump();
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod decode;
mod error;
mod metadata;
mod render_graph;

pub use decode::{decode_file, DecodedAudio};
pub use error::{DesktopError, Result};
pub use metadata::LoftyMetadataLoader;
pub use render_graph::{CpalRenderGraph, OutputFormat};
