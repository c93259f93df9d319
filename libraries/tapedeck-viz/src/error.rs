//! Error types for the visualizer

use thiserror::Error;

/// Visualizer errors
///
/// Only construction can fail; the real-time paths report lossy conditions
/// through counters instead.
#[derive(Debug, Error)]
pub enum VizError {
    /// Settings rejected by validation
    #[error("Invalid visualizer settings: {0}")]
    Settings(#[from] tapedeck_core::CoreError),
}

/// Result type for visualizer construction
pub type Result<T> = std::result::Result<T, VizError>;
