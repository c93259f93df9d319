/// Player error types
use thiserror::Error;

/// Result type alias using `PlayerError`
pub type Result<T> = std::result::Result<T, PlayerError>;

/// Errors raised while assembling the player
#[derive(Error, Debug)]
pub enum PlayerError {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// A setting was read but failed validation
    #[error(transparent)]
    InvalidSettings(#[from] tapedeck_core::CoreError),
}
