/// Core error types for Tapedeck
use thiserror::Error;

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for Tapedeck
#[derive(Error, Debug)]
pub enum CoreError {
    /// A settings value is outside its valid range
    #[error("Invalid setting `{field}`: {reason}")]
    InvalidSetting {
        /// Dotted path of the offending field
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Metadata could not be read
    #[error("Metadata error: {0}")]
    Metadata(String),

    /// I/O errors
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Create an invalid setting error
    pub fn invalid_setting(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }

    /// Create a metadata error
    pub fn metadata(msg: impl Into<String>) -> Self {
        Self::Metadata(msg.into())
    }
}
