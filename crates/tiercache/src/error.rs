//! Error types for tiercache

use thiserror::Error;

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for cache operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    /// A keyed operation was handed a key with no usable identity
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The configuration asks for something the engine does not support
    #[error("Unsupported configuration: {0}")]
    Unsupported(String),
}

impl Error {
    pub(crate) fn invalid_key(op: &str) -> Self {
        Error::InvalidArgument(format!("{op} called with a key that has no identity"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_key("pin");
        assert_eq!(
            err.to_string(),
            "Invalid argument: pin called with a key that has no identity"
        );

        let err = Error::Unsupported("concurrency_hint must be positive".into());
        assert!(err.to_string().starts_with("Unsupported configuration"));
    }
}
