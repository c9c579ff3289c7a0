use thiserror::Error;

/// Type alias for Result with SweepError
pub type Result<T> = std::result::Result<T, SweepError>;

/// Error types for the channel sweep engine
#[derive(Error, Debug)]
pub enum SweepError {
    /// Malformed or contradictory run parameters, caught before any
    /// platform call is made
    #[error("invalid parameters: {0}")]
    Validation(String),

    /// Range bounds that contradict each other (after newer than before)
    #[error("invalid range: {0}")]
    InvalidRange(String),

    /// A page fetch failed mid-traversal. Fatal to the current run,
    /// never retried.
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Platform API returned an error for a non-fetch call
    #[error("platform API error: {0}")]
    Api(String),

    /// The caller or the automation itself lacks a required platform
    /// permission
    #[error("missing permission: {0}")]
    Permission(String),

    /// Persisted document could not be read or written
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SweepError {
    /// Whether this error is a caller mistake, reported at the boundary
    /// and never logged as a system fault
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            SweepError::Validation(_) | SweepError::InvalidRange(_) | SweepError::Permission(_)
        )
    }

    /// Whether this error aborts an in-flight traversal run
    pub fn is_fatal_to_run(&self) -> bool {
        !self.is_validation()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_errors() {
        let invalid = SweepError::Validation("missing user".to_string());
        assert!(invalid.is_validation());
        assert!(!invalid.is_fatal_to_run());

        let range = SweepError::InvalidRange("after cant be after before".to_string());
        assert!(range.is_validation());

        let permission = SweepError::Permission("Manage Messages".to_string());
        assert!(permission.is_validation());
    }

    #[test]
    fn test_fatal_errors() {
        let fetch = SweepError::Fetch("HTTP 500".to_string());
        assert!(fetch.is_fatal_to_run());
        assert!(!fetch.is_validation());

        let storage = SweepError::Storage("analytics.json".to_string());
        assert!(storage.is_fatal_to_run());
    }

    #[test]
    fn test_error_display() {
        let error = SweepError::InvalidRange("after cant be after before".to_string());
        let display = format!("{}", error);
        assert!(display.contains("invalid range"));
        assert!(display.contains("after cant be after before"));

        let fetch = SweepError::Fetch("connection reset".to_string());
        assert!(format!("{}", fetch).contains("fetch failed"));
    }
}
