//! Error types for the dispatch pipeline

use std::time::Duration;
use thiserror::Error;

/// Main error type for all dispatch operations
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Malformed PDF document {file_name}: {reason}")]
    PdfMalformed { file_name: String, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Destination unavailable: {0}")]
    Unavailable(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Report parsing failed: {0}")]
    ReportParse(String),

    #[error("Could not extract letter id: {0}")]
    IdExtraction(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

impl DispatchError {
    /// Transient failures that may succeed on another attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unavailable(_) | Self::Transfer(_) | Self::Timeout(_) | Self::Io(_) | Self::Http(_)
        )
    }
}

/// Result type for dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_errors_are_retryable() {
        assert!(DispatchError::Unavailable("down".to_string()).is_retryable());
        assert!(DispatchError::Timeout(Duration::from_secs(5)).is_retryable());
        assert!(DispatchError::Io(std::io::Error::other("broken pipe")).is_retryable());
    }

    #[test]
    fn test_validation_errors_are_not_retryable() {
        let err = DispatchError::PdfMalformed {
            file_name: "a.pdf".to_string(),
            reason: "missing header".to_string(),
        };
        assert!(!err.is_retryable());
        assert!(!DispatchError::Validation("no documents".to_string()).is_retryable());
        assert!(!DispatchError::IdExtraction("x".to_string()).is_retryable());
    }
}
