//! Unified error types for the HTS ecosystem
//!
//! This module provides a common error type [`HtsError`] that can represent
//! errors from any part of the system. Domain-specific error types can be
//! converted to `HtsError` for uniform error handling at API boundaries.
//!
//! # Example
//!
//! ```ignore
//! use hts_core::{HtsError, HtsResult};
//!
//! fn run_study(path: &str) -> HtsResult<()> {
//!     let study = read_study(path)?;
//!     dispatch(&study)?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all HTS operations.
///
/// Fatal error kinds carry enough context (stage, node, iteration) in their
/// message to locate the originating subproblem.
#[derive(Error, Debug)]
pub enum HtsError {
    /// I/O errors (file access, directory creation, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Study input validation errors
    #[error("Input error: {0}")]
    Input(String),

    /// Scenario sampling errors (e.g. trajectory draw exhaustion)
    #[error("Sampling error: {0}")]
    Sampling(String),

    /// Non-optimal LP outcome during an engine pass
    #[error("Solver error: {0}")]
    Solver(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

/// Convenience type alias for Results using HtsError.
pub type HtsResult<T> = Result<T, HtsError>;

// Conversion from anyhow::Error
impl From<anyhow::Error> for HtsError {
    fn from(err: anyhow::Error) -> Self {
        HtsError::Other(err.to_string())
    }
}

// Conversion from string-like types for convenience
impl From<String> for HtsError {
    fn from(s: String) -> Self {
        HtsError::Other(s)
    }
}

impl From<&str> for HtsError {
    fn from(s: &str) -> Self {
        HtsError::Other(s.to_string())
    }
}

// JSON parsing errors
impl From<serde_json::Error> for HtsError {
    fn from(err: serde_json::Error) -> Self {
        HtsError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HtsError::Solver("stage 3, node 5: infeasible".into());
        assert!(err.to_string().contains("Solver error"));
        assert!(err.to_string().contains("stage 3"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let hts_err: HtsError = io_err.into();
        assert!(matches!(hts_err, HtsError::Io(_)));
    }

    #[test]
    fn test_question_mark_operator() {
        fn inner() -> HtsResult<()> {
            Err(HtsError::Input("bad demand vector".into()))
        }

        fn outer() -> HtsResult<()> {
            inner()?;
            Ok(())
        }

        assert!(outer().is_err());
    }
}
