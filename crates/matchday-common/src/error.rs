//! Error types shared across Matchday crates

use thiserror::Error;

/// Result type alias for shared Matchday operations
pub type Result<T> = std::result::Result<T, MatchdayError>;

/// Errors raised by shared helpers (environment parsing, key parsing)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchdayError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid scope: {0}")]
    InvalidScope(String),
}
