//! Pipeline error types

use matchday_common::MatchdayError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for pipeline operations
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;

/// Errors raised by pipeline stages
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API request to {url} failed with status {status}")]
    Api { status: u16, url: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Columnar format error: {0}")]
    Columnar(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock error: {0}")]
    Lock(String),

    #[error(transparent)]
    Common(#[from] MatchdayError),
}

impl From<arrow::error::ArrowError> for PipelineError {
    fn from(err: arrow::error::ArrowError) -> Self {
        PipelineError::Columnar(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for PipelineError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        PipelineError::Columnar(err.to_string())
    }
}

/// Failure category persisted next to the message on failed runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Network,
    Storage,
    Database,
    Parse,
    Io,
    Lock,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Network => "network",
            ErrorKind::Storage => "storage",
            ErrorKind::Database => "database",
            ErrorKind::Parse => "parse",
            ErrorKind::Io => "io",
            ErrorKind::Lock => "lock",
            ErrorKind::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ErrorKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "configuration" => Ok(ErrorKind::Configuration),
            "network" => Ok(ErrorKind::Network),
            "storage" => Ok(ErrorKind::Storage),
            "database" => Ok(ErrorKind::Database),
            "parse" => Ok(ErrorKind::Parse),
            "io" => Ok(ErrorKind::Io),
            "lock" => Ok(ErrorKind::Lock),
            "internal" => Ok(ErrorKind::Internal),
            other => Err(PipelineError::Parse(format!("unknown error kind '{}'", other))),
        }
    }
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Config(_) => ErrorKind::Configuration,
            PipelineError::Http(_) | PipelineError::Api { .. } => ErrorKind::Network,
            PipelineError::Storage(_) => ErrorKind::Storage,
            PipelineError::Database(_) | PipelineError::Migration(_) => ErrorKind::Database,
            PipelineError::Parse(_)
            | PipelineError::Columnar(_)
            | PipelineError::Csv(_)
            | PipelineError::Serialization(_) => ErrorKind::Parse,
            PipelineError::Io(_) => ErrorKind::Io,
            PipelineError::Lock(_) => ErrorKind::Lock,
            PipelineError::Common(MatchdayError::Config(_)) => ErrorKind::Configuration,
            PipelineError::Common(MatchdayError::InvalidScope(_)) => ErrorKind::Parse,
        }
    }

    /// Configuration and lock failures stop the whole run instead of a single scope
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Lock)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_classification() {
        assert_eq!(
            PipelineError::Config("RAPIDAPI_KEY not set".into()).kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            PipelineError::Api {
                status: 503,
                url: "http://api/fixtures".into()
            }
            .kind(),
            ErrorKind::Network
        );
        assert_eq!(PipelineError::Columnar("bad footer".into()).kind(), ErrorKind::Parse);
        assert_eq!(PipelineError::Lock("denied".into()).kind(), ErrorKind::Lock);
    }

    #[test]
    fn test_shared_errors_keep_their_category() {
        let config: PipelineError = MatchdayError::Config("bad number".into()).into();
        assert_eq!(config.kind(), ErrorKind::Configuration);
        assert!(config.is_fatal());
        assert_eq!(config.to_string(), "Configuration error: bad number");

        let scope: PipelineError = MatchdayError::InvalidScope("39".into()).into();
        assert_eq!(scope.kind(), ErrorKind::Parse);
        assert!(!scope.is_fatal());
    }

    #[test]
    fn test_only_configuration_and_lock_are_fatal() {
        assert!(PipelineError::Config("missing".into()).is_fatal());
        assert!(PipelineError::Lock("permission denied".into()).is_fatal());
        assert!(!PipelineError::Storage("timeout".into()).is_fatal());
        assert!(!PipelineError::Parse("boom".into()).is_fatal());
    }

    #[test]
    fn test_error_kind_round_trips_through_str() {
        for kind in [ErrorKind::Network, ErrorKind::Database, ErrorKind::Internal] {
            assert_eq!(kind.as_str().parse::<ErrorKind>().unwrap(), kind);
        }
        assert!("cosmic_rays".parse::<ErrorKind>().is_err());
    }
}
