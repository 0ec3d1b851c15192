//! Matchday Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging bootstrap, and error handling for the Matchday workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`MatchdayError`] and the [`Result`] alias
//! - **Environment**: typed `env` lookups that reject malformed values
//! - **Logging**: `tracing` subscriber setup driven by `MATCHDAY_LOG_*` variables
//! - **Types**: the `(league, season)` scope key and the object-store key layout
//!
//! # Example
//!
//! ```
//! use matchday_common::types::{ArtifactKey, ScopeKey};
//!
//! let scope = ScopeKey::new(39, 2025);
//! assert_eq!(
//!     ArtifactKey::raw(scope).as_str(),
//!     "raw/league_39_season_2025.json"
//! );
//! ```

pub mod env;
pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{MatchdayError, Result};
pub use types::{ArtifactKey, ScopeKey};
