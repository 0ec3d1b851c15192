//! Shared domain types
//!
//! The pipeline addresses everything by a `(league, season)` pair. Object-store
//! keys derived from it are part of the external contract and must not change:
//! dashboards and older rebuilds read the same layout.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::MatchdayError;

/// Prefix for raw API responses
pub const RAW_PREFIX: &str = "raw";

/// Prefix for processed (columnar) fixture snapshots
pub const PROCESSED_PREFIX: &str = "processed";

/// Prefix for team crest images
pub const CRESTS_PREFIX: &str = "crests";

/// One unit of pipeline work: an API league id and a season year
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ScopeKey {
    pub league_id: i32,
    pub season_year: i32,
}

impl ScopeKey {
    pub fn new(league_id: i32, season_year: i32) -> Self {
        Self {
            league_id,
            season_year,
        }
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "league={} season={}", self.league_id, self.season_year)
    }
}

/// Parses `"<league>:<season>"`, e.g. `"39:2025"`
impl FromStr for ScopeKey {
    type Err = MatchdayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (league, season) = s
            .split_once(':')
            .ok_or_else(|| MatchdayError::InvalidScope(format!("expected LEAGUE:SEASON, got '{}'", s)))?;

        let league_id = league
            .trim()
            .parse()
            .map_err(|_| MatchdayError::InvalidScope(format!("invalid league id '{}'", league)))?;
        let season_year = season
            .trim()
            .parse()
            .map_err(|_| MatchdayError::InvalidScope(format!("invalid season year '{}'", season)))?;

        Ok(Self::new(league_id, season_year))
    }
}

/// Deterministic object-store key
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactKey(String);

impl ArtifactKey {
    /// `raw/league_{league}_season_{season}.json`
    pub fn raw(scope: ScopeKey) -> Self {
        Self(format!(
            "{}/league_{}_season_{}.json",
            RAW_PREFIX, scope.league_id, scope.season_year
        ))
    }

    /// `processed/league_{league}_season_{season}.parquet`
    pub fn processed(scope: ScopeKey) -> Self {
        Self(format!(
            "{}/league_{}_season_{}.parquet",
            PROCESSED_PREFIX, scope.league_id, scope.season_year
        ))
    }

    /// `crests/team_{team_id}.png`
    pub fn crest(team_id: i64) -> Self {
        Self(format!("{}/team_{}.png", CRESTS_PREFIX, team_id))
    }

    /// Wrap an explicit key (rebuild overrides, tests)
    pub fn custom(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_keys_match_storage_layout() {
        let scope = ScopeKey::new(39, 2025);
        assert_eq!(ArtifactKey::raw(scope).as_str(), "raw/league_39_season_2025.json");
        assert_eq!(
            ArtifactKey::processed(scope).as_str(),
            "processed/league_39_season_2025.parquet"
        );
        assert_eq!(ArtifactKey::crest(42).as_str(), "crests/team_42.png");
    }

    #[test]
    fn test_scope_key_from_str() {
        let scope: ScopeKey = "140:2024".parse().unwrap();
        assert_eq!(scope, ScopeKey::new(140, 2024));

        assert!("140".parse::<ScopeKey>().is_err());
        assert!("abc:2024".parse::<ScopeKey>().is_err());
        assert!("140:".parse::<ScopeKey>().is_err());
    }

    #[test]
    fn test_scope_key_display() {
        assert_eq!(ScopeKey::new(39, 2025).to_string(), "league=39 season=2025");
    }
}
