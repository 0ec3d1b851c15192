//! Offline exports for analysis tooling: `fixtures.csv` and `fixtures.parquet`

use std::path::PathBuf;
use tracing::info;

use super::columnar::encode_parquet;
use crate::error::PipelineResult;
use crate::models::FixtureRecord;

pub const CSV_FILE_NAME: &str = "fixtures.csv";
pub const PARQUET_FILE_NAME: &str = "fixtures.parquet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    pub output_dir: PathBuf,
    pub write_parquet: bool,
}

impl ExportOptions {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            write_parquet: true,
        }
    }

    pub fn without_parquet(mut self) -> Self {
        self.write_parquet = false;
        self
    }
}

/// Files written by [`write_exports`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub parquet: Option<PathBuf>,
}

pub fn encode_csv(rows: &[FixtureRecord]) -> PipelineResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    if rows.is_empty() {
        // serde only emits the header alongside the first record
        writer.write_record(CSV_HEADER)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.into_inner().map_err(|e| e.into_error().into())
}

const CSV_HEADER: [&str; 17] = [
    "fixture_id",
    "date",
    "timestamp",
    "venue_id",
    "venue_name",
    "status_short",
    "status_long",
    "league_id",
    "league_name",
    "league_season",
    "league_round",
    "home_team_id",
    "home_team_name",
    "away_team_id",
    "away_team_name",
    "goals_home",
    "goals_away",
];

pub async fn write_exports(
    rows: &[FixtureRecord],
    options: &ExportOptions,
) -> PipelineResult<ExportPaths> {
    tokio::fs::create_dir_all(&options.output_dir).await?;

    let csv_path = options.output_dir.join(CSV_FILE_NAME);
    tokio::fs::write(&csv_path, encode_csv(rows)?).await?;
    info!(path = %csv_path.display(), rows = rows.len(), "Wrote CSV export");

    let parquet = if options.write_parquet {
        let path = options.output_dir.join(PARQUET_FILE_NAME);
        tokio::fs::write(&path, encode_parquet(rows)?).await?;
        info!(path = %path.display(), "Wrote Parquet export");
        Some(path)
    } else {
        None
    };

    Ok(ExportPaths {
        csv: csv_path,
        parquet,
    })
}
