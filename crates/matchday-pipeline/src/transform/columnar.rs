//! Parquet encoding of fixture tables
//!
//! Identifiers and scores are `Int64`, text columns `Utf8`, and the kickoff
//! date `Timestamp(Microsecond, "UTC")`. Every column is nullable.

use arrow::array::{Array, ArrayRef, Int64Array, StringArray, TimestampMicrosecondArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef, TimeUnit};
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use chrono::DateTime;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use std::sync::Arc;

use crate::error::{PipelineError, PipelineResult};
use crate::models::{FixtureRecord, FixtureTable};

pub const UTC: &str = "UTC";

pub fn fixture_schema() -> SchemaRef {
    let int = |name: &str| Field::new(name, DataType::Int64, true);
    let text = |name: &str| Field::new(name, DataType::Utf8, true);

    Arc::new(Schema::new(vec![
        int("fixture_id"),
        Field::new(
            "date",
            DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into())),
            true,
        ),
        int("timestamp"),
        int("venue_id"),
        text("venue_name"),
        text("status_short"),
        text("status_long"),
        int("league_id"),
        text("league_name"),
        int("league_season"),
        text("league_round"),
        int("home_team_id"),
        text("home_team_name"),
        int("away_team_id"),
        text("away_team_name"),
        int("goals_home"),
        int("goals_away"),
    ]))
}

fn ints(rows: &[FixtureRecord], f: impl Fn(&FixtureRecord) -> Option<i64>) -> ArrayRef {
    Arc::new(rows.iter().map(f).collect::<Int64Array>())
}

fn texts(rows: &[FixtureRecord], f: impl Fn(&FixtureRecord) -> Option<&str>) -> ArrayRef {
    Arc::new(rows.iter().map(f).collect::<StringArray>())
}

pub fn to_record_batch(rows: &[FixtureRecord]) -> PipelineResult<RecordBatch> {
    let dates = rows
        .iter()
        .map(|r| r.date.map(|d| d.timestamp_micros()))
        .collect::<TimestampMicrosecondArray>()
        .with_timezone(UTC);

    let columns: Vec<ArrayRef> = vec![
        ints(rows, |r| r.fixture_id),
        Arc::new(dates),
        ints(rows, |r| r.timestamp),
        ints(rows, |r| r.venue_id),
        texts(rows, |r| r.venue_name.as_deref()),
        texts(rows, |r| r.status_short.as_deref()),
        texts(rows, |r| r.status_long.as_deref()),
        ints(rows, |r| r.league_id),
        texts(rows, |r| r.league_name.as_deref()),
        ints(rows, |r| r.league_season),
        texts(rows, |r| r.league_round.as_deref()),
        ints(rows, |r| r.home_team_id),
        texts(rows, |r| r.home_team_name.as_deref()),
        ints(rows, |r| r.away_team_id),
        texts(rows, |r| r.away_team_name.as_deref()),
        ints(rows, |r| r.goals_home),
        ints(rows, |r| r.goals_away),
    ];

    Ok(RecordBatch::try_new(fixture_schema(), columns)?)
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("matchday-pipeline".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

/// Serialize a table to an in-memory Parquet file
pub fn encode_parquet(rows: &[FixtureRecord]) -> PipelineResult<Vec<u8>> {
    let batch = to_record_batch(rows)?;
    let mut buffer = Vec::new();

    let mut writer = ArrowWriter::try_new(&mut buffer, fixture_schema(), Some(writer_properties()))?;
    writer.write(&batch)?;
    writer.close()?;

    Ok(buffer)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> PipelineResult<&'a T> {
    batch
        .column_by_name(name)
        .ok_or_else(|| PipelineError::Columnar(format!("missing column '{}'", name)))?
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| PipelineError::Columnar(format!("unexpected type for column '{}'", name)))
}

fn int_at(array: &Int64Array, i: usize) -> Option<i64> {
    array.is_valid(i).then(|| array.value(i))
}

fn text_at(array: &StringArray, i: usize) -> Option<String> {
    array.is_valid(i).then(|| array.value(i).to_string())
}

fn append_batch(batch: &RecordBatch, out: &mut FixtureTable) -> PipelineResult<()> {
    let fixture_id = column::<Int64Array>(batch, "fixture_id")?;
    let date = column::<TimestampMicrosecondArray>(batch, "date")?;
    let timestamp = column::<Int64Array>(batch, "timestamp")?;
    let venue_id = column::<Int64Array>(batch, "venue_id")?;
    let venue_name = column::<StringArray>(batch, "venue_name")?;
    let status_short = column::<StringArray>(batch, "status_short")?;
    let status_long = column::<StringArray>(batch, "status_long")?;
    let league_id = column::<Int64Array>(batch, "league_id")?;
    let league_name = column::<StringArray>(batch, "league_name")?;
    let league_season = column::<Int64Array>(batch, "league_season")?;
    let league_round = column::<StringArray>(batch, "league_round")?;
    let home_team_id = column::<Int64Array>(batch, "home_team_id")?;
    let home_team_name = column::<StringArray>(batch, "home_team_name")?;
    let away_team_id = column::<Int64Array>(batch, "away_team_id")?;
    let away_team_name = column::<StringArray>(batch, "away_team_name")?;
    let goals_home = column::<Int64Array>(batch, "goals_home")?;
    let goals_away = column::<Int64Array>(batch, "goals_away")?;

    out.reserve(batch.num_rows());
    for i in 0..batch.num_rows() {
        out.push(FixtureRecord {
            fixture_id: int_at(fixture_id, i),
            date: date
                .is_valid(i)
                .then(|| DateTime::from_timestamp_micros(date.value(i)))
                .flatten(),
            timestamp: int_at(timestamp, i),
            venue_id: int_at(venue_id, i),
            venue_name: text_at(venue_name, i),
            status_short: text_at(status_short, i),
            status_long: text_at(status_long, i),
            league_id: int_at(league_id, i),
            league_name: text_at(league_name, i),
            league_season: int_at(league_season, i),
            league_round: text_at(league_round, i),
            home_team_id: int_at(home_team_id, i),
            home_team_name: text_at(home_team_name, i),
            away_team_id: int_at(away_team_id, i),
            away_team_name: text_at(away_team_name, i),
            goals_home: int_at(goals_home, i),
            goals_away: int_at(goals_away, i),
        });
    }
    Ok(())
}

/// Read a Parquet file written by [`encode_parquet`]
pub fn decode_parquet(data: impl Into<Bytes>) -> PipelineResult<FixtureTable> {
    let reader = ParquetRecordBatchReaderBuilder::try_new(data.into())?.build()?;

    let mut table = FixtureTable::new();
    for batch in reader {
        append_batch(&batch?, &mut table)?;
    }
    Ok(table)
}
