use crate::ReadingSource;
use anyhow::Result;
use chrono::{DateTime, Utc};
use curamon_common::types::{ReadingExtreme, Sample};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const READINGS_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS readings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL,
    station_id INTEGER NOT NULL,
    channel_id INTEGER NOT NULL,
    date INTEGER NOT NULL,
    value_min REAL NOT NULL,
    value_max REAL NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_readings_channel_date
    ON readings(site_id, station_id, channel_id, date);
CREATE INDEX IF NOT EXISTS idx_readings_date ON readings(date);
";

/// Accessor over the external measurement feed database.
///
/// The feed identifies channels by its own (site, station, channel) tuple;
/// timestamps are stored as milliseconds since the Unix epoch.
pub struct ReadingStore {
    conn: Mutex<Connection>,
}

impl ReadingStore {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(READINGS_SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened reading store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Inserts one raw sample. Used by tests and import tooling; in
    /// production the feed database is written by the upstream collector.
    pub fn insert_reading(
        &self,
        site_id: i64,
        station_id: i64,
        channel_id: i64,
        date: DateTime<Utc>,
        value_min: f64,
        value_max: f64,
    ) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO readings (site_id, station_id, channel_id, date, value_min, value_max)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                site_id,
                station_id,
                channel_id,
                date.timestamp_millis(),
                value_min,
                value_max,
            ],
        )?;
        Ok(())
    }
}

impl ReadingSource for ReadingStore {
    fn query_extremes(
        &self,
        since: DateTime<Utc>,
    ) -> Result<(Vec<ReadingExtreme>, Vec<ReadingExtreme>)> {
        let since_ms = since.timestamp_millis();
        let conn = self.lock();

        // SQLite returns the bare `date` column from the row that holds the
        // aggregate extreme, which is exactly the sample timestamp we want.
        let mut collect = |sql: &str| -> Result<Vec<ReadingExtreme>> {
            let mut stmt = conn.prepare_cached(sql)?;
            let rows = stmt.query_map(rusqlite::params![since_ms], |row| {
                let ts_ms: i64 = row.get(4)?;
                Ok(ReadingExtreme {
                    site_id: row.get(0)?,
                    station_id: row.get(1)?,
                    channel_id: row.get(2)?,
                    value: row.get(3)?,
                    observed_at: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
                })
            })?;
            let mut extremes = Vec::new();
            for row in rows {
                extremes.push(row?);
            }
            Ok(extremes)
        };

        let mins = collect(
            "SELECT site_id, station_id, channel_id, MIN(value_min), date
             FROM readings WHERE date > ?1
             GROUP BY site_id, station_id, channel_id",
        )?;
        let maxes = collect(
            "SELECT site_id, station_id, channel_id, MAX(value_max), date
             FROM readings WHERE date > ?1
             GROUP BY site_id, station_id, channel_id",
        )?;
        Ok((mins, maxes))
    }

    fn latest_sample(
        &self,
        ext_site_id: i64,
        ext_station_id: i64,
        ext_channel_id: i64,
    ) -> Result<Option<Sample>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT value_min, value_max, date FROM readings
             WHERE site_id = ?1 AND station_id = ?2 AND channel_id = ?3
             ORDER BY date DESC LIMIT 1",
        )?;
        let sample = stmt
            .query_row(
                rusqlite::params![ext_site_id, ext_station_id, ext_channel_id],
                |row| {
                    let ts_ms: i64 = row.get(2)?;
                    Ok(Sample {
                        value_min: row.get(0)?,
                        value_max: row.get(1)?,
                        observed_at: DateTime::from_timestamp_millis(ts_ms).unwrap_or_default(),
                    })
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(sample)
    }
}
