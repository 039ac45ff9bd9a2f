use crate::{CatalogSource, SensorStatusSink};
use anyhow::Result;
use curamon_common::types::{ChannelDisplay, ChannelKey, ChannelThreshold};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const CATALOG_SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ext_id INTEGER,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS sensors (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    site_id INTEGER NOT NULL REFERENCES sites(id),
    ext_id INTEGER,
    name TEXT NOT NULL,
    enabled INTEGER NOT NULL DEFAULT 0,
    status TEXT NOT NULL DEFAULT 'ok'
);
CREATE TABLE IF NOT EXISTS channels (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sensor_id INTEGER NOT NULL REFERENCES sensors(id),
    ext_id INTEGER,
    name TEXT NOT NULL,
    range_min REAL,
    range_max REAL
);
CREATE INDEX IF NOT EXISTS idx_sensors_site ON sensors(site_id);
CREATE INDEX IF NOT EXISTS idx_channels_sensor ON channels(sensor_id);
";

/// SQLite-backed catalog of sites, sensors, and channels.
///
/// The `status` column on sensors is a derived field written by the alarm
/// manager; the alarm registry remains authoritative.
pub struct CatalogStore {
    conn: Mutex<Connection>,
}

impl CatalogStore {
    pub fn new(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch(CATALOG_SCHEMA)?;
        tracing::info!(path = %path.display(), "Opened catalog store");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Lock the connection, recovering from a poisoned Mutex if necessary.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert_site(&self, name: &str, ext_id: Option<i64>) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO sites (name, ext_id) VALUES (?1, ?2)",
            rusqlite::params![name, ext_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_sensor(
        &self,
        site_id: i64,
        name: &str,
        ext_id: Option<i64>,
        enabled: bool,
    ) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO sensors (site_id, name, ext_id, enabled) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![site_id, name, ext_id, enabled],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn insert_channel(
        &self,
        sensor_id: i64,
        name: &str,
        ext_id: Option<i64>,
        range_min: Option<f64>,
        range_max: Option<f64>,
    ) -> Result<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO channels (sensor_id, name, ext_id, range_min, range_max)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![sensor_id, name, ext_id, range_min, range_max],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_sensor_enabled(&self, sensor_id: i64, enabled: bool) -> Result<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE sensors SET enabled = ?1 WHERE id = ?2",
            rusqlite::params![enabled, sensor_id],
        )?;
        Ok(updated > 0)
    }

    pub fn sensor_status(&self, sensor_id: i64) -> Result<Option<String>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT status FROM sensors WHERE id = ?1")?;
        let status = stmt
            .query_row(rusqlite::params![sensor_id], |row| row.get::<_, String>(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(status)
    }
}

impl CatalogSource for CatalogStore {
    fn list_enabled_thresholds(&self) -> Result<Vec<ChannelThreshold>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT c.id, s.id, t.id, t.ext_id, s.ext_id, c.ext_id, c.range_min, c.range_max
             FROM channels c
             JOIN sensors s ON s.id = c.sensor_id
             JOIN sites t ON t.id = s.site_id
             WHERE s.enabled = 1
               AND c.range_min IS NOT NULL AND c.range_max IS NOT NULL
               AND t.ext_id IS NOT NULL AND s.ext_id IS NOT NULL AND c.ext_id IS NOT NULL",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(ChannelThreshold {
                key: ChannelKey {
                    channel_id: row.get(0)?,
                    sensor_id: row.get(1)?,
                    site_id: row.get(2)?,
                    ext_site_id: row.get(3)?,
                    ext_station_id: row.get(4)?,
                    ext_channel_id: row.get(5)?,
                },
                range_min: row.get(6)?,
                range_max: row.get(7)?,
            })
        })?;
        let mut thresholds = Vec::new();
        for row in rows {
            thresholds.push(row?);
        }
        Ok(thresholds)
    }

    fn sensor_ids_with_alarm_status(&self) -> Result<Vec<i64>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached("SELECT id FROM sensors WHERE status != 'ok'")?;
        let rows = stmt.query_map([], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(row?);
        }
        Ok(ids)
    }

    fn channel_display(&self, channel_id: i64) -> Result<Option<ChannelDisplay>> {
        let conn = self.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT t.name, s.name, c.name
             FROM channels c
             JOIN sensors s ON s.id = c.sensor_id
             JOIN sites t ON t.id = s.site_id
             WHERE c.id = ?1",
        )?;
        let display = stmt
            .query_row(rusqlite::params![channel_id], |row| {
                Ok(ChannelDisplay {
                    site_name: row.get(0)?,
                    sensor_name: row.get(1)?,
                    channel_name: row.get(2)?,
                })
            })
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;
        Ok(display)
    }
}

impl SensorStatusSink for CatalogStore {
    fn set_sensor_status(&self, sensor_id: i64, status: &str) -> Result<bool> {
        let conn = self.lock();
        let updated = conn.execute(
            "UPDATE sensors SET status = ?1 WHERE id = ?2",
            rusqlite::params![status, sensor_id],
        )?;
        Ok(updated > 0)
    }
}
