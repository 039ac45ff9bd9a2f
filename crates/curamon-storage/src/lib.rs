//! Persistence layer for the curamon monitoring server.
//!
//! Two SQLite databases are involved: the catalog database
//! ([`catalog::CatalogStore`]) owns the site/sensor/channel configuration
//! and the denormalized sensor status, while the readings database
//! ([`readings::ReadingStore`]) is a read-mostly accessor over the external
//! measurement feed.
//!
//! The alarm engine consumes the stores through the trait objects defined
//! here so tests can substitute in-memory doubles.

pub mod catalog;
pub mod readings;

#[cfg(test)]
mod tests;

use anyhow::Result;
use chrono::{DateTime, Utc};
use curamon_common::types::{ChannelDisplay, ChannelThreshold, ReadingExtreme, Sample};

/// Read-only view of the channel catalog.
///
/// Implementations must be safe to share across threads (`Send + Sync`)
/// because the catalog is consulted from both the poll worker and the
/// notification path.
pub trait CatalogSource: Send + Sync {
    /// Returns the alarm thresholds of every channel whose owning sensor is
    /// enabled and whose range is fully configured. Disabled sensors never
    /// produce alarms, even when their historical data is out of range.
    fn list_enabled_thresholds(&self) -> Result<Vec<ChannelThreshold>>;

    /// Returns the ids of sensors whose stored status is not `"ok"`.
    /// Used by startup reconciliation to repair stale status rows.
    fn sensor_ids_with_alarm_status(&self) -> Result<Vec<i64>>;

    /// Resolves the display names for a channel, or `None` if the channel
    /// row (or its sensor/site) is missing.
    fn channel_display(&self, channel_id: i64) -> Result<Option<ChannelDisplay>>;
}

/// Write access to the denormalized sensor status field.
pub trait SensorStatusSink: Send + Sync {
    /// Writes the status string for a sensor. Returns `false` when the
    /// sensor row does not exist; callers log and skip that sensor.
    fn set_sensor_status(&self, sensor_id: i64, status: &str) -> Result<bool>;
}

/// Query access to the external measurement feed.
pub trait ReadingSource: Send + Sync {
    /// Returns per-channel extremes over all samples strictly after
    /// `since`: the first vector aggregates `MIN(value_min)`, the second
    /// `MAX(value_max)`, each grouped by the external identity tuple and
    /// carrying the timestamp of the extreme sample.
    fn query_extremes(
        &self,
        since: DateTime<Utc>,
    ) -> Result<(Vec<ReadingExtreme>, Vec<ReadingExtreme>)>;

    /// Returns the most recent sample for the given external identity
    /// tuple, regardless of any scan cursor.
    fn latest_sample(
        &self,
        ext_site_id: i64,
        ext_station_id: i64,
        ext_channel_id: i64,
    ) -> Result<Option<Sample>>;
}
