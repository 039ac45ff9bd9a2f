use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Full identity of a monitored channel.
///
/// Combines the local catalog ids (site/sensor/channel rows) with the
/// external ids used by the upstream measurement feed. This is the map key
/// for the alarm registry, so equality and hashing are structural over all
/// six fields.
///
/// # Examples
///
/// ```
/// use curamon_common::types::ChannelKey;
/// use std::collections::HashMap;
///
/// let key = ChannelKey {
///     channel_id: 7,
///     sensor_id: 3,
///     site_id: 1,
///     ext_site_id: 100,
///     ext_station_id: 200,
///     ext_channel_id: 300,
/// };
/// let mut alarms = HashMap::new();
/// alarms.insert(key, "active");
/// // A separately constructed key with the same fields finds the entry.
/// assert_eq!(alarms.get(&key.clone()), Some(&"active"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelKey {
    pub channel_id: i64,
    pub sensor_id: i64,
    pub site_id: i64,
    pub ext_site_id: i64,
    pub ext_station_id: i64,
    pub ext_channel_id: i64,
}

impl ChannelKey {
    /// The external identity tuple used to match readings-store rows.
    pub fn ext_tuple(&self) -> (i64, i64, i64) {
        (self.ext_site_id, self.ext_station_id, self.ext_channel_id)
    }
}

/// A channel's configured alarm range, snapshotted from the catalog.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChannelThreshold {
    pub key: ChannelKey,
    pub range_min: f64,
    pub range_max: f64,
}

/// Which bound of the configured range was crossed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachKind {
    Min,
    Max,
}

impl std::fmt::Display for BreachKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreachKind::Min => write!(f, "min"),
            BreachKind::Max => write!(f, "max"),
        }
    }
}

/// An out-of-range extreme joined against its channel's threshold.
///
/// `range_min`/`range_max` carry the threshold values in force when the
/// breach was classified, so downstream state keeps working even if the
/// catalog entry is edited afterwards.
#[derive(Debug, Clone, Copy)]
pub struct Breach {
    pub value: f64,
    pub observed_at: DateTime<Utc>,
    pub range_min: f64,
    pub range_max: f64,
}

/// One aggregated extreme from the readings store, grouped by the external
/// identity tuple.
#[derive(Debug, Clone, Copy)]
pub struct ReadingExtreme {
    pub site_id: i64,
    pub station_id: i64,
    pub channel_id: i64,
    pub value: f64,
    pub observed_at: DateTime<Utc>,
}

/// A single raw sample as stored by the measurement feed.
#[derive(Debug, Clone, Copy)]
pub struct Sample {
    pub value_min: f64,
    pub value_max: f64,
    pub observed_at: DateTime<Utc>,
}

/// Display names for a channel, used in notification payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelDisplay {
    pub site_name: String,
    pub sensor_name: String,
    pub channel_name: String,
}
