use crate::checkpoint::CheckpointStore;
use anyhow::Result;
use chrono::{DateTime, Utc};
use curamon_common::types::{Breach, ChannelKey, ChannelThreshold};
use curamon_storage::{CatalogSource, ReadingSource};
use std::collections::HashMap;
use std::sync::Arc;

/// Breach maps returned by one scan: channel identity to the out-of-range
/// extreme that triggered it.
pub type BreachMap = HashMap<ChannelKey, Breach>;

/// Scans the measurement feed for readings outside each channel's
/// configured range.
///
/// Holds the in-memory scan cursor mirrored by the durable
/// [`CheckpointStore`]; only the poll worker calls into it.
pub struct AlarmFinder {
    catalog: Arc<dyn CatalogSource>,
    readings: Arc<dyn ReadingSource>,
    checkpoint: CheckpointStore,
    last_scanned_at: DateTime<Utc>,
}

impl AlarmFinder {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        readings: Arc<dyn ReadingSource>,
        checkpoint: CheckpointStore,
    ) -> Result<Self> {
        let last_scanned_at = checkpoint.load()?;
        tracing::info!(since = %last_scanned_at, "Loaded scan checkpoint");
        Ok(Self {
            catalog,
            readings,
            checkpoint,
            last_scanned_at,
        })
    }

    pub fn last_scanned_at(&self) -> DateTime<Utc> {
        self.last_scanned_at
    }

    /// Compares the extremes observed since the last scan against the
    /// enabled-channel thresholds, returning the min- and max-breach maps.
    ///
    /// The checkpoint is advanced and persisted before the query runs: a
    /// crash mid-poll skips the window instead of firing the same alarms
    /// again on restart. A window whose processing fails after this point
    /// is permanently lost.
    pub fn compare_data(&mut self) -> Result<(BreachMap, BreachMap)> {
        let since = self.last_scanned_at;
        let now = Utc::now();
        self.last_scanned_at = now;
        self.checkpoint.save(now)?;

        tracing::debug!(since = %since, "Scanning readings for out-of-range extremes");
        let (min_extremes, max_extremes) = self.readings.query_extremes(since)?;

        let thresholds = self.catalog.list_enabled_thresholds()?;
        let by_ext: HashMap<(i64, i64, i64), &ChannelThreshold> = thresholds
            .iter()
            .map(|t| (t.key.ext_tuple(), t))
            .collect();

        let mut min_breaches = BreachMap::new();
        let mut max_breaches = BreachMap::new();

        // Join first, then classify: a min extreme that never reaches
        // range_min can still land in the max map in degenerate
        // configurations.
        for rec in &min_extremes {
            let Some(threshold) = by_ext.get(&(rec.site_id, rec.station_id, rec.channel_id))
            else {
                continue;
            };
            let breach = Breach {
                value: rec.value,
                observed_at: rec.observed_at,
                range_min: threshold.range_min,
                range_max: threshold.range_max,
            };
            if rec.value <= threshold.range_min {
                min_breaches.insert(threshold.key, breach);
            } else if rec.value >= threshold.range_max {
                max_breaches.insert(threshold.key, breach);
            }
        }

        for rec in &max_extremes {
            let Some(threshold) = by_ext.get(&(rec.site_id, rec.station_id, rec.channel_id))
            else {
                continue;
            };
            if rec.value >= threshold.range_max {
                max_breaches.insert(
                    threshold.key,
                    Breach {
                        value: rec.value,
                        observed_at: rec.observed_at,
                        range_min: threshold.range_min,
                        range_max: threshold.range_max,
                    },
                );
                // A window that straddles both bounds is recorded once,
                // as a max breach.
                min_breaches.remove(&threshold.key);
            }
        }

        if !min_breaches.is_empty() || !max_breaches.is_empty() {
            tracing::info!(
                min_breaches = min_breaches.len(),
                max_breaches = max_breaches.len(),
                "Out-of-range extremes found"
            );
        }

        Ok((min_breaches, max_breaches))
    }

    /// Re-evaluates currently alarmed channels against their most recent
    /// sample. Returns, per channel, whether the alarm has cleared
    /// (latest sample strictly inside the range on both bounds).
    ///
    /// Channels with no sample at all are skipped with a warning and stay
    /// alarmed: missing data never auto-clears an alarm.
    pub fn check_alarmed(
        &self,
        watched: &[ChannelThreshold],
    ) -> Result<HashMap<ChannelKey, bool>> {
        let mut result = HashMap::with_capacity(watched.len());
        for threshold in watched {
            let key = threshold.key;
            let sample = self.readings.latest_sample(
                key.ext_site_id,
                key.ext_station_id,
                key.ext_channel_id,
            )?;
            match sample {
                Some(sample) => {
                    tracing::debug!(
                        channel_id = key.channel_id,
                        value_min = sample.value_min,
                        value_max = sample.value_max,
                        observed_at = %sample.observed_at,
                        "Re-checked alarmed channel"
                    );
                    let cleared = sample.value_min > threshold.range_min
                        && sample.value_max < threshold.range_max;
                    result.insert(key, cleared);
                }
                None => {
                    tracing::warn!(
                        channel_id = key.channel_id,
                        ext_site_id = key.ext_site_id,
                        ext_station_id = key.ext_station_id,
                        ext_channel_id = key.ext_channel_id,
                        "No sample found for alarmed channel, leaving alarm active"
                    );
                }
            }
        }
        Ok(result)
    }
}
