use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use curamon_common::types::{BreachKind, ChannelKey, ChannelThreshold};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// An alarm currently in progress for one channel.
///
/// The threshold values are snapshotted at alarm start so clearance checks
/// keep working even if the catalog entry is edited or its sensor disabled
/// while the alarm is active.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActiveAlarm {
    pub started_at: DateTime<Utc>,
    pub kind: BreachKind,
    pub range_min: f64,
    pub range_max: f64,
}

/// In-memory registry of active alarms, with a derived per-sensor index
/// for efficient status rollup.
///
/// Invariant: at most one active alarm per channel. The registry is
/// mutated only by the poll worker; external readers must treat it as a
/// snapshot.
#[derive(Debug, Default)]
pub struct AlarmRegistry {
    alarmed: HashMap<ChannelKey, ActiveAlarm>,
    by_sensor: HashMap<i64, HashSet<ChannelKey>>,
}

impl AlarmRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &ChannelKey) -> bool {
        self.alarmed.contains_key(key)
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&ActiveAlarm> {
        self.alarmed.get(key)
    }

    pub fn len(&self) -> usize {
        self.alarmed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarmed.is_empty()
    }

    /// Inserts or replaces the alarm for a channel, keeping the derived
    /// index in sync.
    pub fn insert(&mut self, key: ChannelKey, alarm: ActiveAlarm) {
        self.alarmed.insert(key, alarm);
        self.by_sensor.entry(key.sensor_id).or_default().insert(key);
    }

    /// Removes the alarm for a channel. Returns the removed entry, if any.
    pub fn remove(&mut self, key: &ChannelKey) -> Option<ActiveAlarm> {
        let removed = self.alarmed.remove(key)?;
        if let Some(set) = self.by_sensor.get_mut(&key.sensor_id) {
            set.remove(key);
            if set.is_empty() {
                self.by_sensor.remove(&key.sensor_id);
            }
        }
        Some(removed)
    }

    /// The alarmed channels belonging to one sensor, sorted by channel id.
    pub fn channels_for_sensor(&self, sensor_id: i64) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .by_sensor
            .get(&sensor_id)
            .map(|set| set.iter().map(|k| k.channel_id).collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    pub fn has_alarms_for_sensor(&self, sensor_id: i64) -> bool {
        self.by_sensor.contains_key(&sensor_id)
    }

    /// Snapshot of every watched channel with its start-time threshold,
    /// in the shape the clearance check consumes.
    pub fn watched_thresholds(&self) -> Vec<ChannelThreshold> {
        self.alarmed
            .iter()
            .map(|(key, alarm)| ChannelThreshold {
                key: *key,
                range_min: alarm.range_min,
                range_max: alarm.range_max,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKey, &ActiveAlarm)> {
        self.alarmed.iter()
    }
}

const REGISTRY_HEADER: &str = "curamon-registry v1";

#[derive(Debug, Serialize, Deserialize)]
struct RegistryRecord {
    key: ChannelKey,
    #[serde(flatten)]
    alarm: ActiveAlarm,
}

/// Durable backing file for the alarm registry.
///
/// Line-oriented format: a version header followed by one JSON record per
/// active alarm. The whole file is rewritten on every mutation
/// (write-through), which is cheap at the registry's scale.
pub struct RegistryStore {
    path: PathBuf,
}

impl RegistryStore {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Loads the persisted registry, rebuilding the derived per-sensor
    /// index. A missing file yields an empty registry.
    pub fn load(&self) -> Result<AlarmRegistry> {
        let mut registry = AlarmRegistry::new();
        if !self.path.is_file() {
            return Ok(registry);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read registry {}", self.path.display()))?;
        let mut lines = content.lines();
        match lines.next() {
            Some(header) if header.trim() == REGISTRY_HEADER => {}
            Some(header) => bail!(
                "Unsupported registry format '{}' in {}",
                header.trim(),
                self.path.display()
            ),
            None => return Ok(registry),
        }
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let record: RegistryRecord = serde_json::from_str(line)
                .with_context(|| format!("Malformed registry record in {}", self.path.display()))?;
            registry.insert(record.key, record.alarm);
        }
        Ok(registry)
    }

    pub fn save(&self, registry: &AlarmRegistry) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = String::from(REGISTRY_HEADER);
        out.push('\n');
        for (key, alarm) in registry.iter() {
            let record = RegistryRecord {
                key: *key,
                alarm: *alarm,
            };
            out.push_str(&serde_json::to_string(&record)?);
            out.push('\n');
        }
        std::fs::write(&self.path, out)
            .with_context(|| format!("Failed to write registry {}", self.path.display()))?;
        Ok(())
    }
}
