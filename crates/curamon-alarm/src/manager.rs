use crate::finder::{AlarmFinder, BreachMap};
use crate::registry::{ActiveAlarm, AlarmRegistry, RegistryStore};
use anyhow::Result;
use curamon_common::types::{Breach, BreachKind, ChannelKey};
use curamon_notify::AlarmNotifier;
use curamon_storage::{CatalogSource, SensorStatusSink};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};

/// Drives the per-channel alarm state machine from a fixed-interval poll
/// loop.
///
/// The manager is the only writer of the registry and the only caller of
/// the finder; a tick runs to completion (including persistence) before
/// the next one may begin.
pub struct AlarmManager {
    finder: AlarmFinder,
    registry: AlarmRegistry,
    registry_store: RegistryStore,
    catalog: Arc<dyn CatalogSource>,
    status_sink: Arc<dyn SensorStatusSink>,
    notifier: Arc<dyn AlarmNotifier>,
    poll_interval: Duration,
}

impl AlarmManager {
    /// Loads the persisted registry and assembles the manager. Call
    /// [`reconcile_sensor_status`](Self::reconcile_sensor_status) before
    /// starting the loop to repair stale status rows from a crash.
    pub fn new(
        finder: AlarmFinder,
        registry_store: RegistryStore,
        catalog: Arc<dyn CatalogSource>,
        status_sink: Arc<dyn SensorStatusSink>,
        notifier: Arc<dyn AlarmNotifier>,
        poll_interval: Duration,
    ) -> Result<Self> {
        let registry = registry_store.load()?;
        if !registry.is_empty() {
            tracing::info!(active_alarms = registry.len(), "Restored alarm registry");
        }
        Ok(Self {
            finder,
            registry,
            registry_store,
            catalog,
            status_sink,
            notifier,
            poll_interval,
        })
    }

    pub fn registry(&self) -> &AlarmRegistry {
        &self.registry
    }

    /// Repairs sensors left with a non-"ok" status by a crash between a
    /// registry mutation and the status write: any flagged sensor with no
    /// active alarm in the freshly loaded registry is reset to "ok".
    pub fn reconcile_sensor_status(&self) -> Result<()> {
        for sensor_id in self.catalog.sensor_ids_with_alarm_status()? {
            if self.registry.has_alarms_for_sensor(sensor_id) {
                continue;
            }
            tracing::info!(sensor_id, "Resetting stale sensor status after restart");
            if !self.status_sink.set_sensor_status(sensor_id, "ok")? {
                tracing::warn!(sensor_id, "Unable to reset status, sensor not found");
            }
        }
        Ok(())
    }

    /// One poll cycle: scan, diff against the registry, then re-check the
    /// alarmed set for clearing. Min breaches are processed before max
    /// breaches, both before clearance; the passes run sequentially so a
    /// channel started by the min pass is a continue in the max pass of
    /// the same tick.
    ///
    /// Any error aborts the tick mid-diff; the partially applied state is
    /// accepted and re-evaluated on the next tick.
    pub async fn tick(&mut self) -> Result<()> {
        let (min_breaches, max_breaches) = self.finder.compare_data()?;

        self.apply_breaches(&min_breaches, BreachKind::Min).await?;
        self.apply_breaches(&max_breaches, BreachKind::Max).await?;

        let watched = self.registry.watched_thresholds();
        if watched.is_empty() {
            return Ok(());
        }
        let status = self.finder.check_alarmed(&watched)?;
        for (key, cleared) in status {
            if cleared {
                self.on_alarm_end(&key)?;
            }
        }
        Ok(())
    }

    async fn apply_breaches(&mut self, breaches: &BreachMap, kind: BreachKind) -> Result<()> {
        for (key, breach) in breaches {
            if self.registry.contains(key) {
                self.on_alarm_continue(key, breach, kind);
            } else {
                self.on_alarm_start(*key, breach, kind).await?;
            }
        }
        Ok(())
    }

    async fn on_alarm_start(
        &mut self,
        key: ChannelKey,
        breach: &Breach,
        kind: BreachKind,
    ) -> Result<()> {
        tracing::warn!(
            channel_id = key.channel_id,
            sensor_id = key.sensor_id,
            site_id = key.site_id,
            kind = %kind,
            value = breach.value,
            observed_at = %breach.observed_at,
            "Alarm started"
        );

        self.registry.insert(
            key,
            ActiveAlarm {
                started_at: breach.observed_at,
                kind,
                range_min: breach.range_min,
                range_max: breach.range_max,
            },
        );
        self.registry_store.save(&self.registry)?;
        self.update_sensor_status(key.sensor_id)?;

        // Fire-and-forget: a failed notification never rolls back the
        // transition.
        if let Err(e) = self
            .notifier
            .send_alarm(key.channel_id, &breach.value.to_string())
            .await
        {
            tracing::warn!(
                channel_id = key.channel_id,
                error = %e,
                "Alarm notification failed"
            );
        }
        Ok(())
    }

    fn on_alarm_continue(&self, key: &ChannelKey, breach: &Breach, kind: BreachKind) {
        tracing::info!(
            channel_id = key.channel_id,
            kind = %kind,
            value = breach.value,
            "Alarm still active"
        );
    }

    fn on_alarm_end(&mut self, key: &ChannelKey) -> Result<()> {
        tracing::warn!(
            channel_id = key.channel_id,
            sensor_id = key.sensor_id,
            "Alarm ended"
        );
        self.registry.remove(key);
        self.registry_store.save(&self.registry)?;
        self.update_sensor_status(key.sensor_id)?;
        Ok(())
    }

    /// Recomputes the denormalized status string for one sensor from the
    /// derived index and persists it. The registry stays authoritative.
    fn update_sensor_status(&self, sensor_id: i64) -> Result<()> {
        let channel_ids = self.registry.channels_for_sensor(sensor_id);
        let status = if channel_ids.is_empty() {
            "ok".to_string()
        } else {
            format!("{channel_ids:?} fired")
        };
        if !self.status_sink.set_sensor_status(sensor_id, &status)? {
            tracing::warn!(sensor_id, "Unable to update status, sensor not found");
        }
        Ok(())
    }

    /// Runs the poll loop until `shutdown` changes. The interval fires at
    /// a fixed origin plus N×interval, so slow ticks do not accumulate
    /// drift; an overrunning tick delays the next fire rather than
    /// skipping it or overlapping. Shutdown takes effect at the next tick
    /// boundary.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            interval_secs = self.poll_interval.as_secs(),
            "Alarm poll loop started"
        );
        let mut tick = interval(self.poll_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = tick.tick() => {
                    if let Err(e) = self.tick().await {
                        tracing::error!(error = %e, "Alarm poll tick failed");
                    }
                }
                _ = shutdown.changed() => {
                    tracing::info!("Alarm poll loop stopping");
                    break;
                }
            }
        }
    }
}
