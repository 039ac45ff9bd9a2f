use crate::catalog::CatalogStore;
use crate::readings::ReadingStore;
use crate::{CatalogSource, ReadingSource, SensorStatusSink};
use chrono::{Duration, Utc};
use tempfile::TempDir;

fn catalog() -> (TempDir, CatalogStore) {
    let dir = TempDir::new().unwrap();
    let store = CatalogStore::new(&dir.path().join("catalog.db")).unwrap();
    (dir, store)
}

fn readings() -> (TempDir, ReadingStore) {
    let dir = TempDir::new().unwrap();
    let store = ReadingStore::new(&dir.path().join("readings.db")).unwrap();
    (dir, store)
}

#[test]
fn enabled_thresholds_excludes_disabled_sensors() {
    let (_dir, store) = catalog();

    let site = store.insert_site("North Wing", Some(100)).unwrap();
    let on = store.insert_sensor(site, "hall-a", Some(200), true).unwrap();
    let off = store.insert_sensor(site, "hall-b", Some(201), false).unwrap();
    store
        .insert_channel(on, "temperature", Some(300), Some(10.0), Some(30.0))
        .unwrap();
    store
        .insert_channel(off, "temperature", Some(301), Some(10.0), Some(30.0))
        .unwrap();

    let thresholds = store.list_enabled_thresholds().unwrap();
    assert_eq!(thresholds.len(), 1);
    assert_eq!(thresholds[0].key.sensor_id, on);
    assert_eq!(thresholds[0].key.ext_channel_id, 300);
    assert_eq!(thresholds[0].range_min, 10.0);
    assert_eq!(thresholds[0].range_max, 30.0);
}

#[test]
fn enabled_thresholds_excludes_unconfigured_ranges() {
    let (_dir, store) = catalog();

    let site = store.insert_site("North Wing", Some(100)).unwrap();
    let sensor = store.insert_sensor(site, "hall-a", Some(200), true).unwrap();
    store
        .insert_channel(sensor, "humidity", Some(300), Some(20.0), None)
        .unwrap();

    assert!(store.list_enabled_thresholds().unwrap().is_empty());
}

#[test]
fn sensor_status_roundtrip_and_listing() {
    let (_dir, store) = catalog();

    let site = store.insert_site("North Wing", None).unwrap();
    let a = store.insert_sensor(site, "hall-a", None, true).unwrap();
    let b = store.insert_sensor(site, "hall-b", None, true).unwrap();

    assert_eq!(store.sensor_status(a).unwrap().as_deref(), Some("ok"));
    assert!(store.set_sensor_status(a, "[7] fired").unwrap());
    assert_eq!(
        store.sensor_status(a).unwrap().as_deref(),
        Some("[7] fired")
    );

    let flagged = store.sensor_ids_with_alarm_status().unwrap();
    assert_eq!(flagged, vec![a]);
    assert_ne!(flagged[0], b);

    // Unknown sensor: update reports false instead of erroring.
    assert!(!store.set_sensor_status(9999, "ok").unwrap());
    assert!(store.sensor_status(9999).unwrap().is_none());
}

#[test]
fn channel_display_resolves_names() {
    let (_dir, store) = catalog();

    let site = store.insert_site("North Wing", None).unwrap();
    let sensor = store.insert_sensor(site, "hall-a", None, true).unwrap();
    let channel = store
        .insert_channel(sensor, "temperature", None, Some(0.0), Some(1.0))
        .unwrap();

    let display = store.channel_display(channel).unwrap().unwrap();
    assert_eq!(display.site_name, "North Wing");
    assert_eq!(display.sensor_name, "hall-a");
    assert_eq!(display.channel_name, "temperature");

    assert!(store.channel_display(channel + 1).unwrap().is_none());
}

#[test]
fn query_extremes_groups_by_identity_tuple() {
    let (_dir, store) = readings();
    let now = Utc::now();

    // Two channels on the same station, several samples each.
    store
        .insert_reading(100, 200, 300, now - Duration::seconds(30), 5.0, 6.0)
        .unwrap();
    store
        .insert_reading(100, 200, 300, now - Duration::seconds(20), 2.0, 9.0)
        .unwrap();
    store
        .insert_reading(100, 200, 301, now - Duration::seconds(10), 40.0, 55.0)
        .unwrap();

    let (mins, maxes) = store.query_extremes(now - Duration::minutes(5)).unwrap();
    assert_eq!(mins.len(), 2);
    assert_eq!(maxes.len(), 2);

    let min_300 = mins.iter().find(|e| e.channel_id == 300).unwrap();
    assert_eq!(min_300.value, 2.0);
    assert_eq!(
        min_300.observed_at.timestamp_millis(),
        (now - Duration::seconds(20)).timestamp_millis()
    );

    let max_300 = maxes.iter().find(|e| e.channel_id == 300).unwrap();
    assert_eq!(max_300.value, 9.0);
}

#[test]
fn query_extremes_is_strictly_after_cursor() {
    let (_dir, store) = readings();
    let now = Utc::now();
    let boundary = now - Duration::seconds(10);

    store.insert_reading(1, 1, 1, boundary, 3.0, 4.0).unwrap();
    store
        .insert_reading(1, 1, 1, now - Duration::seconds(5), 7.0, 8.0)
        .unwrap();

    // A sample timestamped exactly at the cursor is not rescanned.
    let (mins, _) = store.query_extremes(boundary).unwrap();
    assert_eq!(mins.len(), 1);
    assert_eq!(mins[0].value, 7.0);

    let (mins, _) = store.query_extremes(now).unwrap();
    assert!(mins.is_empty());
}

#[test]
fn latest_sample_ignores_cursor_and_picks_newest() {
    let (_dir, store) = readings();
    let now = Utc::now();

    store
        .insert_reading(100, 200, 300, now - Duration::minutes(10), 1.0, 2.0)
        .unwrap();
    store
        .insert_reading(100, 200, 300, now - Duration::seconds(5), 15.0, 17.0)
        .unwrap();

    let sample = store.latest_sample(100, 200, 300).unwrap().unwrap();
    assert_eq!(sample.value_min, 15.0);
    assert_eq!(sample.value_max, 17.0);

    assert!(store.latest_sample(100, 200, 999).unwrap().is_none());
}
