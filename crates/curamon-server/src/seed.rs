use anyhow::Result;
use curamon_storage::catalog::CatalogStore;
use serde::{Deserialize, Serialize};

// ---- Catalog seed file types (used by `init-catalog` CLI subcommand) ----

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub sites: Vec<SeedSite>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSite {
    pub name: String,
    #[serde(default)]
    pub ext_id: Option<i64>,
    #[serde(default)]
    pub sensors: Vec<SeedSensor>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSensor {
    pub name: String,
    #[serde(default)]
    pub ext_id: Option<i64>,
    #[serde(default = "default_seed_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub channels: Vec<SeedChannel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedChannel {
    pub name: String,
    #[serde(default)]
    pub ext_id: Option<i64>,
    #[serde(default)]
    pub range_min: Option<f64>,
    #[serde(default)]
    pub range_max: Option<f64>,
}

fn default_seed_enabled() -> bool {
    true
}

impl SeedFile {
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read seed file '{}': {}", path, e))?;
        let seed: Self = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse seed file '{}': {}", path, e))?;
        Ok(seed)
    }

    /// Inserts the seeded hierarchy into the catalog. Returns the number of
    /// channels created.
    pub fn apply(&self, catalog: &CatalogStore) -> Result<u32> {
        let mut channels_created = 0u32;
        for site in &self.sites {
            let site_id = catalog.insert_site(&site.name, site.ext_id)?;
            tracing::info!(name = %site.name, id = site_id, "Site created");
            for sensor in &site.sensors {
                let sensor_id =
                    catalog.insert_sensor(site_id, &sensor.name, sensor.ext_id, sensor.enabled)?;
                tracing::info!(
                    name = %sensor.name,
                    id = sensor_id,
                    enabled = sensor.enabled,
                    "Sensor created"
                );
                for channel in &sensor.channels {
                    catalog.insert_channel(
                        sensor_id,
                        &channel.name,
                        channel.ext_id,
                        channel.range_min,
                        channel.range_max,
                    )?;
                    channels_created += 1;
                }
            }
        }
        Ok(channels_created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use curamon_storage::CatalogSource;
    use tempfile::TempDir;

    #[test]
    fn seed_file_populates_catalog() {
        let dir = TempDir::new().unwrap();
        let catalog = CatalogStore::new(&dir.path().join("catalog.db")).unwrap();

        let seed: SeedFile = serde_json::from_str(
            r#"{
                "sites": [{
                    "name": "Museum",
                    "ext_id": 100,
                    "sensors": [{
                        "name": "Crypt",
                        "ext_id": 200,
                        "channels": [
                            {"name": "Humidity", "ext_id": 307,
                             "range_min": 40.0, "range_max": 60.0},
                            {"name": "Temperature", "ext_id": 308}
                        ]
                    }, {
                        "name": "Spare",
                        "enabled": false,
                        "channels": []
                    }]
                }]
            }"#,
        )
        .unwrap();

        let created = seed.apply(&catalog).unwrap();
        assert_eq!(created, 2);

        // Only the fully configured channel shows up as a threshold.
        let thresholds = catalog.list_enabled_thresholds().unwrap();
        assert_eq!(thresholds.len(), 1);
        assert_eq!(thresholds[0].range_min, 40.0);
        assert_eq!(thresholds[0].range_max, 60.0);
        assert_eq!(thresholds[0].key.ext_tuple(), (100, 200, 307));
    }
}
