use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Catalog database path, relative to `data_dir` unless absolute.
    #[serde(default = "default_catalog_db")]
    pub catalog_db: String,
    /// Readings database path, relative to `data_dir` unless absolute.
    #[serde(default = "default_readings_db")]
    pub readings_db: String,

    #[serde(default)]
    pub alarm: AlarmConfig,
    #[serde(default)]
    pub push: PushConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Scan checkpoint file, relative to `data_dir` unless absolute.
    #[serde(default = "default_checkpoint_file")]
    pub checkpoint_file: String,
    /// Active-alarm registry file, relative to `data_dir` unless absolute.
    #[serde(default = "default_registry_file")]
    pub registry_file: String,
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            checkpoint_file: default_checkpoint_file(),
            registry_file: default_registry_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Push gateway API key. Notifications are disabled when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_push_endpoint")]
    pub endpoint: String,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_push_endpoint(),
        }
    }
}

fn default_data_dir() -> String {
    "data".to_string()
}

fn default_catalog_db() -> String {
    "catalog.db".to_string()
}

fn default_readings_db() -> String {
    "readings.db".to_string()
}

fn default_poll_interval_secs() -> u64 {
    60
}

fn default_checkpoint_file() -> String {
    "alarm_checkpoint".to_string()
}

fn default_registry_file() -> String {
    "alarm_registry".to_string()
}

fn default_push_endpoint() -> String {
    curamon_notify::push::DEFAULT_ENDPOINT.to_string()
}

impl ServerConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Resolves a configured path against `data_dir` unless it is absolute.
    pub fn resolve(&self, path: &str) -> std::path::PathBuf {
        let p = std::path::Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            std::path::Path::new(&self.data_dir).join(p)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config: ServerConfig = toml::from_str("").unwrap();
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.catalog_db, "catalog.db");
        assert_eq!(config.readings_db, "readings.db");
        assert_eq!(config.alarm.poll_interval_secs, 60);
        assert_eq!(config.alarm.checkpoint_file, "alarm_checkpoint");
        assert_eq!(config.alarm.registry_file, "alarm_registry");
        assert!(config.push.api_key.is_none());
        assert_eq!(config.push.endpoint, curamon_notify::push::DEFAULT_ENDPOINT);
    }

    #[test]
    fn partial_config_overrides_selected_fields() {
        let config: ServerConfig = toml::from_str(
            r#"
            data_dir = "/var/lib/curamon"

            [alarm]
            poll_interval_secs = 10

            [push]
            api_key = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.data_dir, "/var/lib/curamon");
        assert_eq!(config.alarm.poll_interval_secs, 10);
        assert_eq!(config.alarm.registry_file, "alarm_registry");
        assert_eq!(config.push.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn resolve_joins_relative_paths_only() {
        let config: ServerConfig = toml::from_str("data_dir = \"/data\"").unwrap();
        assert_eq!(
            config.resolve("catalog.db"),
            std::path::Path::new("/data/catalog.db")
        );
        assert_eq!(
            config.resolve("/srv/readings.db"),
            std::path::Path::new("/srv/readings.db")
        );
    }
}
