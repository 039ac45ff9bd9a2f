use anyhow::Result;
use curamon_alarm::checkpoint::CheckpointStore;
use curamon_alarm::finder::AlarmFinder;
use curamon_alarm::manager::AlarmManager;
use curamon_alarm::registry::RegistryStore;
use curamon_notify::push::{DisabledNotifier, PushNotifier};
use curamon_notify::AlarmNotifier;
use curamon_storage::catalog::CatalogStore;
use curamon_storage::readings::ReadingStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use curamon_server::config::ServerConfig;
use curamon_server::seed::SeedFile;

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  curamon-server [config.toml]                            Start the server");
    eprintln!("  curamon-server init-catalog <config.toml> <seed.json>   Initialize the catalog from a seed file");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("curamon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("init-catalog") => {
            let config_path = args.get(2).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-catalog requires <config.toml> and <seed.json> arguments")
            })?;
            let seed_path = args.get(3).ok_or_else(|| {
                print_usage();
                anyhow::anyhow!("init-catalog requires <seed.json> argument")
            })?;
            run_init_catalog(config_path, seed_path)
        }
        Some("--help" | "-h") => {
            print_usage();
            Ok(())
        }
        _ => {
            let config_path = args
                .get(1)
                .map(|s| s.as_str())
                .unwrap_or("config/server.toml");
            run_server(config_path).await
        }
    }
}

/// Initialize sites, sensors and channels from a JSON seed file.
fn run_init_catalog(config_path: &str, seed_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;
    let catalog = CatalogStore::new(&config.resolve(&config.catalog_db))?;

    let seed = SeedFile::load(seed_path)?;
    let channels_created = seed.apply(&catalog)?;

    tracing::info!(channels_created, "init-catalog completed");
    Ok(())
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = ServerConfig::load(config_path)?;

    tracing::info!(
        data_dir = %config.data_dir,
        poll_interval_secs = config.alarm.poll_interval_secs,
        "curamon-server starting"
    );

    let catalog = Arc::new(CatalogStore::new(&config.resolve(&config.catalog_db))?);
    let readings = Arc::new(ReadingStore::new(&config.resolve(&config.readings_db))?);

    let notifier: Arc<dyn AlarmNotifier> = match &config.push.api_key {
        Some(api_key) => Arc::new(PushNotifier::new(
            &config.push.endpoint,
            api_key,
            catalog.clone(),
        )),
        None => {
            tracing::warn!("No push api_key configured, alarm notifications are disabled");
            Arc::new(DisabledNotifier)
        }
    };

    let finder = AlarmFinder::new(
        catalog.clone(),
        readings,
        CheckpointStore::new(&config.resolve(&config.alarm.checkpoint_file)),
    )?;
    let manager = AlarmManager::new(
        finder,
        RegistryStore::new(&config.resolve(&config.alarm.registry_file)),
        catalog.clone(),
        catalog,
        notifier,
        Duration::from_secs(config.alarm.poll_interval_secs),
    )?;

    // Repair status rows left behind by a crash before alarms start flowing.
    manager.reconcile_sensor_status()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poll_handle = tokio::spawn(manager.run(shutdown_rx));

    tracing::info!("Server started");
    signal::ctrl_c().await?;
    tracing::info!("Shutting down gracefully");

    shutdown_tx.send(true)?;
    poll_handle.await?;
    tracing::info!("Server stopped");

    Ok(())
}
