use fieldcam::clock::SystemClock;
use fieldcam::config::AppConfig;
use fieldcam::database::LocalStore;
use fieldcam::error::AppResult;
use fieldcam::network::{Connectivity, NetworkMonitor};
use fieldcam::remote::HttpRemote;
use fieldcam::services::{SyncEvent, SyncManager};
use media_library::MediaLibraryConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let config_path = AppConfig::resolve_path(std::env::args().nth(1));
    let config = AppConfig::load(&config_path)?;
    log::info!("Using remote {}", config.remote.base_url);

    let media_config = MediaLibraryConfig {
        display_cache_dir: config
            .storage
            .display_cache_dir
            .to_string_lossy()
            .into_owned(),
        ..Default::default()
    };
    let thumbnail_size = media_config.thumbnail_size;
    let store = Arc::new(LocalStore::open(
        &config.storage.database_path,
        config.sync.max_queue_size,
        media_config,
    )?);
    log::info!(
        "Opened {:?} with {} queued mutations",
        config.storage.database_path,
        store.get_queue_size().await?
    );

    let remote = Arc::new(HttpRemote::new(&config.remote)?);
    let network = NetworkMonitor::new(Connectivity::Offline);
    let manager = SyncManager::new(
        store,
        remote.clone(),
        network.clone(),
        SystemClock,
        config.sync.clone(),
        thumbnail_size,
    );

    let reachable = if config.network.metered {
        Connectivity::Cellular
    } else {
        Connectivity::Wifi
    };
    let probe_interval = Duration::from_secs(config.network.probe_interval_secs.max(1));
    let probe = async {
        let mut ticker = tokio::time::interval(probe_interval);
        loop {
            ticker.tick().await;
            let observed = if remote.probe().await {
                reachable
            } else {
                Connectivity::Offline
            };
            network.set(observed);
        }
    };

    let mut events = manager.subscribe();
    let report = async move {
        loop {
            match events.recv().await {
                Ok(SyncEvent::SyncProgress { progress }) => log::debug!(
                    "Batch {}: {}/{} processed",
                    progress.batch_index,
                    progress.processed,
                    progress.total
                ),
                Ok(SyncEvent::ItemError { error }) => {
                    log::warn!("{} {}: {}", error.item_type, error.local_id, error.message)
                }
                Ok(SyncEvent::SyncComplete { result }) => {
                    log::info!("Synced {} items", result.synced)
                }
                Ok(SyncEvent::SyncError { error, .. }) => log::warn!("Sync error: {}", error),
                Err(RecvError::Lagged(missed)) => log::debug!("Missed {} sync events", missed),
                Err(RecvError::Closed) => break,
            }
        }
    };

    tokio::select! {
        _ = manager.run(shutdown_signal()) => {}
        _ = probe => {}
        _ = report => {}
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => log::info!("Shutting down"),
        Err(e) => {
            log::error!("Cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
