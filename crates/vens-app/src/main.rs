//! Vens application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Open the reminder store (SQLite or in-memory)
//! 3. Install notification categories with the local notifier
//! 4. Start the delivery loop and the background sweep
//! 5. Serve the method channel over HTTP until ctrl-c

mod cli;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc::UnboundedReceiver;

use vens_api::routes;
use vens_api::state::AppState;
use vens_core::config::{StorageBackend, VensConfig};
use vens_core::types::{Clock, SystemClock};
use vens_reminder::{
    BackgroundSweep, CategoryRegistry, LocalNotifier, NotifierEvent, SchedulerCore, SweepLaunch,
    TokioTaskFacility,
};
use vens_storage::{Database, MemoryReminderStore, ReminderStore, SqliteReminderStore};

use cli::CliArgs;

/// Route notifier deliveries back into the scheduler.
async fn delivery_loop(
    scheduler: Arc<SchedulerCore>,
    mut events: UnboundedReceiver<NotifierEvent>,
) {
    while let Some(event) = events.recv().await {
        match event {
            NotifierEvent::Fired { id, fire_at } => {
                match scheduler.on_fired(id, Some(fire_at)).await {
                    Ok(true) => tracing::debug!(id = %id, "Delivery recorded"),
                    Ok(false) => tracing::debug!(id = %id, %fire_at, "Stale delivery ignored"),
                    Err(e) => tracing::warn!(id = %id, error = %e, "Delivery not recorded"),
                }
            }
        }
    }
    tracing::info!("Notifier closed; delivery loop stopped");
}

/// Run each sweep the task facility launches.
async fn sweep_loop(sweep: Arc<BackgroundSweep>, mut launches: UnboundedReceiver<SweepLaunch>) {
    while let Some(launch) = launches.recv().await {
        tracing::debug!(not_before = %launch.request.not_before, "Background sweep starting");
        if let Err(e) = sweep.run_sweep(&launch.cancel).await {
            tracing::warn!(error = %e, "Background sweep failed");
        }
    }
}

/// Expand ~ to the home directory.
fn resolve_data_dir(data_dir: &str) -> PathBuf {
    if data_dir.starts_with("~/") || data_dir.starts_with("~\\") {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(&data_dir[2..])
    } else {
        PathBuf::from(data_dir)
    }
}

fn open_store(config: &VensConfig) -> Result<Arc<dyn ReminderStore>, Box<dyn std::error::Error>> {
    match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("Using in-memory reminder store");
            Ok(Arc::new(MemoryReminderStore::new()))
        }
        StorageBackend::Sqlite => {
            let data_dir = resolve_data_dir(&config.general.data_dir);
            if let Err(e) = std::fs::create_dir_all(&data_dir) {
                tracing::error!(path = %data_dir.display(), error = %e, "Failed to create data directory");
                return Err(e.into());
            }
            let db_path = data_dir.join(&config.storage.db_file);
            let db = Database::new(&db_path)?;
            tracing::info!(path = %db_path.display(), "SQLite database opened");
            Ok(Arc::new(SqliteReminderStore::new(Arc::new(db))))
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = VensConfig::load_or_default(&config_file);
    config.api.port = args.resolve_port(config.api.port);
    if let Some(dir) = args.resolve_data_dir() {
        config.general.data_dir = dir;
    }
    if args.memory {
        config.storage.backend = StorageBackend::Memory;
    }

    // Tracing.
    let filter = args.resolve_log_filter(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Vens v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Storage.
    let store = open_store(&config)?;

    // Notifier and categories.
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let (notifier, deliveries) = LocalNotifier::with_clock(&config.notifier, Arc::clone(&clock));
    let registry = Arc::new(CategoryRegistry::standard());
    registry.register_all(notifier.as_ref()).await?;

    // Scheduler.
    let scheduler = Arc::new(SchedulerCore::from_config(
        &config.scheduler,
        store,
        notifier.clone(),
        Arc::clone(&clock),
    )?);
    tracing::info!(
        active = scheduler.active_reminders()?.len(),
        "Scheduler ready"
    );

    // === Background tasks ===

    tokio::spawn(delivery_loop(Arc::clone(&scheduler), deliveries));

    let sweep = if config.sweep.enabled {
        let (facility, launches) = TokioTaskFacility::new(
            Arc::clone(&clock),
            Duration::from_secs(config.sweep.budget_secs),
        );
        let sweep = Arc::new(BackgroundSweep::new(
            Arc::clone(&scheduler),
            facility,
            &config.sweep,
        ));
        tokio::spawn(sweep_loop(Arc::clone(&sweep), launches));
        let next = sweep.schedule_next().await?;
        tracing::info!(next_run = %next, "Background sweep scheduled");
        Some(sweep)
    } else {
        tracing::info!("Background sweep disabled in config");
        None
    };

    // === API server ===

    if !config.api.enabled {
        tracing::info!("API server disabled; running until ctrl-c");
        tokio::signal::ctrl_c().await?;
        return Ok(());
    }

    let state = AppState::new(Arc::clone(&scheduler), registry, sweep);
    tokio::select! {
        result = routes::start_server(&config, state) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "API server stopped");
                tracing::error!("Try: VENS_PORT={} vens", config.api.port.saturating_add(1));
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown requested");
        }
    }

    Ok(())
}
