//! Ticpass Simulator - Main Entry Point
//! Runs a scripted POS session against a simulated MIFARE Classic card

mod config;
mod monitor;
mod responder;
mod session;

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import workspace crates
use config::{LogFormat, SimulatorConfig, DEFAULT_QUEUE};
use responder::Operator;
use ticpass_core::application::HybridQueueManager;
use ticpass_core::port::queue_storage::memory::InMemoryQueueStorage;
use ticpass_core::port::time_provider::SystemTimeProvider;
use ticpass_core::port::{QueueStorage, TimeProvider};
use ticpass_infra_sqlite::{create_pool, run_migrations, SqliteQueueStorage};
use ticpass_nfc::transport::SimulatedTag;
use ticpass_nfc::{NfcConfig, NfcProcessor, NfcQueueItem, TagTransport};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const DEMO_UID: [u8; 4] = [0x04, 0xA2, 0x3B, 0x91];
/// The simulated card is always in the field, no need to wait long
const DETECT_TIMEOUT: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load configuration
    let config = SimulatorConfig::from_env()?;

    // 2. Initialize logging
    init_logging(config.log_format)?;
    info!("Ticpass simulator v{} starting...", VERSION);

    // 3. Storage (SQLite unless persistence is off)
    let time_provider: Arc<dyn TimeProvider> = Arc::new(SystemTimeProvider);
    let storage: Arc<dyn QueueStorage<NfcQueueItem>> = if config.manager.persists() {
        if let Some(parent) = Path::new(&config.db_path).parent() {
            std::fs::create_dir_all(parent)?;
        }
        info!(db_path = %config.db_path, "Initializing database...");

        let pool = create_pool(&config.db_path)
            .await
            .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
        run_migrations(&pool)
            .await
            .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;
        Arc::new(SqliteQueueStorage::new(pool, DEFAULT_QUEUE, time_provider))
    } else {
        info!("Persistence disabled, queue is memory only");
        Arc::new(InMemoryQueueStorage::new())
    };

    // 4. Setup dependencies (DI wiring)
    let tag = Arc::new(SimulatedTag::classic_1k(DEMO_UID));
    let nfc_config = NfcConfig {
        detect_timeout: DETECT_TIMEOUT,
        ..NfcConfig::default()
    };
    let processor = Arc::new(NfcProcessor::new(tag as Arc<dyn TagTransport>, nfc_config));
    let manager = HybridQueueManager::new(storage, processor, config.manager.clone());

    // 5. Pick up whatever a previous session left behind
    let restored = manager.restore().await?;
    if restored > 0 {
        info!(restored, "Restored items from previous session");
    }

    // 6. Operator and monitor subscribe before anything can prompt
    let responder = responder::spawn(manager.clone(), Arc::new(Operator::new()));
    let monitor = monitor::spawn(&manager);

    for item in session::scripted_session() {
        manager.enqueue(item);
    }
    info!(items = manager.len(), "Session queued");
    manager.start_processing();

    // 7. Run to completion or until Ctrl+C
    tokio::select! {
        _ = manager.join() => info!("Session finished"),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            info!("Shutdown signal received. Aborting...");
            manager.abort().await;
        }
    }

    // 8. Report and clean up
    let saved = manager.persist_pending_items().await;
    if saved > 0 {
        info!(saved, "Unsaved queue items written before shutdown");
    }
    let progress = manager.progress().await?;
    info!(
        processed = progress.full_size.saturating_sub(progress.enqueued_size),
        remaining = progress.enqueued_size,
        "Queue progress"
    );
    let cleared = manager.clear_completed().await?;
    manager.flush_storage().await;

    responder.abort();
    monitor.abort();
    info!(cleared, "Shutdown complete.");

    Ok(())
}

fn init_logging(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("ticpass=info"))?;

    match format {
        LogFormat::Json => {
            // Production: JSON structured logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .init();
        }
        LogFormat::Pretty => {
            // Development: Pretty formatting with colors
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().pretty())
                .init();
        }
    }
    Ok(())
}
