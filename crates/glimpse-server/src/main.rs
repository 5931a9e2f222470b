mod config;
mod sweep;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use glimpse_api::AppStateInner;
use glimpse_db::Database;
use glimpse_stories::{
    MemoryProfiles, MemoryStore, ProfileDirectory, SqliteProfiles, SqliteStore, StorySnapshot,
    StoryService, StoryStore, SystemClock,
};

use crate::config::{Config, StoreKind};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "glimpse=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Memory store is kept concrete so it can be snapshotted on shutdown
    let mut memory_store: Option<Arc<MemoryStore>> = None;
    let (store, profiles): (Arc<dyn StoryStore>, Arc<dyn ProfileDirectory>) = match config.store {
        StoreKind::Sqlite => {
            let db = Arc::new(Database::open(&config.db_path)?);
            let store: Arc<dyn StoryStore> = Arc::new(SqliteStore::new(db.clone()));
            let profiles: Arc<dyn ProfileDirectory> = Arc::new(SqliteProfiles::new(db));
            (store, profiles)
        }
        StoreKind::Memory => {
            let memory = Arc::new(load_memory_store(config.snapshot_path.as_deref()).await?);
            memory_store = Some(memory.clone());
            let store: Arc<dyn StoryStore> = memory;
            let profiles: Arc<dyn ProfileDirectory> = Arc::new(MemoryProfiles::new());
            (store, profiles)
        }
    };

    let service = StoryService::new(store, profiles.clone(), Arc::new(SystemClock));

    tokio::spawn(sweep::run_sweep_loop(service.clone(), config.sweep_interval_secs));

    let state = Arc::new(AppStateInner {
        service,
        profiles,
        jwt_secret: config.jwt_secret.clone(),
    });
    let app = glimpse_api::router(state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Glimpse server listening on {} ({:?} store)", addr, config.store);
    info!("Expiry sweep every {} seconds", config.sweep_interval_secs);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let (Some(memory), Some(path)) = (memory_store, config.snapshot_path.as_deref()) {
        let snapshot = StorySnapshot::capture(&memory, chrono::Utc::now());
        if let Err(e) = snapshot.save_json(path).await {
            warn!("Failed to save snapshot to {}: {}", path.display(), e);
        }
    }

    Ok(())
}

async fn load_memory_store(snapshot_path: Option<&Path>) -> anyhow::Result<MemoryStore> {
    match snapshot_path {
        Some(path) if path.exists() => {
            let snapshot = StorySnapshot::load_json(path).await?;
            info!("Loaded {} stories from {}", snapshot.stories.len(), path.display());
            Ok(snapshot.into_store())
        }
        _ => Ok(MemoryStore::new()),
    }
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
                }
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                ctrl_c.await.ok();
                info!("Received Ctrl+C, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
