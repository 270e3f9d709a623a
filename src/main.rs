use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

use markup_search::api;
use markup_search::config::Config;
use markup_search::state::AppState;
use markup_search::sync::SyncCoordinator;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();
    tracing::info!("Data directory: {}", config.data_dir.display());
    match &config.index_dir {
        Some(dir) => tracing::info!("Index directory: {}", dir.display()),
        None => tracing::info!("Index kept in memory"),
    }

    let state = AppState::new(config.clone())?;
    let mut release = state.release_list();

    let updater = tokio::spawn(run_updater(state.sync.clone(), config.update_interval()));
    release.push("updater task", move || {
        updater.abort();
        Ok(())
    });

    let app = Router::new()
        .route("/api/search", get(api::search::search))
        .route("/api/toc", get(api::search::toc))
        .route("/api/docs/{*key}", get(api::search::get_document))
        .route("/api/files/{*key}", get(api::search::get_file))
        .route("/api/update", post(api::update::update))
        .route("/api/status", get(api::update::status))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!("Server listening on {}", config.bind_addr);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Received shutdown signal, shutting down");
        })
        .await;

    let failed = tokio::task::spawn_blocking(move || release.run()).await?;
    if failed > 0 {
        tracing::warn!("{failed} release steps failed");
    }
    served?;
    Ok(())
}

/// Sync once at startup, then every `interval` if one is set.
async fn run_updater(sync: Arc<SyncCoordinator>, interval: Option<Duration>) {
    let Some(interval) = interval else {
        sync_once(&sync).await;
        return;
    };

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        ticker.tick().await;
        sync_once(&sync).await;
    }
}

async fn sync_once(sync: &Arc<SyncCoordinator>) {
    let sync = sync.clone();
    match tokio::task::spawn_blocking(move || sync.update_and_reconcile()).await {
        Ok(Ok(report)) => tracing::info!(
            head = ?report.head,
            upserted = report.upserted,
            deleted = report.deleted,
            skipped = report.skipped,
            reconciled = report.reconciled,
            "Periodic update finished"
        ),
        Ok(Err(e)) => tracing::error!("Periodic update failed: {e}"),
        Err(e) => tracing::error!("Periodic update task failed: {e}"),
    }
}
