//! PulseKeeper -- multi-account keep-alive service for free-tier app platforms.
//!
//! This crate provides the account registry, the keep-alive orchestrator, a
//! persistent status store, a cron scheduler, and the HTTP trigger surface
//! with its dashboard.

pub mod accounts;
pub mod api;
pub mod config;
pub mod dashboard;
pub mod keepalive;
pub mod scheduler;
pub mod store;

use std::sync::Arc;

use anyhow::Result;

use crate::accounts::AccountSources;
use crate::config::Settings;
use crate::keepalive::probe::{HttpPlatformProbe, PlatformProbe};
use crate::store::{SqliteKv, StatusStore};

/// Start the PulseKeeper daemon: API server plus the cron scheduler.
pub async fn serve(bind: &str, settings: Settings) -> Result<()> {
    let sources = AccountSources::from_env();
    let accounts = accounts::resolve(&sources);
    tracing::info!(accounts = accounts.len(), "resolved account registry");

    let store = match settings.store_path.as_deref() {
        Some(path) => {
            tracing::info!(%path, "opening status store");
            let kv = SqliteKv::open(path)?;
            StatusStore::new(Some(Arc::new(kv)), settings.history_limit)
        }
        None => {
            tracing::warn!("no status store configured, runs will not be persisted");
            StatusStore::unbound()
        }
    };

    let schedule = scheduler::parse_schedule(&settings.schedule)?;
    let probe: Arc<dyn PlatformProbe> = Arc::new(HttpPlatformProbe::new(settings.status_url.clone()));

    tokio::spawn(scheduler::run_scheduler_loop(
        schedule,
        sources.clone(),
        probe.clone(),
        store.clone(),
    ));

    let state = api::state::AppState {
        sources,
        probe,
        store,
    };

    let addr: std::net::SocketAddr = bind.parse()?;
    let app = api::router(state);

    tracing::info!(%addr, "PulseKeeper listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
