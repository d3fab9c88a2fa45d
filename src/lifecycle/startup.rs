//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize all subsystems in dependency order
//! - Start background tasks (static watcher, session sweeper)
//! - Bind the listener and serve until a shutdown signal
//! - Tear everything down in reverse order
//!
//! # Design Decisions
//! - `Application::build` does everything that can fail before traffic is
//!   accepted; `run_until` only serves and shuts down
//! - The shutdown future is injected so tests can stop the server without
//!   sending signals

use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::AppConfig;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::signals::shutdown_signal;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::routing::watcher::StaticWatch;
use crate::routing::{RebuildTrigger, RouteTableManager};
use crate::sessions::{SessionStore, SessionSweeper};
use crate::storage::seed::seed_test_data;
use crate::storage::{MemoryStore, Store, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("listener error: {0}")]
    Io(#[from] std::io::Error),
}

/// A fully initialized server that has not started serving yet.
pub struct Application {
    config: AppConfig,
    store: Arc<MemoryStore>,
    tables: Arc<RouteTableManager>,
    watch: Option<StaticWatch>,
    listener: TcpListener,
}

impl Application {
    pub async fn build(config: AppConfig, dev: bool) -> Result<Self, StartupError> {
        let store = Arc::new(MemoryStore::open(config.storage.path.as_deref().map(Path::new))?);
        if dev {
            tracing::warn!("Development mode: wiping storage and seeding test data");
            store.wipe()?;
            seed_test_data(store.as_ref())?;
        }

        let sessions = Arc::new(SessionStore::new(
            &config.sessions.secret,
            config.sessions.cookie_max_age_secs,
        ));
        let state = AppState::new(store.clone(), sessions);
        let tables = RouteTableManager::new(state, &config.static_assets.dir);
        // Armed before the first build so a change made during it still
        // triggers a rebuild.
        let watch = if config.static_assets.watch {
            tables.start_watch()
        } else {
            None
        };
        tables.rebuild(RebuildTrigger::Startup).await;

        let listener = TcpListener::bind(&config.server.bind_address).await?;
        tracing::info!(address = %listener.local_addr()?, "Listening for connections");

        Ok(Self {
            config,
            store,
            tables,
            watch,
            listener,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn tables(&self) -> Arc<RouteTableManager> {
        self.tables.clone()
    }

    pub fn store(&self) -> Arc<MemoryStore> {
        self.store.clone()
    }

    /// Serve until `signal` resolves, then shut down in order: background
    /// tasks, in-flight requests, storage.
    pub async fn run_until(self, signal: impl Future<Output = ()>) -> Result<(), StartupError> {
        let Self {
            config,
            store,
            tables,
            watch,
            listener,
        } = self;

        let shutdown = Shutdown::new();
        let watcher = watch.map(|watch| tokio::spawn(tables.clone().watch_and_rebuild(watch, shutdown.subscribe())));
        let sweeper = SessionSweeper::from_config(store.clone(), &config.sessions).spawn(shutdown.subscribe());

        let (drain_tx, drain_rx) = oneshot::channel::<()>();
        let server = HttpServer::new(tables, &config.server);
        let mut serving = tokio::spawn(server.run(listener, async move {
            let _ = drain_rx.await;
        }));

        let early_exit = tokio::select! {
            _ = signal => None,
            result = &mut serving => Some(result),
        };

        tracing::info!("Shutting down");
        shutdown.trigger();
        if let Some(watcher) = watcher {
            if let Err(e) = watcher.await {
                tracing::warn!(error = %e, "Static asset watcher ended abnormally");
            }
        }
        if let Err(e) = sweeper.await {
            tracing::warn!(error = %e, "Session sweeper ended abnormally");
        }

        let served = match early_exit {
            Some(result) => result,
            None => {
                let _ = drain_tx.send(());
                let grace = Duration::from_secs(config.server.shutdown_grace_secs);
                match tokio::time::timeout(grace, &mut serving).await {
                    Ok(result) => result,
                    Err(_) => {
                        tracing::warn!(grace_secs = grace.as_secs(), "Grace period elapsed, abandoning in-flight requests");
                        serving.abort();
                        Ok(Ok(()))
                    }
                }
            }
        };

        let closed = store.close();
        match served {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(e) => tracing::error!(error = %e, "HTTP server task failed"),
        }
        closed?;

        tracing::info!("Shutdown complete");
        Ok(())
    }
}

/// Composition root: build everything from `config` and serve until SIGINT
/// or SIGTERM.
pub async fn run(config: AppConfig, dev: bool) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = Application::build(config, dev).await?;
    app.run_until(shutdown_signal()).await
}
