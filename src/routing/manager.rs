//! Ownership and replacement of the live dispatch table.
//!
//! # Responsibilities
//! - Hand out the current table to request workers without locking
//! - Build new tables off the async workers and install them atomically
//! - Rebuild whenever the static root changes
//!
//! # Design Decisions
//! - Readers load an `Arc` from `ArcSwap`; a request that already holds a
//!   router finishes on it even if a newer table is installed meanwhile
//! - Installs are serialized and ordered by generation: a table older than
//!   the live one is discarded
//! - Handlers reach the manager through a `Weak` so the table does not keep
//!   its own owner alive

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::builder::TableBuilder;
use crate::routing::router::DispatchTable;
use crate::routing::watcher::StaticWatch;

/// Lets a burst of filesystem events settle before rebuilding.
const SETTLE: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RebuildTrigger {
    Startup,
    StaticAssets,
    Content,
}

impl RebuildTrigger {
    pub fn as_str(self) -> &'static str {
        match self {
            RebuildTrigger::Startup => "startup",
            RebuildTrigger::StaticAssets => "static_assets",
            RebuildTrigger::Content => "content",
        }
    }
}

pub struct RouteTableManager {
    builder: TableBuilder,
    static_dir: PathBuf,
    live: ArcSwap<DispatchTable>,
    install_lock: Mutex<()>,
    next_generation: AtomicU64,
}

impl RouteTableManager {
    /// Create a manager serving an empty table until the first rebuild.
    pub fn new(state: AppState, static_dir: impl Into<PathBuf>) -> Arc<Self> {
        let static_dir = static_dir.into();
        Arc::new_cyclic(|me| Self {
            builder: TableBuilder::new(state.with_tables(me.clone()), static_dir.clone()),
            static_dir,
            live: ArcSwap::from_pointee(DispatchTable::empty()),
            install_lock: Mutex::new(()),
            next_generation: AtomicU64::new(1),
        })
    }

    /// The live table.
    pub fn current(&self) -> Arc<DispatchTable> {
        self.live.load_full()
    }

    /// Build a table from the current storage and directory contents. The
    /// generation is assigned before the snapshot is taken.
    pub fn build(&self) -> DispatchTable {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        self.builder.build(generation)
    }

    /// Make `table` live unless a newer one already is. Returns whether it
    /// was installed.
    pub fn install(&self, table: DispatchTable) -> bool {
        let _guard = self.install_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let live = self.live.load();
        if table.generation() <= live.generation() {
            tracing::debug!(
                generation = table.generation(),
                live = live.generation(),
                "Discarding stale route table"
            );
            return false;
        }
        self.live.store(Arc::new(table));
        true
    }

    /// Build and install a new table. Requests keep being served from the
    /// previous table while the build runs.
    pub async fn rebuild(&self, trigger: RebuildTrigger) -> bool {
        let generation = self.next_generation.fetch_add(1, Ordering::SeqCst);
        let builder = self.builder.clone();
        let started = Instant::now();

        let table = match tokio::task::spawn_blocking(move || builder.build(generation)).await {
            Ok(table) => table,
            Err(e) => {
                tracing::error!(generation, error = %e, "Route table build failed, keeping current table");
                return false;
            }
        };

        let routes = table.entries().len();
        let installed = self.install(table);
        metrics::record_rebuild(trigger.as_str(), started.elapsed(), routes);
        if installed {
            tracing::info!(generation, routes, trigger = trigger.as_str(), "Route table installed");
        }
        installed
    }

    /// Start watching the static root. A missing root disables monitoring;
    /// routes keep being served without it.
    pub fn start_watch(&self) -> Option<StaticWatch> {
        match StaticWatch::start(&self.static_dir) {
            Ok(watch) => Some(watch),
            Err(e) => {
                tracing::warn!(error = %e, "Static asset monitoring disabled");
                None
            }
        }
    }

    /// Rebuild on every change below the static root until shutdown.
    ///
    /// `watch` is the first cycle and must be started before the table it
    /// guards is built. Each cycle waits for the first change, stops the
    /// watch, rebuilds, and starts a fresh watch.
    pub async fn watch_and_rebuild(self: Arc<Self>, mut watch: StaticWatch, mut shutdown: broadcast::Receiver<()>) {
        loop {
            let changed = tokio::select! {
                biased;
                _ = shutdown.recv() => None,
                changed = watch.changed() => Some(changed),
            };

            match changed {
                None => {
                    tracing::info!("Static asset watcher received shutdown signal, exiting loop");
                    return;
                }
                Some(false) => {
                    tracing::warn!("Static asset watcher stopped unexpectedly");
                    return;
                }
                Some(true) => {
                    tracing::debug!(dir = %self.static_dir.display(), "Change detected in static directory");
                    tokio::time::sleep(SETTLE).await;
                    watch.drain();
                    drop(watch);
                    self.rebuild(RebuildTrigger::StaticAssets).await;
                }
            }

            watch = match self.start_watch() {
                Some(watch) => watch,
                None => return,
            };
        }
    }
}
