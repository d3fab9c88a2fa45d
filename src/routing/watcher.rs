//! Change notification for the static asset root.
//!
//! A `StaticWatch` covers one observation cycle: it is started, reports the
//! first change, and is dropped before the rebuild it triggers. Dropping
//! the watch unregisters the OS watcher.

use std::path::{Path, PathBuf};

use notify::event::EventKind;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("static directory {0} does not exist")]
    MissingDir(PathBuf),

    #[error("failed to watch static directory: {0}")]
    Notify(#[from] notify::Error),
}

pub struct StaticWatch {
    _watcher: RecommendedWatcher,
    changes: mpsc::UnboundedReceiver<()>,
}

impl StaticWatch {
    /// Start watching `dir` and everything below it.
    pub fn start(dir: &Path) -> Result<Self, WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::MissingDir(dir.to_path_buf()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if is_structural(&event.kind) => {
                    let _ = tx.send(());
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = %e, "Static directory watch error"),
            },
            Config::default(),
        )?;
        watcher.watch(dir, RecursiveMode::Recursive)?;

        Ok(Self {
            _watcher: watcher,
            changes: rx,
        })
    }

    /// Wait for the next change. Returns false if the watcher died.
    pub async fn changed(&mut self) -> bool {
        self.changes.recv().await.is_some()
    }

    /// Discard changes already queued.
    pub fn drain(&mut self) {
        while self.changes.try_recv().is_ok() {}
    }
}

/// Reads (including our own file serving) never warrant a rebuild.
fn is_structural(kind: &EventKind) -> bool {
    matches!(
        kind,
        EventKind::Create(_) | EventKind::Remove(_) | EventKind::Modify(_) | EventKind::Any
    )
}
