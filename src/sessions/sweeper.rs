//! Periodic removal of aged auth sessions.
//!
//! # Responsibilities
//! - Wake up every `sweep_interval_secs`
//! - Delete session rows created more than `max_age_secs` ago
//! - Exit promptly on shutdown, without a final sweep

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::config::SessionConfig;
use crate::observability::metrics;
use crate::storage::{unix_now, Store};

pub struct SessionSweeper {
    store: Arc<dyn Store>,
    interval: Duration,
    max_age: Duration,
}

impl SessionSweeper {
    pub fn new(store: Arc<dyn Store>, interval: Duration, max_age: Duration) -> Self {
        Self {
            store,
            interval,
            max_age,
        }
    }

    pub fn from_config(store: Arc<dyn Store>, config: &SessionConfig) -> Self {
        Self::new(
            store,
            Duration::from_secs(config.sweep_interval_secs),
            Duration::from_secs(config.max_age_secs),
        )
    }

    /// Delete every session older than the max age as of `now` (unix
    /// seconds). Returns how many rows were removed.
    ///
    /// A row that fails to delete is logged and skipped; the rest of the
    /// sweep continues.
    pub fn sweep_at(&self, now: u64) -> usize {
        let sessions = match self.store.sessions() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!(error = %e, "Session sweep could not list sessions");
                return 0;
            }
        };

        let max_age = self.max_age.as_secs();
        let mut removed = 0;
        for session in sessions
            .iter()
            .filter(|s| now.saturating_sub(s.created_at) > max_age)
        {
            match self.store.delete_session(&session.session_id) {
                Ok(true) => removed += 1,
                // Already gone: logout or a concurrent re-login got there first.
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(user = %session.user_uuid, error = %e, "Failed to delete aged session");
                }
            }
        }

        if removed > 0 {
            tracing::info!(removed, "Swept aged sessions");
        }
        metrics::record_sessions_swept(removed);
        removed
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(unix_now())
    }

    /// Sweep every interval until shutdown. The first sweep happens one
    /// interval after start.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) {
        let first_tick = Instant::now() + self.interval;
        self.run_from(first_tick, shutdown).await
    }

    pub(crate) async fn run_from(self, first_tick: Instant, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            interval = self.interval.as_secs(),
            max_age = self.max_age.as_secs(),
            "Session sweeper starting"
        );

        let mut ticker = time::interval_at(first_tick, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                // A pending stop wins over a due tick.
                biased;
                _ = shutdown.recv() => {
                    tracing::info!("Session sweeper received shutdown signal, exiting loop");
                    break;
                }
                _ = ticker.tick() => {
                    self.sweep();
                }
            }
        }
    }

    pub fn spawn(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
