//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Open storage → (dev) wipe + seed → Build first route table → Bind
//!     → Spawn watcher + sweeper → Serve
//!
//! Shutdown:
//!     Signal received (signals.rs)
//!     → Shutdown::trigger (shutdown.rs) → await watcher + sweeper
//!     → Drain in-flight requests (bounded) → Close storage
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last, after the first table is live
//! - Background tasks stop before requests drain; storage closes last

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
