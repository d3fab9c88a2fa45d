//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request
//!     → RouteTableManager::current() (lock-free load)
//!     → DispatchTable router: admin routes, static prefixes, page routes
//!     → access guard (route_layer) → handler
//!
//! Table Rebuild (startup, static dir change, page edit):
//!     admin routes + read_dir(static root) + storage page routes
//!     → TableBuilder::build (blocking pool)
//!     → RouteTableManager::install (generation-ordered swap)
//! ```
//!
//! # Design Decisions
//! - Tables are immutable; changes produce a whole new table
//! - Stored routes are literal paths, never patterns
//! - Unmatched paths are 404 and never reach the guard

pub mod builder;
pub mod handler;
pub mod manager;
pub mod matcher;
pub mod router;
pub mod watcher;

pub use handler::RouteHandler;
pub use manager::{RebuildTrigger, RouteTableManager};
pub use router::{DispatchTable, RouteEntry};
