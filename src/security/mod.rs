//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Matched request:
//!     → access_control.rs (classify path, resolve session)
//!     → Protected + no session: 403, stale auth cookie cleared
//!     → Otherwise: pass to handler with CurrentUser attached
//! ```
//!
//! # Design Decisions
//! - Fail closed: a path whose protection cannot be determined is protected
//! - Protection is decided per request from storage, never cached in the
//!   route table

pub mod access_control;

pub use access_control::{access_control_middleware, classify, Protection};
