//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! Request cookies → SessionStore::load(namespace) → CookieSession
//!     "auth"       → sessionuuid → storage AuthSession → User
//!     "forms"      → one token per form, consumed on submit
//!     "passerrmsg" → one-shot login error
//!
//! SessionSweeper ──(every interval)──► delete rows older than max age
//! ```
//!
//! # Design Decisions
//! - Cookies are signed, not encrypted; they hold only opaque tokens
//! - A user has at most one auth session row; logging in again replaces it
//! - An unverifiable cookie is treated the same as no cookie

pub mod auth;
pub mod cookie;
pub mod sweeper;

pub use auth::{CurrentUser, SessionLookup};
pub use cookie::{CookieSession, SessionError, SessionStore};
pub use sweeper::SessionSweeper;
