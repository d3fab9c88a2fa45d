//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! Route builder    → page_routes()               (one query per rebuild)
//! Saved page route → page_by_route()             (per request)
//! Access guard     → page_by_route(), session_by_id(), touch_session()
//! Sweeper          → sessions(), delete_session() (per tick)
//! Admin handlers   → everything else
//! ```
//!
//! # Design Decisions
//! - `Store` is the only seam between the core and persistence; the core
//!   never assumes which backend sits behind it
//! - Lookups by key return `Ok(None)` for missing rows, so "not found" is
//!   never an error
//! - Every record is a plain value; callers get clones, never references
//!   into the store

pub mod memory;
pub mod seed;

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

pub use memory::MemoryStore;

/// Seconds since the unix epoch.
pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Errors surfaced by a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage is closed")]
    Closed,

    #[error("{entity} '{key}' already exists")]
    Conflict { entity: &'static str, key: String },

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// A persisted page, served at `route`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub uuid: String,
    pub author_uuid: String,
    pub title: String,
    pub route: String,
    pub content: String,
    pub role_protected: bool,
    pub created_at: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    Root,
    Regular,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uuid: String,
    pub username: String,
    /// Hex digest compared against the digest of the submitted password.
    pub auth_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: UserRole,
    pub created_at: u64,
}

/// Server-side record behind the `auth` cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub session_id: String,
    pub user_uuid: String,
    pub created_at: u64,
    pub last_active_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub uuid: String,
    pub title: String,
    pub created_at: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub group_uuid: String,
    pub user_uuid: String,
    pub created_at: u64,
}

/// Query/mutate interface over the persisted tables.
///
/// Implementations must be safe to call from any number of request workers
/// and background tasks at once.
pub trait Store: Send + Sync {
    fn pages(&self) -> Result<Vec<Page>, StoreError>;
    /// Distinct routes of every stored page.
    fn page_routes(&self) -> Result<Vec<String>, StoreError>;
    fn page_by_route(&self, route: &str) -> Result<Option<Page>, StoreError>;
    fn page_by_uuid(&self, uuid: &str) -> Result<Option<Page>, StoreError>;
    /// Fails with `Conflict` if another page already owns the route.
    fn insert_page(&self, page: Page) -> Result<(), StoreError>;
    /// Replaces the page with the same uuid.
    fn update_page(&self, page: Page) -> Result<(), StoreError>;
    fn delete_page(&self, uuid: &str) -> Result<bool, StoreError>;

    fn users(&self) -> Result<Vec<User>, StoreError>;
    fn user_by_uuid(&self, uuid: &str) -> Result<Option<User>, StoreError>;
    fn user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    /// Fails with `Conflict` if the username is taken.
    fn insert_user(&self, user: User) -> Result<(), StoreError>;
    fn delete_user(&self, uuid: &str) -> Result<bool, StoreError>;

    fn sessions(&self) -> Result<Vec<AuthSession>, StoreError>;
    fn session_by_id(&self, session_id: &str) -> Result<Option<AuthSession>, StoreError>;
    fn session_by_user(&self, user_uuid: &str) -> Result<Option<AuthSession>, StoreError>;
    /// Fails with `Conflict` if the user already has a session row.
    fn insert_session(&self, session: AuthSession) -> Result<(), StoreError>;
    /// Replaces the row owned by `session.user_uuid`; `NotFound` if there is none.
    fn replace_user_session(&self, session: AuthSession) -> Result<(), StoreError>;
    /// Sets `last_active_at`. Returns false if the session no longer exists.
    fn touch_session(&self, session_id: &str, at: u64) -> Result<bool, StoreError>;
    fn delete_session(&self, session_id: &str) -> Result<bool, StoreError>;

    fn groups(&self) -> Result<Vec<Group>, StoreError>;
    fn group_members(&self, group_uuid: &str) -> Result<Vec<GroupMembership>, StoreError>;
    fn insert_group(&self, group: Group) -> Result<(), StoreError>;
    fn add_group_member(&self, membership: GroupMembership) -> Result<(), StoreError>;

    /// Flush and release the backend. Later calls fail with `Closed`.
    fn close(&self) -> Result<(), StoreError>;
}
