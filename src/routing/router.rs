//! Immutable dispatch tables.
//!
//! # Responsibilities
//! - Hold one generation of route entries and the compiled router
//! - Describe what the table can reach, independent of axum internals
//!
//! # Design Decisions
//! - Immutable after construction; shared between requests via `Arc`
//! - Generations increase with every build so a slow build can never
//!   replace a newer one
//! - Entries are kept alongside the compiled router so tests and logs can
//!   inspect the table without issuing requests

use std::collections::BTreeSet;

use axum::http::Method;
use axum::Router;

use crate::http::response::not_found;
use crate::routing::handler::RouteHandler;

/// One (pattern, methods) → handler binding.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub pattern: String,
    pub methods: Vec<Method>,
    pub handler: RouteHandler,
    /// Whether the guard will require a session on this pattern as of build
    /// time. The guard re-checks on every request.
    pub protected: bool,
}

impl RouteEntry {
    pub fn new(pattern: impl Into<String>, handler: RouteHandler, protected: bool) -> Self {
        Self {
            pattern: pattern.into(),
            methods: handler.methods(),
            handler,
            protected,
        }
    }

    /// Whether `path` is served by this entry.
    pub fn covers(&self, path: &str) -> bool {
        if self.handler.is_prefix() {
            path == self.pattern
                || path
                    .strip_prefix(self.pattern.as_str())
                    .is_some_and(|rest| rest.starts_with('/'))
        } else {
            path == self.pattern
        }
    }
}

/// A reachable route, as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Reachable {
    pub pattern: String,
    pub methods: Vec<String>,
    pub prefix: bool,
    pub protected: bool,
}

pub struct DispatchTable {
    generation: u64,
    entries: Vec<RouteEntry>,
    router: Router,
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchTable")
            .field("generation", &self.generation)
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl DispatchTable {
    pub fn new(generation: u64, entries: Vec<RouteEntry>, router: Router) -> Self {
        Self {
            generation,
            entries,
            router,
        }
    }

    /// Placeholder served until the first build completes. Every path is 404.
    pub fn empty() -> Self {
        Self::new(0, Vec::new(), Router::new().fallback(not_found))
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn entries(&self) -> &[RouteEntry] {
        &self.entries
    }

    /// Handle to the compiled router. Cloning is cheap and keeps the
    /// handlers alive for the caller even after this table is replaced.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn entry(&self, pattern: &str) -> Option<&RouteEntry> {
        self.entries.iter().find(|e| e.pattern == pattern)
    }

    /// Everything a client can reach through this table. Two builds over the
    /// same storage and directory contents produce equal sets.
    pub fn reachable(&self) -> BTreeSet<Reachable> {
        self.entries
            .iter()
            .map(|e| Reachable {
                pattern: e.pattern.clone(),
                methods: e.methods.iter().map(|m| m.to_string()).collect(),
                prefix: e.handler.is_prefix(),
                protected: e.protected,
            })
            .collect()
    }
}
