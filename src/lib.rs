//! Content server library.
//!
//! Serves stored pages and static directories behind a session-based access
//! guard, with an admin UI for managing pages, users and groups.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (request id, trace, timeout)
//!                         │
//!                         ▼
//!                     routing::RouteTableManager::current()
//!                         │            ▲
//!                         │            │ install (generation ordered)
//!                         ▼            │
//!                     DispatchTable ◀── routing::builder ◀── storage pages
//!                         │                    ▲             static dir listing
//!                         ▼                    │
//!                     security::access_control │ rebuild on
//!                         │                    │ - startup
//!                         ▼                    │ - static dir change (watcher)
//!                     admin / saved page /     │ - page create/edit/delete
//!                     static file handler ─────┘
//!
//!     Background: sessions::SessionSweeper, routing watcher loop
//!     Cross-cutting: config, observability, lifecycle
//! ```

pub mod admin;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod security;
pub mod sessions;
pub mod storage;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
