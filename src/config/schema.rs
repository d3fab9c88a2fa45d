//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the content server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP listener settings.
    pub server: ServerConfig,

    /// Where content, users and sessions are persisted.
    pub storage: StorageConfig,

    /// Static asset directory and change monitoring.
    pub static_assets: StaticAssetsConfig,

    /// Cookie signing and session lifetime settings.
    pub sessions: SessionConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Request timeout (total time for request/response) in seconds.
    pub request_timeout_secs: u64,

    /// How long shutdown waits for in-flight requests to drain.
    pub shutdown_grace_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 15,
            shutdown_grace_secs: 15,
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StorageConfig {
    /// JSON snapshot file. `None` keeps everything in memory.
    pub path: Option<String>,
}

/// Static asset configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StaticAssetsConfig {
    /// Directory whose immediate subdirectories are served as path prefixes.
    pub dir: String,

    /// Rebuild the route table when the directory changes.
    pub watch: bool,
}

impl Default for StaticAssetsConfig {
    fn default() -> Self {
        Self {
            dir: "static".to_string(),
            watch: true,
        }
    }
}

/// Session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Secret the cookie signing key is derived from.
    pub secret: String,

    /// How often the sweeper wakes up, in seconds.
    pub sweep_interval_secs: u64,

    /// Sessions created longer ago than this are deleted by the sweeper.
    pub max_age_secs: u64,

    /// Lifetime of the session cookies themselves.
    pub cookie_max_age_secs: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Change this in production.
            secret: "CHANGE_ME_IN_PRODUCTION".to_string(),
            sweep_interval_secs: 60,
            max_age_secs: 20 * 60,
            cookie_max_age_secs: 30 * 24 * 60 * 60,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
