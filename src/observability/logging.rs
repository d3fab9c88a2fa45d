//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once at startup
//! - Honour `RUST_LOG` over the configured level
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `--debug` raises the level for this crate and tower_http

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(level: &str, debug: bool) -> String {
    let level = if debug { "debug" } else { level };
    format!("content_server={level},tower_http={level}")
}

/// Install the global subscriber. Returns false if one was already set.
pub fn init(level: &str, debug: bool) -> bool {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_directive(level, debug).into()))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_flag_overrides_level() {
        assert_eq!(default_directive("warn", false), "content_server=warn,tower_http=warn");
        assert_eq!(default_directive("warn", true), "content_server=debug,tower_http=debug");
    }
}
