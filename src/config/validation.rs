//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (intervals > 0, addresses parse)
//! - Reject placeholder-length cookie secrets
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::AppConfig;

/// Shortest accepted cookie signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 16;

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a parsed configuration for values serde cannot reject on its own.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.server.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "server.bind_address",
            format!("'{}' is not a socket address", config.server.bind_address),
        ));
    }
    if config.server.request_timeout_secs == 0 {
        errors.push(ValidationError::new("server.request_timeout_secs", "must be greater than 0"));
    }

    if config.static_assets.dir.trim().is_empty() {
        errors.push(ValidationError::new("static_assets.dir", "must not be empty"));
    }

    if config.sessions.secret.len() < MIN_SECRET_LEN {
        errors.push(ValidationError::new(
            "sessions.secret",
            format!("must be at least {} bytes", MIN_SECRET_LEN),
        ));
    }
    if config.sessions.sweep_interval_secs == 0 {
        errors.push(ValidationError::new("sessions.sweep_interval_secs", "must be greater than 0"));
    }
    if config.sessions.max_age_secs == 0 {
        errors.push(ValidationError::new("sessions.max_age_secs", "must be greater than 0"));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn reports_every_problem() {
        let mut config = AppConfig::default();
        config.server.bind_address = "nowhere".into();
        config.sessions.secret = "short".into();
        config.sessions.sweep_interval_secs = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec!["server.bind_address", "sessions.secret", "sessions.sweep_interval_secs"]
        );
    }
}
