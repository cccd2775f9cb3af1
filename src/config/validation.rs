//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect duplicate backend names and rule client ids
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function over the parsed config
//! - Runs before the config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::schema::TurngateConfig;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check every semantic rule, collecting all failures.
pub fn validate_config(config: &TurngateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("not a valid socket address: {:?}", config.listener.bind_address),
        ));
    }

    if config.backends.is_empty() {
        errors.push(ValidationError::new(
            "backends",
            "at least one backend must be configured",
        ));
    }

    let mut backend_names = HashSet::new();
    for (i, backend) in config.backends.iter().enumerate() {
        let field = format!("backends[{}]", i);
        if backend.name.is_empty() {
            errors.push(ValidationError::new(&field, "name must not be empty"));
        } else if !backend_names.insert(backend.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate backend name: {:?}", backend.name),
            ));
        }
        if backend.address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                &field,
                format!("not a valid socket address: {:?}", backend.address),
            ));
        }
    }

    if config.health_check.enabled {
        if config.health_check.interval_secs == 0 {
            errors.push(ValidationError::new(
                "health_check.interval_secs",
                "must be at least 1",
            ));
        }
        if config.health_check.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "health_check.timeout_secs",
                "must be at least 1",
            ));
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::new("timeouts.connect_secs", "must be at least 1"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be at least 1"));
    }

    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.sweep_interval_secs",
            "must be at least 1",
        ));
    }
    if config.rate_limit.idle_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.idle_timeout_secs",
            "must be at least 1",
        ));
    }

    let mut rule_clients = HashSet::new();
    for (i, rule) in config.rate_limit.rules.iter().enumerate() {
        let field = format!("rate_limit.rules[{}]", i);
        if rule.client_id.is_empty() {
            errors.push(ValidationError::new(&field, "client_id must not be empty"));
        } else if !rule_clients.insert(rule.client_id.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate rule for client: {:?}", rule.client_id),
            ));
        }
        // Capacity 0 is a valid always-deny rule; a zero rate has no refill
        // period and is rejected everywhere.
        if rule.rate == 0 {
            errors.push(ValidationError::new(&field, "rate must be at least 1"));
        }
    }

    if config.admin.enabled {
        if config.admin.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::new(
                "admin.bind_address",
                format!("not a valid socket address: {:?}", config.admin.bind_address),
            ));
        }
        if config.admin.api_key.is_empty() {
            errors.push(ValidationError::new("admin.api_key", "must not be empty"));
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!(
                "not a valid socket address: {:?}",
                config.observability.metrics_address
            ),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
