//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate listener addresses are `host:port` pairs
//! - Detect the bridge sharing the primary listener's address
//!
//! Returns all validation errors, not just the first. Whether the bridge
//! port is allowed is the listener guard's decision, not this module's.

use std::net::SocketAddr;

use crate::config::schema::FoundationConfig;
use crate::security::listener_guard::split_host_port;

/// A single semantic problem in the configuration.
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

impl std::error::Error for ValidationError {}

fn check_host_port(field: &'static str, address: &str, errors: &mut Vec<ValidationError>) {
    match split_host_port(address) {
        Ok((_, port)) if port.parse::<u16>().is_ok() => {}
        Ok((_, port)) => errors.push(ValidationError::new(field, format!("invalid port '{}'", port))),
        Err(reason) => errors.push(ValidationError::new(field, format!("'{}': {}", address, reason))),
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &FoundationConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.host.service_name.trim().is_empty() {
        errors.push(ValidationError::new("host.service_name", "must not be empty"));
    }

    check_host_port("host.primary_address", &config.host.primary_address, &mut errors);

    if config.host.bridge_enabled {
        check_host_port("host.bridge_address", &config.host.bridge_address, &mut errors);
        if config.host.bridge_address == config.host.primary_address {
            errors.push(ValidationError::new(
                "host.bridge_address",
                "must differ from host.primary_address",
            ));
        }
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
        assert_eq!(validate_config(&FoundationConfig::default()), Ok(()));
    }

    #[test]
    fn collects_every_error() {
        let mut config = FoundationConfig::default();
        config.host.service_name = " ".into();
        config.host.primary_address = "localhost".into();
        config.host.bridge_enabled = true;
        config.host.bridge_address = "localhost".into();
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "metrics".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "host.service_name",
                "host.primary_address",
                "host.bridge_address",
                "host.bridge_address",
                "observability.metrics_address",
            ]
        );
    }

    #[test]
    fn bridge_address_ignored_when_disabled() {
        let mut config = FoundationConfig::default();
        config.host.bridge_address = "garbage".into();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn rejects_non_numeric_port() {
        let mut config = FoundationConfig::default();
        config.host.primary_address = "0.0.0.0:grpc".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].message, "invalid port 'grpc'");
    }
}
