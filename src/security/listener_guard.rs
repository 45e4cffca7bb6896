//! Bind-address validation for the bridge listener.
//!
//! The bridge listener's bind target comes from configuration that may be
//! written by a less-trusted layer. Every bind goes through
//! [`ListenerGuard::validate`] first, which turns an open bind into a check
//! against a closed set of explicitly registered ports (CWE-918 mitigation).
//!
//! # Rules
//! - Only `tcp4` / `tcp6` stream networks
//! - Address must be a well-formed `host:port`
//! - Port 80 is never allowed
//! - Port must be in the [`AllowedPortSet`]
//!
//! Host addresses are not filtered.

use std::collections::BTreeSet;

use serde_json::Value;
use thiserror::Error;

use crate::config::system::{ConfigCategory, SystemConfig};

/// Upper bound on service entries scanned from the registry.
pub const MAX_REGISTERED_SERVICES: usize = 100;

/// Field of a service registry entry holding its bridge hosting address.
pub const BRIDGE_URL_FIELD: &str = "rpcwebhostUrl";

/// The plain web port. The bridge never listens here.
pub const RESERVED_WEB_PORT: &str = "80";

/// Errors raised while building or consulting the guard.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("{0} is not a safe network type")]
    UnsafeNetwork(String),

    #[error("{address} is not a valid host/port pair: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("{0} is not a safe port number")]
    UnsafePort(String),

    #[error("exceeded maximum allowed number of microservices ({count} > {max})")]
    TooManyServices { count: usize, max: usize },

    #[error("invalid microservice registry: {0}")]
    InvalidRegistry(String),
}

impl GuardError {
    /// Short label used in metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            GuardError::UnsafeNetwork(_) => "network",
            GuardError::InvalidAddress { .. } => "address",
            GuardError::UnsafePort(_) => "port",
            GuardError::TooManyServices { .. } => "too_many_services",
            GuardError::InvalidRegistry(_) => "registry",
        }
    }
}

/// Ports a bridge listener may bind to. Built once, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowedPortSet {
    ports: BTreeSet<String>,
}

impl AllowedPortSet {
    /// Build from an explicit list of ports.
    pub fn from_ports<I, P>(ports: I) -> Result<Self, GuardError>
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        let ports: Vec<String> = ports.into_iter().map(Into::into).collect();
        if ports.len() > MAX_REGISTERED_SERVICES {
            return Err(GuardError::TooManyServices {
                count: ports.len(),
                max: MAX_REGISTERED_SERVICES,
            });
        }
        Ok(Self {
            ports: ports.into_iter().collect(),
        })
    }

    /// Scan a microservice registry (a JSON object of service entries) for
    /// bridge hosting addresses and collect their ports.
    pub fn from_registry(registry: &Value) -> Result<Self, GuardError> {
        let services = registry.as_object().ok_or_else(|| {
            GuardError::InvalidRegistry("expected an object of service entries".to_string())
        })?;

        if services.len() > MAX_REGISTERED_SERVICES {
            return Err(GuardError::TooManyServices {
                count: services.len(),
                max: MAX_REGISTERED_SERVICES,
            });
        }

        let mut ports = BTreeSet::new();
        for (name, entry) in services {
            let Some(field) = entry.get(BRIDGE_URL_FIELD) else {
                continue;
            };
            let hosting_url = field.as_str().ok_or_else(|| {
                GuardError::InvalidRegistry(format!("{}.{} must be a string", name, BRIDGE_URL_FIELD))
            })?;
            match bridge_port(hosting_url) {
                Some(port) => {
                    tracing::debug!(service = %name, port = %port, "Registered bridge port");
                    ports.insert(port);
                }
                None => {
                    tracing::warn!(
                        service = %name,
                        value = %hosting_url,
                        "Ignoring bridge hosting address without a usable port"
                    );
                }
            }
        }

        Ok(Self { ports })
    }

    /// Read the microservice category of the system configuration.
    ///
    /// A missing category yields an empty set, so no bridge port is allowed.
    pub fn from_system_config(config: &dyn SystemConfig) -> Result<Self, GuardError> {
        match config.category(&ConfigCategory::Microservices) {
            Some(registry) => Self::from_registry(registry),
            None => {
                tracing::warn!(
                    category = %ConfigCategory::Microservices,
                    "No microservice registry configured; bridge listeners will be rejected"
                );
                Ok(Self::default())
            }
        }
    }

    pub fn contains(&self, port: &str) -> bool {
        self.ports.contains(port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.ports.iter().map(String::as_str)
    }
}

/// Port of a bridge hosting address: `host:port`, or a URL with an explicit port.
fn bridge_port(hosting_url: &str) -> Option<String> {
    if hosting_url.contains("://") {
        return url::Url::parse(hosting_url)
            .ok()
            .and_then(|u| u.port())
            .map(|p| p.to_string());
    }
    match hosting_url.split(':').collect::<Vec<_>>().as_slice() {
        [_, port] if !port.is_empty() => Some((*port).to_string()),
        _ => None,
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts.
pub fn split_host_port(address: &str) -> Result<(&str, &str), String> {
    if let Some(rest) = address.strip_prefix('[') {
        let end = rest.find(']').ok_or("missing ']' in address")?;
        let host = &rest[..end];
        let port = rest[end + 1..].strip_prefix(':').ok_or("missing port in address")?;
        if port.contains(':') {
            return Err("too many colons in address".to_string());
        }
        return Ok((host, port));
    }

    let idx = address.rfind(':').ok_or("missing port in address")?;
    let (host, port) = (&address[..idx], &address[idx + 1..]);
    if host.contains(':') {
        return Err("too many colons in address".to_string());
    }
    if host.contains('[') || host.contains(']') {
        return Err("unexpected bracket in address".to_string());
    }
    Ok((host, port))
}

/// Validates bind targets against an [`AllowedPortSet`].
#[derive(Debug, Clone, Default)]
pub struct ListenerGuard {
    allowed: AllowedPortSet,
}

impl ListenerGuard {
    pub fn new(allowed: AllowedPortSet) -> Self {
        Self { allowed }
    }

    /// Build the guard from the system configuration's microservice registry.
    pub fn from_system_config(config: &dyn SystemConfig) -> Result<Self, GuardError> {
        let allowed = AllowedPortSet::from_system_config(config)?;
        tracing::info!(
            allowed_ports = ?allowed.iter().collect::<Vec<_>>(),
            "Listener guard initialized"
        );
        Ok(Self::new(allowed))
    }

    pub fn allowed_ports(&self) -> &AllowedPortSet {
        &self.allowed
    }

    /// Check a bind target before any socket is created.
    pub fn validate(&self, network: &str, address: &str) -> Result<(), GuardError> {
        if !(network == "tcp4" || network == "tcp6") {
            return Err(GuardError::UnsafeNetwork(network.to_string()));
        }

        let (_, port) = split_host_port(address).map_err(|reason| GuardError::InvalidAddress {
            address: address.to_string(),
            reason,
        })?;

        if port == RESERVED_WEB_PORT || !self.allowed.contains(port) {
            return Err(GuardError::UnsafePort(port.to_string()));
        }
        Ok(())
    }
}
