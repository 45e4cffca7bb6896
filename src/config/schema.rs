//! Configuration schema definitions.
//!
//! This module defines the configuration structure for a hosted service.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::net::{DialOption, DialTarget};

/// Root configuration for a foundation service process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FoundationConfig {
    /// RPC host settings (primary and bridge listeners).
    pub host: HostConfig,

    /// Defaults for outbound RPC clients.
    pub client: ClientConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Where the shared system configuration lives.
    pub system: SystemSourceConfig,
}

/// Host configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Service name used in logs.
    pub service_name: String,

    /// Primary gRPC bind address (e.g., "0.0.0.0:50051").
    pub primary_address: String,

    /// Serve the gRPC-Web bridge as well.
    pub bridge_enabled: bool,

    /// Bridge bind address. Its port must be registered in the
    /// microservice registry.
    pub bridge_address: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            service_name: "foundation".to_string(),
            primary_address: "0.0.0.0:50051".to_string(),
            bridge_enabled: false,
            bridge_address: "0.0.0.0:9091".to_string(),
        }
    }
}

/// Outbound client defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Connection establishment timeout in milliseconds.
    pub connect_timeout_ms: u64,

    /// Per-request deadline in milliseconds (0 = none).
    pub request_timeout_ms: u64,

    /// Disable Nagle's algorithm.
    pub tcp_nodelay: bool,

    /// HTTP/2 keepalive ping interval in seconds (0 = disabled).
    pub keepalive_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            request_timeout_ms: 0,
            tcp_nodelay: true,
            keepalive_interval_secs: 30,
        }
    }
}

impl ClientConfig {
    /// Dial options in a stable order.
    pub fn dial_options(&self) -> Vec<DialOption> {
        let mut options = vec![
            DialOption::ConnectTimeout(Duration::from_millis(self.connect_timeout_ms)),
            DialOption::TcpNoDelay(self.tcp_nodelay),
        ];
        if self.request_timeout_ms > 0 {
            options.push(DialOption::RequestTimeout(Duration::from_millis(self.request_timeout_ms)));
        }
        if self.keepalive_interval_secs > 0 {
            options.push(DialOption::Http2KeepAliveInterval(Duration::from_secs(
                self.keepalive_interval_secs,
            )));
        }
        options
    }

    /// Target for `address` carrying these settings.
    pub fn dial_target(&self, address: impl Into<String>) -> DialTarget {
        DialTarget::new(address).with_options(self.dial_options())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Location of `sys_conf.json`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SystemSourceConfig {
    /// Explicit path; falls back to the environment or the default location.
    pub path: Option<PathBuf>,
}
