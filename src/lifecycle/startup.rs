//! Daemon startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging and metrics
//! - Build the listener guard from system configuration
//! - Bind and start the host, then wait for a shutdown signal
//!
//! Any startup error is fatal. A rejected bridge bind stops the already
//! serving primary before returning.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tonic_health::ServingStatus;

use crate::config::loader::{load_config, ConfigError};
use crate::config::system::SystemConfigError;
use crate::config::{FoundationConfig, JsonSystemConfig};
use crate::host::{DualProtocolHost, HostError, ServiceRegistry};
use crate::lifecycle::signals::wait_for_shutdown_signal;
use crate::observability::{logging, metrics};
use crate::security::{GuardError, ListenerGuard};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("metrics exporter: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid metrics address {0}")]
    MetricsAddress(String),

    #[error("system configuration: {0}")]
    SystemConfig(#[from] SystemConfigError),

    #[error("listener guard: {0}")]
    Guard(#[from] GuardError),

    #[error("host: {0}")]
    Host(#[from] HostError),
}

/// Run the host daemon until a shutdown signal arrives.
///
/// Without `config_path` the built-in defaults are used. The system
/// configuration is located with [`JsonSystemConfig::locate`]; a missing
/// file yields an empty allow-list.
pub async fn launch(
    config_path: Option<&Path>,
    system_config_path: Option<&Path>,
) -> Result<(), StartupError> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => FoundationConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(
        service = %config.host.service_name,
        version = env!("CARGO_PKG_VERSION"),
        "foundation-host starting"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr)?;
    }

    let system_path = JsonSystemConfig::locate(
        system_config_path.or(config.system.path.as_deref()),
    );
    let system = match JsonSystemConfig::load(&system_path) {
        Ok(system) => system,
        Err(SystemConfigError::NotFound { path }) => {
            tracing::warn!(path = %path.display(), "System configuration not found, allow-list is empty");
            JsonSystemConfig::default()
        }
        Err(e) => return Err(e.into()),
    };
    let guard = ListenerGuard::from_system_config(&system).inspect_err(|e| {
        tracing::error!(error = %e, "Listener guard configuration is invalid");
    })?;

    let (reporter, health) = tonic_health::server::health_reporter();
    reporter
        .set_service_status(&config.host.service_name, ServingStatus::Serving)
        .await;
    let registrar = move |registry: &mut ServiceRegistry| {
        let max = registry.max_message_size();
        registry.add_service(
            health
                .clone()
                .max_decoding_message_size(max)
                .max_encoding_message_size(max),
        );
    };

    let mut host = DualProtocolHost::bind(config.host.clone(), Arc::new(guard)).await?;
    if let Err(e) = host.start(&registrar).await {
        if let Err(stop_err) = host.stop().await {
            tracing::warn!(error = %stop_err, "Stop after failed start");
        }
        return Err(e.into());
    }

    wait_for_shutdown_signal().await;
    reporter
        .set_service_status(&config.host.service_name, ServingStatus::NotServing)
        .await;
    host.stop().await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
