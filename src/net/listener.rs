//! TCP listener construction.
//!
//! # Responsibilities
//! - Bind the primary listener (unguarded)
//! - Bind the bridge listener through the [`ListenerGuard`] hook
//!
//! The guarded path validates every resolved candidate address before a
//! socket exists, so a rejected target never touches the network.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpSocket};

use crate::observability::metrics;
use crate::security::{GuardError, ListenerGuard};

const LISTEN_BACKLOG: u32 = 1024;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Address could not be resolved.
    #[error("Failed to resolve {address}: {source}")]
    Resolve {
        address: String,
        #[source]
        source: std::io::Error,
    },
    /// Guard refused the bind target.
    #[error("Listener rejected: {0}")]
    Rejected(#[from] GuardError),
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    Bind(#[source] std::io::Error),
}

/// Stream network name for a socket address, as the guard expects it.
pub fn network_of(addr: &SocketAddr) -> &'static str {
    match addr {
        SocketAddr::V4(_) => "tcp4",
        SocketAddr::V6(_) => "tcp6",
    }
}

/// Bind a listener with no validation.
pub async fn bind(address: &str) -> Result<TcpListener, ListenerError> {
    let listener = TcpListener::bind(address).await.map_err(ListenerError::Bind)?;
    let local_addr = listener.local_addr().map_err(ListenerError::Bind)?;
    tracing::info!(address = %local_addr, "Listener bound");
    Ok(listener)
}

/// Resolve `address`, validate each candidate with `guard`, and bind the
/// first candidate that passes. The last failure is returned if none do.
pub async fn guarded_bind(address: &str, guard: &ListenerGuard) -> Result<TcpListener, ListenerError> {
    let candidates: Vec<SocketAddr> = tokio::net::lookup_host(address)
        .await
        .map_err(|source| ListenerError::Resolve {
            address: address.to_string(),
            source,
        })?
        .collect();

    let mut last_err = ListenerError::Resolve {
        address: address.to_string(),
        source: std::io::Error::new(std::io::ErrorKind::NotFound, "no addresses resolved"),
    };

    for candidate in candidates {
        let network = network_of(&candidate);
        if let Err(e) = guard.validate(network, &candidate.to_string()) {
            tracing::warn!(
                network,
                address = %candidate,
                error = %e,
                "Listener guard rejected bind target"
            );
            metrics::record_listener_rejection(e.reason());
            last_err = ListenerError::Rejected(e);
            continue;
        }

        match bind_socket(candidate) {
            Ok(listener) => {
                tracing::info!(network, address = %candidate, "Guarded listener bound");
                return Ok(listener);
            }
            Err(e) => last_err = ListenerError::Bind(e),
        }
    }

    Err(last_err)
}

fn bind_socket(addr: SocketAddr) -> std::io::Result<TcpListener> {
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(LISTEN_BACKLOG)
}
