//! Dual-protocol RPC host.
//!
//! # Responsibilities
//! - Bind the primary gRPC listener at construction
//! - Register services and serve gRPC on its own task
//! - Optionally serve the same services over gRPC-Web on a guarded listener
//! - Stop both servers as a unit, draining in-flight calls
//!
//! # States
//! ```text
//! Constructed --start--> Serving --stop--> Stopped
//! ```
//! A failed bridge bind leaves the host Serving (primary only) and returns
//! the error; the caller decides whether to `stop` or exit.

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::config::HostConfig;
use crate::host::bridge::bridge_router;
use crate::host::registry::{ServiceRegistrar, ServiceRegistry, MAX_MESSAGE_SIZE};
use crate::lifecycle::Shutdown;
use crate::net::listener::{self, ListenerError};
use crate::security::{GuardError, ListenerGuard};

/// Lifecycle state of a [`DualProtocolHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Constructed,
    Serving,
    Stopped,
}

/// Errors reported by the host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to bind primary listener on {address}: {source}")]
    PrimaryBind {
        address: String,
        #[source]
        source: ListenerError,
    },

    /// The listener guard refused the bridge bind target.
    #[error("bridge listener on {address} rejected: {source}")]
    ListenerRejected {
        address: String,
        #[source]
        source: GuardError,
    },

    #[error("failed to open bridge listener on {address}: {source}")]
    BridgeBind {
        address: String,
        #[source]
        source: ListenerError,
    },

    #[error("cannot {operation} a host that is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: HostState,
    },

    #[error("{server} server terminated abnormally: {message}")]
    Serve { server: &'static str, message: String },
}

/// Hosts one service over gRPC and, optionally, gRPC-Web.
pub struct DualProtocolHost {
    config: HostConfig,
    guard: Arc<ListenerGuard>,
    state: HostState,
    shutdown: Shutdown,
    primary_listener: Option<TcpListener>,
    primary_addr: SocketAddr,
    primary_task: Option<JoinHandle<Result<(), tonic::transport::Error>>>,
    bridge_addr: Option<SocketAddr>,
    bridge_task: Option<JoinHandle<std::io::Result<()>>>,
}

impl DualProtocolHost {
    /// Bind the primary listener. Serving starts with [`start`](Self::start).
    ///
    /// Registrars must apply [`ServiceRegistry::max_message_size`] to each
    /// generated server they add; otherwise tonic's 4 MiB decode limit stays
    /// in effect for that service.
    pub async fn bind(config: HostConfig, guard: Arc<ListenerGuard>) -> Result<Self, HostError> {
        let listener = listener::bind(&config.primary_address).await.map_err(|source| {
            tracing::error!(
                service = %config.service_name,
                address = %config.primary_address,
                error = %source,
                "Failed to bind primary listener"
            );
            HostError::PrimaryBind {
                address: config.primary_address.clone(),
                source,
            }
        })?;
        let primary_addr = listener.local_addr().map_err(|e| HostError::PrimaryBind {
            address: config.primary_address.clone(),
            source: ListenerError::Bind(e),
        })?;

        Ok(Self {
            config,
            guard,
            state: HostState::Constructed,
            shutdown: Shutdown::new(),
            primary_listener: Some(listener),
            primary_addr,
            primary_task: None,
            bridge_addr: None,
            bridge_task: None,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.config.service_name
    }

    pub fn state(&self) -> HostState {
        self.state
    }

    /// Address the primary listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.primary_addr
    }

    /// Address of the bridge listener once it is serving.
    pub fn bridge_addr(&self) -> Option<SocketAddr> {
        self.bridge_addr
    }

    /// Register services and begin serving. Returns once both servers are
    /// running on their own tasks.
    pub async fn start<R>(&mut self, registrar: &R) -> Result<(), HostError>
    where
        R: ServiceRegistrar + ?Sized,
    {
        let listener = match (self.state, self.primary_listener.take()) {
            (HostState::Constructed, Some(listener)) => listener,
            (state, _) => {
                return Err(HostError::InvalidState {
                    operation: "start",
                    state,
                })
            }
        };

        let mut registry = ServiceRegistry::new(MAX_MESSAGE_SIZE);
        registrar.register(&mut registry);
        let routes = registry.into_routes();

        let incoming = TcpListenerStream::new(listener);
        let router = Server::builder().add_routes(routes.clone());
        let signal = self.shutdown.signal();
        self.primary_task = Some(tokio::spawn(async move {
            router.serve_with_incoming_shutdown(incoming, signal).await
        }));
        self.state = HostState::Serving;
        tracing::info!(
            service = %self.config.service_name,
            address = %self.primary_addr,
            "gRPC server hosted"
        );

        if !self.config.bridge_enabled {
            return Ok(());
        }

        let address = self.config.bridge_address.clone();
        let bridge_listener = listener::guarded_bind(&address, &self.guard)
            .await
            .map_err(|e| {
                tracing::error!(
                    service = %self.config.service_name,
                    address = %address,
                    error = %e,
                    "gRPC-Web bridge not started"
                );
                match e {
                    ListenerError::Rejected(source) => HostError::ListenerRejected {
                        address: address.clone(),
                        source,
                    },
                    source => HostError::BridgeBind {
                        address: address.clone(),
                        source,
                    },
                }
            })?;
        let bridge_addr = bridge_listener.local_addr().map_err(|e| HostError::BridgeBind {
            address: address.clone(),
            source: ListenerError::Bind(e),
        })?;

        let app = bridge_router(routes);
        let signal = self.shutdown.signal();
        self.bridge_task = Some(tokio::spawn(async move {
            axum::serve(bridge_listener, app)
                .with_graceful_shutdown(signal)
                .await
        }));
        self.bridge_addr = Some(bridge_addr);
        tracing::info!(
            service = %self.config.service_name,
            address = %bridge_addr,
            "gRPC-Web server hosted"
        );
        Ok(())
    }

    /// Stop serving. Waits for in-flight primary calls to finish, then for
    /// the bridge to shut down.
    pub async fn stop(&mut self) -> Result<(), HostError> {
        if self.state != HostState::Serving {
            return Err(HostError::InvalidState {
                operation: "stop",
                state: self.state,
            });
        }

        self.shutdown.trigger();
        let mut result = Ok(());

        if let Some(task) = self.primary_task.take() {
            if let Err(e) = join_server("primary", task).await {
                result = Err(e);
            }
        }
        if let Some(task) = self.bridge_task.take() {
            if let Err(e) = join_server("bridge", task).await {
                result = result.and(Err(e));
            }
        }

        self.state = HostState::Stopped;
        self.bridge_addr = None;
        tracing::info!(
            service = %self.config.service_name,
            "gRPC and gRPC-Web (if enabled) torn down"
        );
        result
    }
}

async fn join_server<E>(server: &'static str, task: JoinHandle<Result<(), E>>) -> Result<(), HostError>
where
    E: std::fmt::Display,
{
    let message = match task.await {
        Ok(Ok(())) => return Ok(()),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    tracing::error!(server, error = %message, "Server terminated abnormally");
    Err(HostError::Serve { server, message })
}

impl Drop for DualProtocolHost {
    fn drop(&mut self) {
        // Detached serving tasks would otherwise outlive the host.
        if self.state == HostState::Serving {
            self.shutdown.trigger();
        }
    }
}

impl std::fmt::Debug for DualProtocolHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DualProtocolHost")
            .field("service", &self.config.service_name)
            .field("state", &self.state)
            .field("primary_addr", &self.primary_addr)
            .field("bridge_addr", &self.bridge_addr)
            .finish()
    }
}
