//! Resilient gRPC client and dual-protocol (gRPC + gRPC-Web) service host.

pub mod client;
pub mod config;
pub mod host;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod security;

pub use client::{ClientError, ResilientClient};
pub use config::schema::FoundationConfig;
pub use host::{DualProtocolHost, HostError, ServiceRegistrar, ServiceRegistry};
pub use lifecycle::Shutdown;
pub use net::{ChannelDialer, DialOption, DialTarget, Dialer};
pub use security::{AllowedPortSet, GuardError, ListenerGuard};
