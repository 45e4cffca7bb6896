//! Dual-protocol service host.
//!
//! # Data Flow
//! ```text
//! DualProtocolHost::bind (server.rs)
//!     → primary listener bound, unguarded
//!
//! DualProtocolHost::start
//!     → ServiceRegistrar fills ServiceRegistry (registry.rs)
//!     → primary gRPC server task
//!     → ListenerGuard validates bridge address
//!     → gRPC-Web bridge task over the same routes (bridge.rs)
//!
//! DualProtocolHost::stop
//!     → Shutdown trigger → primary drains → bridge drains
//! ```

pub mod bridge;
pub mod registry;
pub mod server;

pub use registry::{ServiceRegistrar, ServiceRegistry, MAX_MESSAGE_SIZE};
pub use server::{DualProtocolHost, HostError, HostState};
