//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     system config (microservices registry)
//!     → listener_guard.rs (collect allowed bridge ports, bounded scan)
//!
//! Bridge bind:
//!     net::listener::guarded_bind
//!     → listener_guard.rs (network family, host/port shape, port allow-list)
//!     → socket created only if every check passes
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any check failure
//! - The allow-list is an injected immutable value, never a global

pub mod listener_guard;

pub use listener_guard::{AllowedPortSet, GuardError, ListenerGuard};
