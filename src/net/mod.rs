//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Client side:
//!     DialTarget (dialer.rs)
//!     → Dialer::dial
//!     → ConnectionHandle (connection.rs: id, target, redial)
//!
//! Host side:
//!     primary address → listener.rs::bind
//!     bridge address  → listener.rs::guarded_bind → ListenerGuard → bind
//! ```
//!
//! # Design Decisions
//! - One live connection per handle; redial closes before dialing
//! - The guard runs before the socket is created, never after

pub mod connection;
pub mod dialer;
pub mod listener;

pub use connection::{ConnectionHandle, ConnectionId};
pub use dialer::{ChannelDialer, DialOption, DialTarget, Dialer};
pub use listener::ListenerError;
