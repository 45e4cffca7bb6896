//! Outbound RPC client subsystem.
//!
//! # Data Flow
//! ```text
//! caller → ResilientClient::call_with_recovery(f)
//!     → f(stub) on the live connection
//!     → failure: resilience::classify(code)
//!         → RetryWithReconnect: ConnectionHandle::redial → initializer → f(new stub)
//!         → otherwise: error to caller
//! ```

pub mod resilient;

pub use resilient::{ClientError, ResilientClient};
