//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Failed RPC call:
//!     → retries.rs (classify status code)
//!     → NoRetry / RetryOnly: error returned to the caller as-is
//!     → RetryWithReconnect: client redials once and re-issues the call
//! ```
//!
//! # Design Decisions
//! - At most one recovery attempt per call
//! - Classification is pure; the client owns all connection state

pub mod retries;

pub use retries::{classify, classify_status, RetryDecision};
