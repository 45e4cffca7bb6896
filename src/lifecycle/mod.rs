//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Load config → Logging/metrics → System config → Guard → Bind → Start
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → return from wait_for_shutdown_signal
//!
//! Shutdown (shutdown.rs):
//!     trigger → every serving task's signal future resolves → drain
//! ```

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use startup::{launch, StartupError};
