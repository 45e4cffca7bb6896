//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! foundation.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → FoundationConfig (validated, immutable)
//!
//! sys_conf.json
//!     → system.rs (category → untyped JSON bag)
//!     → consumers interpret their own category (e.g. the listener guard
//!       reads `microservices`)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no hot reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod system;
pub mod validation;

pub use schema::{ClientConfig, FoundationConfig, HostConfig, LogFormat, ObservabilityConfig};
pub use system::{ConfigCategory, JsonSystemConfig, SystemConfig};
