//! System configuration capability.
//!
//! The platform keeps one `sys_conf.json` whose top-level keys are
//! configuration categories (`db`, `pubsub`, `microservices`, ...), each an
//! untyped JSON bag. Components look a category up and interpret it
//! themselves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Environment variable naming the directory that holds `sys_conf.json`.
pub const CONF_DIR_ENV: &str = "FOUNDATION_CONF";
pub const SYS_CONF_FILE: &str = "sys_conf.json";
pub const DEFAULT_SYS_CONF_PATH: &str = "/etc/foundation/conf/sys_conf.json";

/// Top-level categories of the system configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ConfigCategory {
    Db,
    PubSub,
    So,
    Microservices,
    Orchestrator,
    Repository,
    Cluster,
    Ldap,
    ContainerRegistry,
    /// Any other key present in the file.
    Other(String),
}

impl ConfigCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigCategory::Db => "db",
            ConfigCategory::PubSub => "pubsub",
            ConfigCategory::So => "so",
            ConfigCategory::Microservices => "microservices",
            ConfigCategory::Orchestrator => "orchestratorclient",
            ConfigCategory::Repository => "repository",
            ConfigCategory::Cluster => "cluster",
            ConfigCategory::Ldap => "ldap",
            ConfigCategory::ContainerRegistry => "containerregistry",
            ConfigCategory::Other(name) => name,
        }
    }
}

impl From<&str> for ConfigCategory {
    fn from(name: &str) -> Self {
        match name {
            "db" => ConfigCategory::Db,
            "pubsub" => ConfigCategory::PubSub,
            "so" => ConfigCategory::So,
            "microservices" => ConfigCategory::Microservices,
            "orchestratorclient" => ConfigCategory::Orchestrator,
            "repository" => ConfigCategory::Repository,
            "cluster" => ConfigCategory::Cluster,
            "ldap" => ConfigCategory::Ldap,
            "containerregistry" => ConfigCategory::ContainerRegistry,
            other => ConfigCategory::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ConfigCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lookup of configuration bags by category.
pub trait SystemConfig: Send + Sync {
    fn category(&self, category: &ConfigCategory) -> Option<&Value>;

    fn has_category(&self, category: &ConfigCategory) -> bool {
        self.category(category).is_some()
    }
}

#[derive(Debug, Error)]
pub enum SystemConfigError {
    #[error("{path} does not exist")]
    NotFound { path: PathBuf },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse system configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("system configuration root must be a JSON object")]
    NotAnObject,
}

/// System configuration backed by a parsed `sys_conf.json`.
#[derive(Debug, Clone, Default)]
pub struct JsonSystemConfig {
    sections: HashMap<ConfigCategory, Value>,
}

impl JsonSystemConfig {
    /// Parse configuration text.
    pub fn from_json(content: &str) -> Result<Self, SystemConfigError> {
        let root: Value = serde_json::from_str(content)?;
        Self::from_value(root)
    }

    /// Wrap an already-parsed root object.
    pub fn from_value(root: Value) -> Result<Self, SystemConfigError> {
        let Value::Object(map) = root else {
            return Err(SystemConfigError::NotAnObject);
        };
        let sections = map
            .into_iter()
            .map(|(k, v)| (ConfigCategory::from(k.as_str()), v))
            .collect();
        Ok(Self { sections })
    }

    /// Load from a file.
    pub fn load(path: &Path) -> Result<Self, SystemConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                SystemConfigError::NotFound { path: path.to_path_buf() }
            } else {
                SystemConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        let config = Self::from_json(&content)?;
        tracing::info!(path = %path.display(), categories = config.sections.len(), "System configuration loaded");
        Ok(config)
    }

    /// Where `sys_conf.json` lives: an explicit path wins, then the
    /// [`CONF_DIR_ENV`] directory if it exists, then the default location.
    pub fn locate(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }
        if let Ok(dir) = std::env::var(CONF_DIR_ENV) {
            let dir = PathBuf::from(dir);
            if !dir.as_os_str().is_empty() && dir.exists() {
                return dir.join(SYS_CONF_FILE);
            }
        }
        PathBuf::from(DEFAULT_SYS_CONF_PATH)
    }
}

impl SystemConfig for JsonSystemConfig {
    fn category(&self, category: &ConfigCategory) -> Option<&Value> {
        self.sections.get(category)
    }
}
