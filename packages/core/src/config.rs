//! Engine configuration
//!
//! Everything is wired explicitly: `EngineConfig` -> store -> driver ->
//! repositories. There is no global state.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Default busy timeout applied to every libsql connection
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Upper bound for `HierarchyConfig::max_depth`
const MAX_SUPPORTED_DEPTH: usize = 1024;

/// Configuration validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {reason}")]
    InvalidValue { name: String, reason: String },

    #[error("Cannot determine home directory for the default database path")]
    NoHomeDirectory,
}

impl ConfigError {
    pub fn invalid_value(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.into(),
            reason: reason.into(),
        }
    }
}

/// Record store settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file; `None` resolves to `~/.nodechain/database/nodechain.db`
    pub database_path: Option<PathBuf>,

    /// SQLite busy timeout in milliseconds
    pub busy_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

impl StoreConfig {
    /// Database path, falling back to the centralized data directory
    ///
    /// - macOS/Linux: `~/.nodechain/database/nodechain.db`
    /// - Windows: `%USERPROFILE%\.nodechain\database\nodechain.db`
    pub fn resolve_database_path(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        default_database_path("nodechain.db")
    }
}

/// `~/.nodechain/database/<file_name>`
pub fn default_database_path(file_name: &str) -> Result<PathBuf, ConfigError> {
    let home_dir = dirs::home_dir().ok_or(ConfigError::NoHomeDirectory)?;
    Ok(home_dir.join(".nodechain").join("database").join(file_name))
}

/// Collection driver settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderingConfig {
    /// Journal each multi-write operation as a pending intent
    pub journal_intents: bool,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            journal_intents: true,
        }
    }
}

/// Tree materialization settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyConfig {
    /// Id of the virtual, always-open root container
    pub root_id: String,

    /// Levels expanded below the requested node
    pub max_depth: usize,

    /// Owner prefix for collection keys, if collections are scoped
    pub owner_scope: Option<String>,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            root_id: "home".to_string(),
            max_depth: 64,
            owner_scope: None,
        }
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub store: StoreConfig,
    pub ordering: OrderingConfig,
    pub hierarchy: HierarchyConfig,
}

impl EngineConfig {
    /// Defaults overridden by `NODECHAIN_*` environment variables
    ///
    /// - `NODECHAIN_DB_PATH`
    /// - `NODECHAIN_BUSY_TIMEOUT_MS`
    /// - `NODECHAIN_JOURNAL_INTENTS` (`true`/`false`/`1`/`0`)
    /// - `NODECHAIN_ROOT_ID`
    /// - `NODECHAIN_MAX_DEPTH`
    /// - `NODECHAIN_OWNER`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("NODECHAIN_DB_PATH") {
            config.store.database_path = Some(PathBuf::from(path));
        }
        if let Some(value) = lookup("NODECHAIN_BUSY_TIMEOUT_MS") {
            config.store.busy_timeout_ms = parse_number("NODECHAIN_BUSY_TIMEOUT_MS", &value)?;
        }
        if let Some(value) = lookup("NODECHAIN_JOURNAL_INTENTS") {
            config.ordering.journal_intents = parse_flag("NODECHAIN_JOURNAL_INTENTS", &value)?;
        }
        if let Some(root_id) = lookup("NODECHAIN_ROOT_ID") {
            config.hierarchy.root_id = root_id;
        }
        if let Some(value) = lookup("NODECHAIN_MAX_DEPTH") {
            config.hierarchy.max_depth = parse_number("NODECHAIN_MAX_DEPTH", &value)?;
        }
        if let Some(owner) = lookup("NODECHAIN_OWNER") {
            config.hierarchy.owner_scope = Some(owner).filter(|o| !o.is_empty());
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.busy_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "busy_timeout_ms",
                "must be greater than 0",
            ));
        }

        if self.hierarchy.root_id.is_empty() {
            return Err(ConfigError::invalid_value("root_id", "cannot be empty"));
        }

        if self.hierarchy.max_depth == 0 {
            return Err(ConfigError::invalid_value(
                "max_depth",
                "must be greater than 0",
            ));
        }

        if self.hierarchy.max_depth > MAX_SUPPORTED_DEPTH {
            return Err(ConfigError::invalid_value(
                "max_depth",
                format!("cannot exceed {}", MAX_SUPPORTED_DEPTH),
            ));
        }

        if let Some(owner) = &self.hierarchy.owner_scope {
            if owner.contains(':') {
                return Err(ConfigError::invalid_value(
                    "owner_scope",
                    "cannot contain ':'",
                ));
            }
        }

        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid_value(name, format!("'{}' is not a number", value)))
}

fn parse_flag(name: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid_value(
            name,
            format!("'{}' is not a boolean", value),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.store.busy_timeout_ms, DEFAULT_BUSY_TIMEOUT_MS);
        assert!(config.ordering.journal_intents);
        assert_eq!(config.hierarchy.root_id, "home");
        assert_eq!(config.hierarchy.max_depth, 64);
        assert!(config.hierarchy.owner_scope.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();

        config.hierarchy.max_depth = 0;
        assert!(config.validate().is_err());

        config.hierarchy.max_depth = MAX_SUPPORTED_DEPTH + 1;
        assert!(config.validate().is_err());

        config.hierarchy.max_depth = 8;
        config.hierarchy.root_id = String::new();
        assert!(config.validate().is_err());

        config.hierarchy.root_id = "home".to_string();
        config.hierarchy.owner_scope = Some("a:b".to_string());
        assert!(config.validate().is_err());

        config.hierarchy.owner_scope = Some("alice".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("NODECHAIN_DB_PATH", "/tmp/chain.db"),
            ("NODECHAIN_BUSY_TIMEOUT_MS", "250"),
            ("NODECHAIN_JOURNAL_INTENTS", "off"),
            ("NODECHAIN_MAX_DEPTH", "3"),
            ("NODECHAIN_OWNER", "alice"),
        ]))
        .unwrap();

        assert_eq!(
            config.store.resolve_database_path().unwrap(),
            PathBuf::from("/tmp/chain.db")
        );
        assert_eq!(config.store.busy_timeout_ms, 250);
        assert!(!config.ordering.journal_intents);
        assert_eq!(config.hierarchy.max_depth, 3);
        assert_eq!(config.hierarchy.owner_scope.as_deref(), Some("alice"));
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let err = EngineConfig::from_lookup(lookup(&[("NODECHAIN_MAX_DEPTH", "deep")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err =
            EngineConfig::from_lookup(lookup(&[("NODECHAIN_JOURNAL_INTENTS", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_empty_owner_means_unscoped() {
        let config = EngineConfig::from_lookup(lookup(&[("NODECHAIN_OWNER", "")])).unwrap();
        assert!(config.hierarchy.owner_scope.is_none());
    }
}
