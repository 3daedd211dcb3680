//! Configuration module for Stocktake.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation, defaults, and a builder pattern for programmatic use.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{DomainError, StaffDirectory, StaffName, SupervisorRoster};

/// Top-level configuration for Stocktake.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub staff: StaffConfig,
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file. A leading `~/` is expanded.
    pub path: PathBuf,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
}

/// Staff identification settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffConfig {
    /// PIN to staff name. PINs are kept as strings so leading zeros survive.
    pub pins: BTreeMap<String, String>,
    /// Names of the people allowed to verify audits.
    pub supervisors: Vec<String>,
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/stocktake/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("stocktake")
            .join("config.yaml")
    }

    /// Builds the PIN lookup table from `staff.pins`.
    pub fn staff_directory(&self) -> Result<StaffDirectory, DomainError> {
        self.staff
            .pins
            .iter()
            .map(|(pin, name)| StaffName::new(name.as_str()).map(|n| (pin.clone(), n)))
            .collect()
    }

    /// Builds the supervisor roster from `staff.supervisors`.
    pub fn supervisor_roster(&self) -> Result<SupervisorRoster, DomainError> {
        let members = self
            .staff
            .supervisors
            .iter()
            .map(|name| StaffName::new(name.as_str()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SupervisorRoster::new(members))
    }
}

impl DatabaseConfig {
    /// Returns `path` with a leading `~/` replaced by the home directory.
    pub fn resolved_path(&self) -> PathBuf {
        match self.path.strip_prefix("~") {
            Ok(rest) => dirs::home_dir()
                .map(|home| home.join(rest))
                .unwrap_or_else(|| self.path.clone()),
            Err(_) => self.path.clone(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("~/.local/share"))
                .join("stocktake")
                .join("stocktake.db"),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"staff.supervisors"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Accepted PIN lengths.
const PIN_LENGTH: std::ops::RangeInclusive<usize> = 4..=8;

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        // --- database ---
        if self.database.path.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "database.path".into(),
                message: "must not be empty".into(),
            });
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError {
                field: "logging.level".into(),
                message: format!(
                    "invalid level '{}'; valid options: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            });
        }

        // --- staff ---
        for (pin, name) in &self.staff.pins {
            if !PIN_LENGTH.contains(&pin.len()) || !pin.chars().all(|c| c.is_ascii_digit()) {
                errors.push(ValidationError {
                    field: format!("staff.pins.{pin}"),
                    message: format!(
                        "PIN must be {}-{} digits",
                        PIN_LENGTH.start(),
                        PIN_LENGTH.end()
                    ),
                });
            }
            if name.trim().is_empty() {
                errors.push(ValidationError {
                    field: format!("staff.pins.{pin}"),
                    message: "staff name must not be empty".into(),
                });
            }
        }

        let mut seen = HashSet::new();
        for name in &self.staff.supervisors {
            let trimmed = name.trim();
            if trimmed.is_empty() {
                errors.push(ValidationError {
                    field: "staff.supervisors".into(),
                    message: "supervisor name must not be empty".into(),
                });
            } else if !seen.insert(trimmed) {
                errors.push(ValidationError {
                    field: "staff.supervisors".into(),
                    message: format!("duplicate supervisor '{trimmed}'"),
                });
            }
        }

        errors
    }
}

/// Builder for constructing a [`Config`] programmatically.
///
/// Starts from [`Config::default`] and allows selective overrides.
///
/// # Example
///
/// ```rust
/// use stocktake_core::config::ConfigBuilder;
///
/// let config = ConfigBuilder::new()
///     .staff_pin("1234", "Masaki Shibata")
///     .supervisor("Masaki Shibata")
///     .logging_level("debug")
///     .build();
/// assert_eq!(config.staff.supervisors.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder initialised with [`Config::default`] values.
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn database_path(mut self, path: PathBuf) -> Self {
        self.config.database.path = path;
        self
    }

    pub fn logging_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn staff_pin(mut self, pin: impl Into<String>, name: impl Into<String>) -> Self {
        self.config.staff.pins.insert(pin.into(), name.into());
        self
    }

    pub fn supervisor(mut self, name: impl Into<String>) -> Self {
        self.config.staff.supervisors.push(name.into());
        self
    }

    /// Consume the builder and return the finished [`Config`].
    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
