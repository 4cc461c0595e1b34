//! Configuration loading and typed config structures.
//!
//! The canonical configuration lives in `vauto-config.yaml`. Every section
//! and field has a default, so an empty document is a valid configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `vauto-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct AutomationConfig {
    /// Scheduler tick settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Conveyor background loop settings.
    #[serde(default)]
    pub conveyor: ConveyorConfig,

    /// Validation thresholds.
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Execution defaults.
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Operator API server.
    #[serde(default)]
    pub observer: ObserverConfig,

    /// Plan document storage.
    #[serde(default)]
    pub plans: PlansConfig,
}

impl AutomationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `VAUTO_PLAN_DIR` overrides `plans.directory`
    /// - `VAUTO_OBSERVER_PORT` overrides `observer.port`
    /// - `VAUTO_LOG_FORMAT` overrides `logging.format`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, applying env overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("VAUTO_PLAN_DIR") {
            self.plans.directory = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("VAUTO_OBSERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.observer.port = port;
            }
        }
        if let Ok(val) = std::env::var("VAUTO_LOG_FORMAT") {
            self.logging.format = val;
        }
    }
}

/// Scheduler tick settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SchedulerConfig {
    /// Milliseconds between `process_scheduled_events` calls.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
        }
    }
}

/// Conveyor background loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConveyorConfig {
    /// Milliseconds between conveyor polls.
    #[serde(default = "default_tick_interval_ms")]
    pub poll_interval_ms: u64,

    /// Seconds between sweeps of one territory unless overridden.
    #[serde(default = "default_update_interval_secs")]
    pub default_update_interval_secs: u64,

    /// Most items of one kind moved per link per sweep.
    #[serde(default = "default_max_batch")]
    pub max_batch: u32,
}

impl Default for ConveyorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_tick_interval_ms(),
            default_update_interval_secs: default_update_interval_secs(),
            max_batch: default_max_batch(),
        }
    }
}

/// Validation thresholds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ValidationConfig {
    /// Largest absolute coordinate on any axis.
    #[serde(default = "default_coordinate_limit")]
    pub coordinate_limit: f64,

    /// Schematic ids shorter than this produce a warning. Off when absent.
    #[serde(default)]
    pub schematic_id_min_len: Option<usize>,

    /// Warn when two zones of a plan overlap.
    #[serde(default = "default_true")]
    pub warn_on_zone_overlap: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            coordinate_limit: default_coordinate_limit(),
            schematic_id_min_len: None,
            warn_on_zone_overlap: true,
        }
    }
}

/// Execution defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutionConfig {
    /// Attach a visualization snapshot to dry runs unless asked otherwise.
    #[serde(default)]
    pub visualize_by_default: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format: `pretty` or `json`.
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Operator API server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ObserverConfig {
    /// Whether to start the server.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_observer_port")]
    pub port: u16,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_observer_port(),
        }
    }
}

/// Plan document storage.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PlansConfig {
    /// Directory holding one JSON document per plan.
    #[serde(default = "default_plan_directory")]
    pub directory: PathBuf,

    /// Load every stored plan at startup.
    #[serde(default = "default_true")]
    pub autoload: bool,
}

impl Default for PlansConfig {
    fn default() -> Self {
        Self {
            directory: default_plan_directory(),
            autoload: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_update_interval_secs() -> u64 {
    30
}

const fn default_max_batch() -> u32 {
    100
}

const fn default_coordinate_limit() -> f64 {
    10_000.0
}

const fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_log_format() -> String {
    "pretty".to_owned()
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_observer_port() -> u16 {
    8080
}

fn default_plan_directory() -> PathBuf {
    PathBuf::from("plans")
}
