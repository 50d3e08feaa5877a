//! Simulator configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use aircon_core::RunnerConfig;
use aircon_core::runner::DEFAULT_INTERVAL;
use aircon_core::topics::{DEFAULT_ERROR_TOPIC, DEFAULT_TELEMETRY_TOPIC};

/// Simulator configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Simulation settings.
    pub simulator: SimulatorConfig,
    /// Broker connection settings.
    pub mqtt: MqttConfig,
    /// Device discovery settings.
    pub devices: DevicesConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// # Example
    ///
    /// ```
    /// use aircon_service::Config;
    ///
    /// let config = Config::default();
    /// config.validate().expect("Default config should be valid");
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.simulator.validate());
        errors.extend(self.mqtt.validate());
        errors.extend(self.devices.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Simulation settings shared by every device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Seconds between telemetry ticks.
    pub interval_secs: f64,
    /// Topic telemetry is published on.
    pub telemetry_topic: String,
    /// Fleet-wide error alert topic.
    pub error_topic: String,
    /// Delay between a job's two status reports, in milliseconds.
    pub job_settle_ms: u64,
    /// Append every sample to `{device}_telemetry.csv`.
    pub write_csv: bool,
    /// Directory CSV files are written to.
    pub csv_dir: PathBuf,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60.0,
            telemetry_topic: DEFAULT_TELEMETRY_TOPIC.to_string(),
            error_topic: DEFAULT_ERROR_TOPIC.to_string(),
            job_settle_ms: 1000,
            write_csv: false,
            csv_dir: PathBuf::from("."),
        }
    }
}

impl SimulatorConfig {
    /// Validate simulator configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval().is_none() {
            errors.push(ValidationError {
                field: "simulator.interval_secs".to_string(),
                message: format!(
                    "interval {} must be a positive number of seconds of at least 1ns",
                    self.interval_secs
                ),
            });
        }
        for (field, topic) in [
            ("simulator.telemetry_topic", &self.telemetry_topic),
            ("simulator.error_topic", &self.error_topic),
        ] {
            if topic.is_empty() {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: "topic cannot be empty".to_string(),
                });
            } else if topic.contains(['#', '+']) {
                errors.push(ValidationError {
                    field: field.to_string(),
                    message: format!("topic '{}' cannot contain wildcards", topic),
                });
            }
        }
        if self.write_csv && self.csv_dir.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "simulator.csv_dir".to_string(),
                message: "CSV directory cannot be empty".to_string(),
            });
        }

        errors
    }

    /// The tick interval, if `interval_secs` is a representable, non-zero
    /// duration.
    pub fn interval(&self) -> Option<Duration> {
        Duration::try_from_secs_f64(self.interval_secs)
            .ok()
            .filter(|interval| !interval.is_zero())
    }

    /// Runner timing derived from this configuration.
    ///
    /// An invalid interval falls back to the default; [`validate`](Self::validate)
    /// reports it.
    pub fn runner_config(&self) -> RunnerConfig {
        RunnerConfig {
            interval: self.interval().unwrap_or(DEFAULT_INTERVAL),
            job_settle_delay: Duration::from_millis(self.job_settle_ms),
        }
    }
}

/// Broker connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker port; the host comes from each device's `endpoint`.
    pub port: u16,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// First reconnect delay in seconds.
    pub reconnect_min_secs: u64,
    /// Longest reconnect delay in seconds.
    pub reconnect_max_secs: u64,
    /// Capacity of the client's request queue.
    pub channel_capacity: usize,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            port: 8883,
            keep_alive_secs: 30,
            reconnect_min_secs: 1,
            reconnect_max_secs: 32,
            channel_capacity: 100,
        }
    }
}

impl MqttConfig {
    /// Validate broker configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.port == 0 {
            errors.push(ValidationError {
                field: "mqtt.port".to_string(),
                message: "port cannot be 0".to_string(),
            });
        }
        if self.keep_alive_secs < 5 {
            errors.push(ValidationError {
                field: "mqtt.keep_alive_secs".to_string(),
                message: format!(
                    "keep alive {} is too short (minimum 5 seconds)",
                    self.keep_alive_secs
                ),
            });
        }
        if self.reconnect_min_secs == 0 {
            errors.push(ValidationError {
                field: "mqtt.reconnect_min_secs".to_string(),
                message: "reconnect delay cannot be 0".to_string(),
            });
        }
        if self.reconnect_min_secs > self.reconnect_max_secs {
            errors.push(ValidationError {
                field: "mqtt.reconnect_max_secs".to_string(),
                message: format!(
                    "maximum reconnect delay {} is below the minimum {}",
                    self.reconnect_max_secs, self.reconnect_min_secs
                ),
            });
        }
        if self.channel_capacity == 0 {
            errors.push(ValidationError {
                field: "mqtt.channel_capacity".to_string(),
                message: "channel capacity cannot be 0".to_string(),
            });
        }

        errors
    }
}

/// Device discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicesConfig {
    /// Folder searched for `device_info.json` files.
    pub folder: PathBuf,
}

impl Default for DevicesConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("devices"),
        }
    }
}

impl DevicesConfig {
    /// Validate discovery configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.folder.as_os_str().is_empty() {
            errors.push(ValidationError {
                field: "devices.folder".to_string(),
                message: "devices folder cannot be empty".to_string(),
            });
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `simulator.interval_secs`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("aircon-sim")
        .join("simulator.toml")
}
