//! Fleet runner for simulated air-conditioner units.
//!
//! This crate connects the per-device engine in `aircon-core` to a real
//! broker:
//! - Discovers provisioned devices on disk
//! - Connects each one over mutually authenticated MQTT
//! - Runs one simulation task per device until Ctrl-C
//! - Optionally appends telemetry to per-device CSV files
//! - Sends one-shot operator commands (`aircon-sim send`)
//!
//! # Configuration
//!
//! The simulator reads `~/.config/aircon-sim/simulator.toml`:
//!
//! ```toml
//! [simulator]
//! interval_secs = 60.0
//! telemetry_topic = "aircon/telemetry"
//! error_topic = "aircon/errors"
//! job_settle_ms = 1000
//! write_csv = false
//! csv_dir = "."
//!
//! [mqtt]
//! port = 8883
//! keep_alive_secs = 30
//! reconnect_min_secs = 1
//! reconnect_max_secs = 32
//! channel_capacity = 100
//!
//! [devices]
//! folder = "devices"
//! ```

pub mod config;
pub mod discovery;
pub mod fleet;
pub mod mqtt;
pub mod reconnect;
pub mod send;
pub mod sink;

pub use config::{
    Config, ConfigError, DevicesConfig, MqttConfig, SimulatorConfig, ValidationError,
};
pub use discovery::{Credentials, DeviceInfo, DiscoveredDevice, DiscoveryError, discover};
pub use fleet::{Fleet, FleetError};
pub use mqtt::{MqttError, MqttTransport};
pub use send::{Action, build_command, send_command};
pub use sink::{CsvSink, SinkError};
