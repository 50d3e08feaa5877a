//! JSON documents exchanged with the messaging backend.

use serde::{Deserialize, Serialize};

use crate::types::{CompressorStatus, ErrorCode, FilterStatus, JobStatus, Mode, WattageMode};

/// One telemetry sample as published on the telemetry topic.
///
/// Numeric fields are reported as integers; the simulation keeps finer
/// state internally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryRecord {
    pub device_name: String,
    pub indoor_temperature_c: i64,
    pub outdoor_temperature_c: i64,
    pub setpoint_temperature_c: i64,
    pub mode: Mode,
    pub indoor_humidity_percent: i64,
    pub outdoor_humidity_percent: i64,
    pub power_consumption_watts: i64,
    pub compressor_status: CompressorStatus,
    pub fan_speed_rpm: i64,
    pub refrigerant_pressure_psi: i64,
    pub error_code: ErrorCode,
    pub filter_status: FilterStatus,
    pub runtime_hours: i64,
}

/// The subset of device state mirrored into the shadow's `reported` section.
///
/// Two snapshots compare equal exactly when a shadow update would carry no
/// new information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowReported {
    pub indoor_temperature_c: i64,
    pub outdoor_temperature_c: i64,
    pub setpoint_temperature_c: i64,
    pub mode: Mode,
    pub power_consumption_watts: i64,
    pub compressor_status: CompressorStatus,
    pub wattage_mode: WattageMode,
}

/// Shadow update request body: `{"state": {"reported": {...}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowDocument {
    pub state: ShadowState,
}

/// The `state` member of a [`ShadowDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowState {
    pub reported: ShadowReported,
}

impl ShadowDocument {
    /// Wrap a reported snapshot.
    pub fn reported(reported: ShadowReported) -> Self {
        Self {
            state: ShadowState { reported },
        }
    }
}

/// Fleet-wide alert emitted when a device enters an error state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorAlert {
    pub device_name: String,
    pub error_code: ErrorCode,
    /// Seconds since the Unix epoch.
    pub timestamp: f64,
}

/// Body published on a job's status topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusUpdate {
    pub status: JobStatus,
    #[serde(rename = "statusDetails")]
    pub status_details: JobStatusDetails,
}

/// `statusDetails` of a [`JobStatusUpdate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatusDetails {
    /// Device version, rendered as a decimal string ("1.0", "3.5").
    pub version: String,
}

impl JobStatusUpdate {
    /// Build a status update carrying the given device version.
    pub fn new(status: JobStatus, version: f64) -> Self {
        Self {
            status,
            status_details: JobStatusDetails {
                version: format_version(version),
            },
        }
    }
}

/// Render a version number with at least one fractional digit.
///
/// ```
/// use aircon_types::wire::format_version;
///
/// assert_eq!(format_version(1.0), "1.0");
/// assert_eq!(format_version(3.5), "3.5");
/// ```
#[must_use]
pub fn format_version(version: f64) -> String {
    // Debug formatting keeps the trailing ".0" that Display drops.
    format!("{:?}", version)
}
