//! CSV telemetry files.
//!
//! One file per device, `{device}_telemetry.csv`, appended to across runs.
//! The header row is written only when the file is created.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use aircon_core::{TelemetrySample, TelemetrySink};

/// Column order of telemetry files.
pub const CSV_HEADER: [&str; 14] = [
    "timestamp",
    "device_name",
    "indoor_temperature_c",
    "outdoor_temperature_c",
    "setpoint_temperature_c",
    "mode",
    "power_consumption_watts",
    "compressor_status",
    "fan_speed_rpm",
    "refrigerant_pressure_psi",
    "error_code",
    "filter_status",
    "runtime_hours",
    "wattage_mode",
];

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// Telemetry file errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to open telemetry file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write telemetry row: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to format sample timestamp: {0}")]
    Timestamp(#[from] time::error::Format),
}

/// Appends telemetry samples to a per-device CSV file.
pub struct CsvSink {
    path: PathBuf,
    writer: csv::Writer<File>,
}

impl std::fmt::Debug for CsvSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsvSink").field("path", &self.path).finish()
    }
}

/// File name used for `device`'s telemetry.
pub fn telemetry_file_name(device: &str) -> String {
    format!("{}_telemetry.csv", device)
}

impl CsvSink {
    /// Open (or create) the telemetry file for `device` in `dir`.
    pub fn open(dir: &Path, device: &str) -> Result<Self, SinkError> {
        let path = dir.join(telemetry_file_name(device));
        let io_error = |source| SinkError::Io {
            path: path.clone(),
            source,
        };

        std::fs::create_dir_all(dir).map_err(io_error)?;
        let is_new = std::fs::metadata(&path).map(|m| m.len() == 0).unwrap_or(true);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_error)?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(CSV_HEADER)?;
            writer.flush().map_err(io_error)?;
        }

        Ok(Self { path, writer })
    }

    /// Location of the file being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&mut self, sample: &TelemetrySample) -> Result<(), SinkError> {
        let record = &sample.record;
        self.writer.write_record([
            format_timestamp(sample.captured_at)?,
            record.device_name.clone(),
            record.indoor_temperature_c.to_string(),
            record.outdoor_temperature_c.to_string(),
            record.setpoint_temperature_c.to_string(),
            record.mode.to_string(),
            record.power_consumption_watts.to_string(),
            record.compressor_status.to_string(),
            record.fan_speed_rpm.to_string(),
            record.refrigerant_pressure_psi.to_string(),
            record.error_code.to_string(),
            record.filter_status.to_string(),
            record.runtime_hours.to_string(),
            sample.wattage_mode.to_string(),
        ])?;
        self.writer.flush().map_err(|source| SinkError::Io {
            path: self.path.clone(),
            source,
        })
    }
}

impl TelemetrySink for CsvSink {
    fn write(&mut self, sample: &TelemetrySample) -> aircon_core::Result<()> {
        self.append(sample).map_err(aircon_core::Error::sink)
    }
}

/// `YYYY-MM-DD HH:MM:SS`.
fn format_timestamp(at: OffsetDateTime) -> Result<String, time::error::Format> {
    at.format(TIMESTAMP_FORMAT)
}
