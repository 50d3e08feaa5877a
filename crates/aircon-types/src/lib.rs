//! Platform-agnostic types for simulated air-conditioner units.
//!
//! This crate holds the enumerated state values and the JSON documents a
//! simulated unit exchanges with its messaging backend. It has no runtime
//! dependencies beyond serde so that dashboards and tooling can share it.
//!
//! # Example
//!
//! ```
//! use aircon_types::{FilterStatus, Mode};
//!
//! let mode: Mode = "fan_only".parse().unwrap();
//! assert_eq!(mode, Mode::FanOnly);
//! assert!("Dusty".parse::<FilterStatus>().is_err());
//! ```

pub mod error;
pub mod types;
pub mod wire;

pub use error::{ParseError, ParseResult};
pub use types::{CompressorStatus, ErrorCode, FaultType, FilterStatus, JobStatus, Mode, WattageMode};
pub use wire::{
    ErrorAlert, JobStatusDetails, JobStatusUpdate, ShadowDocument, ShadowReported, ShadowState,
    TelemetryRecord,
};
