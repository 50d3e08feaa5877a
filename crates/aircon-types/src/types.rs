//! Enumerated device state values.
//!
//! Every enum here has exactly one wire spelling, shared by `Display`,
//! `FromStr` and serde. Spellings follow what the dashboards and the cloud
//! side already expect, which is why they are not uniformly cased.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $wire:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                $(#[$vmeta])*
                #[serde(rename = $wire)]
                $variant,
            )+
        }

        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The wire spelling of this value.
            #[must_use]
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $wire,)+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok($name::$variant),)+
                    _ => Err(ParseError::InvalidValue {
                        kind: $kind,
                        value: s.to_string(),
                        expected: [$($wire),+].join(", "),
                    }),
                }
            }
        }
    };
}

wire_enum! {
    /// Operating mode selected by the user or the shadow backend.
    Mode, "mode" {
        /// Compressor cycles to hold the setpoint.
        Cool => "cool",
        /// Unit is idle.
        Off => "off",
        /// Fan runs, compressor stays off.
        FanOnly => "fan_only",
    }
}

wire_enum! {
    /// Air filter condition.
    FilterStatus, "filter status" {
        Clean => "Clean",
        NeedsCleaning => "Needs Cleaning",
        Replace => "Replace",
    }
}

wire_enum! {
    /// Power draw profile.
    ///
    /// `Abnormal` makes the unit draw a surge-like 1250-1800 W whenever the
    /// compressor runs, independent of the cooling load.
    WattageMode, "wattage mode" {
        Normal => "normal",
        Abnormal => "abnormal",
    }
}

wire_enum! {
    /// Compressor state.
    CompressorStatus, "compressor status" {
        On => "On",
        Off => "Off",
    }
}

wire_enum! {
    /// Diagnostic code reported with every telemetry sample.
    ErrorCode, "error code" {
        /// No fault present.
        None => "None",
        /// High indoor temperature.
        E1 => "E1",
        /// Low refrigerant pressure.
        E2 => "E2",
        /// Compressor failure.
        E3 => "E3",
    }
}

wire_enum! {
    /// Simulated failure an operator can inject.
    FaultType, "fault type" {
        HighTemperature => "high_temperature",
        LowPressure => "low_pressure",
        CompressorFailure => "compressor_failure",
    }
}

wire_enum! {
    /// Lifecycle status of a remote job.
    JobStatus, "job status" {
        Queued => "QUEUED",
        InProgress => "IN_PROGRESS",
        Succeeded => "SUCCEEDED",
    }
}

impl ErrorCode {
    /// Whether this code signals a fault.
    #[must_use]
    pub fn is_fault(&self) -> bool {
        !matches!(self, ErrorCode::None)
    }
}

impl FaultType {
    /// The error code a device reports while this fault is active.
    #[must_use]
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FaultType::HighTemperature => ErrorCode::E1,
            FaultType::LowPressure => ErrorCode::E2,
            FaultType::CompressorFailure => ErrorCode::E3,
        }
    }
}
