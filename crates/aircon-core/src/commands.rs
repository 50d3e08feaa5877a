//! Command dispatcher.
//!
//! Applies operator commands and shadow deltas to a [`DeviceState`].
//! Dispatch never fails: values outside their accepted set are logged and
//! ignored, and the caller is told which follow-up the change requires
//! through an [`Effect`].
//!
//! # Command Payloads
//!
//! Commands arrive on `aircon/commands/{device}` as
//! `{"action": "...", ...}`:
//!
//! | Action | Extra field | Effect |
//! |--------|-------------|--------|
//! | `inject_fault` | `fault_type` | marks a fault injected |
//! | `clear_fault` | - | clears the fault and the error code |
//! | `update_filter_status` | `filter_status` | sets the filter status |
//! | `reset_runtime` | - | zeroes the runtime counter |
//! | `set_wattage_mode` | `wattage_mode` | changes the power profile, reports shadow |
//! | `disconnect` | - | stops the device |

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use aircon_types::{ErrorCode, FaultType, FilterStatus, Mode, WattageMode};

use crate::error::{Error, Result};
use crate::model::DeviceState;
use crate::util::coerce_number;

/// An operator command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Command {
    InjectFault {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        fault_type: Option<String>,
    },
    ClearFault,
    UpdateFilterStatus {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter_status: Option<String>,
    },
    ResetRuntime,
    SetWattageMode {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        wattage_mode: Option<String>,
    },
    Disconnect,
    /// Any action this device does not implement.
    #[serde(other)]
    Unknown,
}

impl Command {
    /// Decode a command payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::protocol("command", e))
    }
}

/// Desired-state difference pushed by the shadow backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShadowDelta {
    #[serde(default)]
    pub state: DesiredState,
}

/// The `state` member of a [`ShadowDelta`]. Values are kept loosely typed
/// and validated when applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DesiredState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub setpoint_temperature_c: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<Value>,
}

impl ShadowDelta {
    /// Decode a shadow delta payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::protocol("shadow delta", e))
    }
}

/// Follow-up the runner must perform after a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    /// Nothing beyond the state change.
    None,
    /// Report the shadow if its projection changed.
    ReportShadow,
    /// Report the shadow even if its projection is unchanged.
    ForceShadow,
    /// Stop the device and tear down its connection.
    Disconnect,
}

/// Apply an operator command.
pub fn dispatch(state: &mut DeviceState, command: Command) -> Effect {
    match command {
        Command::InjectFault { fault_type } => {
            state.fault_injected = true;
            state.fault_type = match fault_type.as_deref().map(str::parse::<FaultType>) {
                Some(Ok(fault)) => Some(fault),
                Some(Err(e)) => {
                    warn!(device = %state.name, "Injected fault has no effect: {}", e);
                    None
                }
                None => {
                    warn!(device = %state.name, "Injected fault has no fault_type");
                    None
                }
            };
            info!(device = %state.name, "Injecting fault: {:?}", fault_type);
            Effect::None
        }
        Command::ClearFault => {
            state.fault_injected = false;
            state.fault_type = None;
            state.error_code = ErrorCode::None;
            info!(device = %state.name, "Clearing faults");
            Effect::None
        }
        Command::UpdateFilterStatus { filter_status } => {
            match filter_status.as_deref().map(str::parse::<FilterStatus>) {
                Some(Ok(status)) => {
                    state.filter_status = status;
                    info!(device = %state.name, "Updated filter status to: {}", status);
                }
                Some(Err(e)) => warn!(device = %state.name, "Ignoring filter status update: {}", e),
                None => warn!(device = %state.name, "Filter status update without filter_status"),
            }
            Effect::None
        }
        Command::ResetRuntime => {
            state.runtime_hours = 0.0;
            info!(device = %state.name, "Runtime hours reset to zero");
            Effect::None
        }
        Command::SetWattageMode { wattage_mode } => {
            match wattage_mode.as_deref().map(str::parse::<WattageMode>) {
                Some(Ok(mode)) => {
                    state.wattage_mode = mode;
                    info!(device = %state.name, "Wattage mode set to {}", mode);
                }
                Some(Err(e)) => warn!(device = %state.name, "Ignoring wattage mode: {}", e),
                None => warn!(device = %state.name, "Wattage mode command without wattage_mode"),
            }
            Effect::ReportShadow
        }
        Command::Disconnect => {
            info!(device = %state.name, "Received disconnect command");
            Effect::Disconnect
        }
        Command::Unknown => {
            warn!(device = %state.name, "Unknown action, command ignored");
            Effect::None
        }
    }
}

/// Apply a shadow delta. Always asks for a forced shadow report so the
/// backend sees the reported state converge.
pub fn apply_delta(state: &mut DeviceState, delta: &ShadowDelta) -> Effect {
    if let Some(value) = &delta.state.setpoint_temperature_c {
        match coerce_number(value) {
            Some(setpoint) => {
                state.setpoint_temp_c = setpoint.trunc();
                info!(
                    device = %state.name,
                    "Updated setpoint temperature to: {}",
                    state.setpoint_temp_c
                );
            }
            None => warn!(device = %state.name, "Invalid setpoint temperature: {}", value),
        }
    }

    if let Some(value) = &delta.state.mode {
        match value.as_str().map(str::parse::<Mode>) {
            Some(Ok(mode)) => {
                state.mode = mode;
                info!(device = %state.name, "Updated mode to: {}", mode);
            }
            _ => warn!(device = %state.name, "Invalid mode: {}", value),
        }
    }

    Effect::ForceShadow
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn state() -> DeviceState {
        DeviceState::new("ac-test")
    }

    fn command(value: serde_json::Value) -> Command {
        Command::from_slice(value.to_string().as_bytes()).unwrap()
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            command(json!({"action": "inject_fault", "fault_type": "low_pressure"})),
            Command::InjectFault {
                fault_type: Some("low_pressure".to_string())
            }
        );
        assert_eq!(command(json!({"action": "clear_fault"})), Command::ClearFault);
        assert_eq!(
            command(json!({"action": "reset_runtime", "extra": true})),
            Command::ResetRuntime
        );
        assert_eq!(command(json!({"action": "self_destruct"})), Command::Unknown);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            Command::from_slice(b"not json"),
            Err(Error::Protocol { channel: "command", .. })
        ));
        assert!(Command::from_slice(br#"{"fault_type": "low_pressure"}"#).is_err());
    }

    #[test]
    fn test_serialize_matches_wire() {
        let cmd = Command::SetWattageMode {
            wattage_mode: Some("abnormal".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"action": "set_wattage_mode", "wattage_mode": "abnormal"})
        );
        assert_eq!(
            serde_json::to_value(Command::ClearFault).unwrap(),
            json!({"action": "clear_fault"})
        );
    }

    #[test]
    fn test_inject_and_clear_fault() {
        let mut state = state();
        let effect = dispatch(
            &mut state,
            Command::InjectFault {
                fault_type: Some("high_temperature".to_string()),
            },
        );
        assert_eq!(effect, Effect::None);
        assert!(state.fault_injected);
        assert_eq!(state.fault_type, Some(FaultType::HighTemperature));

        state.error_code = ErrorCode::E1;
        dispatch(&mut state, Command::ClearFault);
        assert!(!state.fault_injected);
        assert_eq!(state.fault_type, None);
        assert_eq!(state.error_code, ErrorCode::None);
    }

    #[test]
    fn test_inject_unknown_fault_still_marks_injected() {
        let mut state = state();
        dispatch(
            &mut state,
            Command::InjectFault {
                fault_type: Some("gremlins".to_string()),
            },
        );
        assert!(state.fault_injected);
        assert_eq!(state.fault_type, None);
    }

    #[test]
    fn test_filter_status_validation() {
        let mut state = state();
        dispatch(
            &mut state,
            Command::UpdateFilterStatus {
                filter_status: Some("Replace".to_string()),
            },
        );
        assert_eq!(state.filter_status, FilterStatus::Replace);

        let before = state.clone();
        dispatch(
            &mut state,
            Command::UpdateFilterStatus {
                filter_status: Some("Dusty".to_string()),
            },
        );
        dispatch(&mut state, Command::UpdateFilterStatus { filter_status: None });
        assert_eq!(state, before);
    }

    #[test]
    fn test_reset_runtime() {
        let mut state = state();
        state.runtime_hours = 812.5;
        dispatch(&mut state, Command::ResetRuntime);
        assert_eq!(state.runtime_hours, 0.0);
    }

    #[test]
    fn test_wattage_mode_reports_shadow_even_when_invalid() {
        let mut state = state();
        let effect = dispatch(
            &mut state,
            Command::SetWattageMode {
                wattage_mode: Some("abnormal".to_string()),
            },
        );
        assert_eq!(effect, Effect::ReportShadow);
        assert_eq!(state.wattage_mode, WattageMode::Abnormal);

        let effect = dispatch(
            &mut state,
            Command::SetWattageMode {
                wattage_mode: Some("ludicrous".to_string()),
            },
        );
        assert_eq!(effect, Effect::ReportShadow);
        assert_eq!(state.wattage_mode, WattageMode::Abnormal);
    }

    #[test]
    fn test_disconnect_and_unknown() {
        let mut state = state();
        let before = state.clone();
        assert_eq!(dispatch(&mut state, Command::Disconnect), Effect::Disconnect);
        assert_eq!(dispatch(&mut state, Command::Unknown), Effect::None);
        assert_eq!(state, before);
    }

    #[test]
    fn test_delta_setpoint_and_mode() {
        let mut state = state();
        let delta =
            ShadowDelta::from_slice(br#"{"state": {"setpoint_temperature_c": 19, "mode": "off"}}"#)
                .unwrap();
        assert_eq!(apply_delta(&mut state, &delta), Effect::ForceShadow);
        assert_eq!(state.setpoint_temp_c, 19.0);
        assert_eq!(state.mode, Mode::Off);
    }

    #[test]
    fn test_delta_setpoint_has_no_bounds() {
        let mut state = state();
        let delta = ShadowDelta::from_slice(br#"{"state": {"setpoint_temperature_c": "-40"}}"#)
            .unwrap();
        apply_delta(&mut state, &delta);
        assert_eq!(state.setpoint_temp_c, -40.0);

        let delta =
            ShadowDelta::from_slice(br#"{"state": {"setpoint_temperature_c": 99.9}}"#).unwrap();
        apply_delta(&mut state, &delta);
        assert_eq!(state.setpoint_temp_c, 99.0);
    }

    #[test]
    fn test_delta_invalid_mode_ignored() {
        let mut state = state();
        let delta =
            ShadowDelta::from_slice(br#"{"state": {"mode": "heat", "setpoint_temperature_c": 21}}"#)
                .unwrap();
        assert_eq!(apply_delta(&mut state, &delta), Effect::ForceShadow);
        assert_eq!(state.mode, Mode::Cool);
        assert_eq!(state.setpoint_temp_c, 21.0);

        let delta = ShadowDelta::from_slice(br#"{"state": {"mode": 3}}"#).unwrap();
        apply_delta(&mut state, &delta);
        assert_eq!(state.mode, Mode::Cool);
    }

    #[test]
    fn test_empty_delta() {
        let mut state = state();
        let before = state.clone();
        let delta = ShadowDelta::from_slice(b"{}").unwrap();
        assert_eq!(apply_delta(&mut state, &delta), Effect::ForceShadow);
        assert_eq!(state, before);
    }
}
