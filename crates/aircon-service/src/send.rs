//! One-shot operator commands.
//!
//! Publishes a single command on `aircon/commands/{device}` at QoS 1, waits
//! for the broker's acknowledgement and disconnects.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet};
use tracing::{debug, info};

use aircon_core::{Command, Topics};
use aircon_types::{FaultType, FilterStatus, WattageMode};

use crate::config::MqttConfig;
use crate::discovery::Credentials;
use crate::mqtt::{MqttError, mqtt_options};

/// Default time allowed for connect, publish and disconnect.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Command actions accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Action {
    InjectFault,
    ClearFault,
    UpdateFilterStatus,
    ResetRuntime,
    SetWattageMode,
    Disconnect,
}

/// Build the command for `action`. Arguments the action does not use are
/// ignored.
pub fn build_command(
    action: Action,
    fault_type: Option<FaultType>,
    filter_status: Option<FilterStatus>,
    wattage_mode: Option<WattageMode>,
) -> Command {
    match action {
        Action::InjectFault => Command::InjectFault {
            fault_type: fault_type.map(|f| f.to_string()),
        },
        Action::ClearFault => Command::ClearFault,
        Action::UpdateFilterStatus => Command::UpdateFilterStatus {
            filter_status: filter_status.map(|f| f.to_string()),
        },
        Action::ResetRuntime => Command::ResetRuntime,
        Action::SetWattageMode => Command::SetWattageMode {
            wattage_mode: wattage_mode.map(|w| w.to_string()),
        },
        Action::Disconnect => Command::Disconnect,
    }
}

/// Publish `command` to `device` through the broker at `endpoint`.
pub async fn send_command(
    device: &str,
    command: &Command,
    endpoint: &str,
    config: &MqttConfig,
    credentials: Credentials,
    timeout: Duration,
) -> Result<(), MqttError> {
    let client_id = format!("aircon-sim-send-{}", std::process::id());
    let options = mqtt_options(&client_id, endpoint, config, credentials)?;
    let (client, eventloop) = AsyncClient::new(options, 10);

    let topic = Topics::new(device).commands().to_string();
    let payload = serde_json::to_vec(command)?;
    client
        .publish(&topic, rumqttc::QoS::AtLeastOnce, false, payload)
        .await?;

    tokio::time::timeout(timeout, await_ack_and_disconnect(&client, eventloop))
        .await
        .map_err(|_| MqttError::Timeout(timeout))??;

    info!("Command delivered to {}", topic);
    Ok(())
}

async fn await_ack_and_disconnect(
    client: &AsyncClient,
    mut eventloop: EventLoop,
) -> Result<(), MqttError> {
    loop {
        match eventloop.poll().await? {
            Event::Incoming(Packet::ConnAck(_)) => debug!("Connected to broker"),
            Event::Incoming(Packet::PubAck(_)) => {
                debug!("Command acknowledged");
                client.disconnect().await?;
            }
            Event::Outgoing(Outgoing::Disconnect) => return Ok(()),
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_command_payloads() {
        let cases = [
            (
                build_command(Action::InjectFault, Some(FaultType::LowPressure), None, None),
                json!({"action": "inject_fault", "fault_type": "low_pressure"}),
            ),
            (
                build_command(
                    Action::UpdateFilterStatus,
                    None,
                    Some(FilterStatus::NeedsCleaning),
                    None,
                ),
                json!({"action": "update_filter_status", "filter_status": "Needs Cleaning"}),
            ),
            (
                build_command(Action::SetWattageMode, None, None, Some(WattageMode::Abnormal)),
                json!({"action": "set_wattage_mode", "wattage_mode": "abnormal"}),
            ),
            (
                build_command(Action::ClearFault, Some(FaultType::LowPressure), None, None),
                json!({"action": "clear_fault"}),
            ),
            (
                build_command(Action::Disconnect, None, None, None),
                json!({"action": "disconnect"}),
            ),
        ];
        for (command, expected) in cases {
            assert_eq!(serde_json::to_value(&command).unwrap(), expected);
        }
    }

    #[test]
    fn test_inject_fault_without_type_omits_field() {
        let command = build_command(Action::InjectFault, None, None, None);
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({"action": "inject_fault"})
        );
    }

    #[test]
    fn test_action_names() {
        use clap::ValueEnum;
        let names: Vec<String> = Action::value_variants()
            .iter()
            .filter_map(|a| a.to_possible_value())
            .map(|v| v.get_name().to_string())
            .collect();
        assert_eq!(
            names,
            vec![
                "inject_fault",
                "clear_fault",
                "update_filter_status",
                "reset_runtime",
                "set_wattage_mode",
                "disconnect",
            ]
        );
    }
}
