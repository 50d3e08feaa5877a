//! MQTT transport for simulated devices.
//!
//! Each device gets its own [`AsyncClient`] and event loop, authenticated
//! with the device's certificate over mutual TLS. The event loop task
//! routes incoming publishes into the device inbox and keeps reconnecting
//! with exponential backoff until the device disconnects.
//!
//! # Delivery
//!
//! | Traffic | QoS |
//! |---------|-----|
//! | telemetry | 1 |
//! | shadow update | 0 |
//! | job status | 1 |
//! | error alert | 1 |
//! | subscriptions | 1 |

use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet};
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use aircon_core::{InboxSender, QoS, Topics, Transport};

use crate::config::MqttConfig;
use crate::discovery::Credentials;
use crate::reconnect::{Backoff, ReconnectOptions};

/// MQTT adapter errors.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),
    #[error("MQTT connection error: {0}")]
    Connection(#[from] rumqttc::ConnectionError),
    #[error("Failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

/// Build client options for a mutually authenticated broker connection.
pub fn mqtt_options(
    client_id: &str,
    endpoint: &str,
    config: &MqttConfig,
    credentials: Credentials,
) -> Result<MqttOptions, MqttError> {
    let (host, port) = parse_endpoint(endpoint, config.port).map_err(|reason| {
        MqttError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        }
    })?;

    let mut options = MqttOptions::new(client_id, host, port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
    options.set_transport(rumqttc::Transport::tls(
        credentials.ca,
        Some((credentials.certificate, credentials.private_key)),
        None,
    ));
    Ok(options)
}

/// Parse a broker endpoint into (host, port).
///
/// Accepts a bare host, `host:port`, or either form behind `mqtts://`.
fn parse_endpoint(endpoint: &str, default_port: u16) -> Result<(String, u16), String> {
    let rest = match endpoint.split_once("://") {
        Some(("mqtts", rest)) => rest,
        Some((scheme, _)) => {
            return Err(format!(
                "unsupported scheme '{}': devices connect over mqtts only",
                scheme
            ));
        }
        None => endpoint,
    };
    let rest = rest.trim_end_matches('/');

    let (host, port) = if let Some((h, p)) = rest.rsplit_once(':') {
        let port = p
            .parse::<u16>()
            .map_err(|_| format!("Invalid port: {}", p))?;
        (h.to_string(), port)
    } else {
        (rest.to_string(), default_port)
    };

    if host.is_empty() {
        return Err("Host cannot be empty".to_string());
    }

    Ok((host, port))
}

fn to_mqtt_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
    }
}

/// [`Transport`] over a rumqttc client.
///
/// Requests are queued without waiting for room: while the event loop is
/// backing off and the client queue is full, calls fail immediately
/// instead of stalling the device.
#[derive(Debug, Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> aircon_core::Result<()> {
        self.client
            .try_publish(topic, to_mqtt_qos(qos), false, payload)
            .map_err(aircon_core::Error::transport)
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> aircon_core::Result<()> {
        self.client
            .try_subscribe(topic, to_mqtt_qos(qos))
            .map_err(aircon_core::Error::transport)
    }

    async fn disconnect(&self) -> aircon_core::Result<()> {
        self.client
            .try_disconnect()
            .map_err(aircon_core::Error::transport)
    }
}

/// Connect one device: returns its transport and the event loop task.
pub fn connect(
    options: MqttOptions,
    config: &MqttConfig,
    topics: Topics,
    inbox: InboxSender,
) -> (MqttTransport, JoinHandle<()>) {
    let (client, eventloop) = AsyncClient::new(options, config.channel_capacity);
    let backoff = Backoff::new(ReconnectOptions::from_config(config));
    let handle = tokio::spawn(drive_event_loop(
        eventloop,
        client.clone(),
        topics,
        inbox,
        backoff,
    ));
    (MqttTransport::new(client), handle)
}

/// Poll the event loop until the client disconnects or the device inbox
/// closes.
async fn drive_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    topics: Topics,
    inbox: InboxSender,
    mut backoff: Backoff,
) {
    let device = topics.device().to_string();
    let mut connected_before = false;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(device = %device, "Connected to broker: {:?}", ack.code);
                backoff.reset();
                // The first subscriptions are issued by the runner; later
                // sessions start clean and need them again.
                if connected_before {
                    resubscribe(&client, &topics);
                }
                connected_before = true;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let Some(message) = topics.route(&publish.topic, publish.payload.to_vec()) else {
                    debug!(device = %device, "Ignoring message on {}", publish.topic);
                    continue;
                };
                match inbox.try_send(message) {
                    Ok(()) => {}
                    Err(TrySendError::Full(message)) => warn!(
                        device = %device,
                        "Inbox full, dropping {} message",
                        message.channel()
                    ),
                    Err(TrySendError::Closed(_)) => {
                        debug!(device = %device, "Device stopped, closing event loop");
                        break;
                    }
                }
            }
            Ok(Event::Incoming(Packet::PingResp)) => {
                debug!(device = %device, "MQTT ping response received");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                debug!(device = %device, "Disconnect sent, closing event loop");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                let delay = backoff.next_delay();
                if backoff.attempts() <= 3 {
                    warn!(device = %device, "MQTT connection error: {}. Reconnecting in {:?}", e, delay);
                } else {
                    error!(
                        device = %device,
                        "MQTT connection error after {} attempts: {}. Reconnecting in {:?}",
                        backoff.attempts(),
                        e,
                        delay
                    );
                }
                tokio::time::sleep(delay).await;
            }
        }
    }
}

// Runs on the event loop task, so it must never wait for queue space.
fn resubscribe(client: &AsyncClient, topics: &Topics) {
    for topic in topics.subscriptions() {
        if let Err(e) = client.try_subscribe(topic, rumqttc::QoS::AtLeastOnce) {
            warn!(device = %topics.device(), "Failed to resubscribe to {}: {}", topic, e);
        }
    }
}
