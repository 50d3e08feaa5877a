//! Messaging transport abstraction.
//!
//! The engine only needs to publish, to subscribe and to tear the
//! connection down. Reconnection, backoff and offline queueing are the
//! implementation's job; inbound messages are delivered by the
//! implementation into the device [`Inbox`](crate::messages::Inbox) rather
//! than through callbacks.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;

/// Delivery guarantee requested for a publish or subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QoS {
    /// Fire and forget.
    AtMostOnce,
    /// Redelivered until acknowledged.
    AtLeastOnce,
}

/// Trait abstracting the publish/subscribe connection of one device.
///
/// Implemented by the MQTT adapter in the service and by
/// [`MockTransport`](crate::mock::MockTransport) for tests.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Publish a payload on a topic.
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<()>;

    /// Subscribe to a topic.
    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()>;

    /// Close the connection.
    async fn disconnect(&self) -> Result<()>;
}

/// Serialize `value` as JSON and publish it.
pub async fn publish_json<T>(
    transport: &dyn Transport,
    topic: &str,
    value: &T,
    qos: QoS,
) -> Result<()>
where
    T: Serialize + Sync + ?Sized,
{
    let payload = serde_json::to_vec(value)?;
    transport.publish(topic, payload, qos).await
}
