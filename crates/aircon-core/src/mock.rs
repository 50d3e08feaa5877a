//! Mock transport implementation for testing.
//!
//! [`MockTransport`] records everything a device runner publishes and
//! subscribes to, so engine behavior can be asserted without a broker.
//!
//! # Features
//!
//! - **Capture**: every publish is kept with its topic and QoS
//! - **Failure injection**: fail every operation, or only the next few

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::{Error, Result};
use crate::transport::{QoS, Transport};

/// A message captured by [`MockTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

impl Published {
    /// Decode the payload as JSON. Malformed payloads decode to `Null`.
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// An in-memory transport for testing.
///
/// # Example
///
/// ```
/// use aircon_core::{MockTransport, QoS, Transport};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new();
///     transport.publish("aircon/telemetry", b"{}".to_vec(), QoS::AtLeastOnce).await.unwrap();
///     assert_eq!(transport.published_on("aircon/telemetry").await.len(), 1);
/// }
/// ```
#[derive(Debug)]
pub struct MockTransport {
    published: RwLock<Vec<Published>>,
    subscriptions: RwLock<Vec<(String, QoS)>>,
    connected: AtomicBool,
    disconnect_count: AtomicU32,
    should_fail: AtomicBool,
    /// Operations still to fail before succeeding again.
    remaining_failures: AtomicU32,
}

impl MockTransport {
    /// Create a connected mock transport.
    pub fn new() -> Self {
        Self {
            published: RwLock::new(Vec::new()),
            subscriptions: RwLock::new(Vec::new()),
            connected: AtomicBool::new(true),
            disconnect_count: AtomicU32::new(0),
            should_fail: AtomicBool::new(false),
            remaining_failures: AtomicU32::new(0),
        }
    }

    fn check_should_fail(&self) -> Result<()> {
        if self.remaining_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(Error::transport("Mock transient failure"));
        }
        if self.should_fail.load(Ordering::Relaxed) {
            Err(Error::transport("Mock failure"))
        } else {
            Ok(())
        }
    }

    // --- Test control methods ---

    /// Make every subsequent operation fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Fail only the next `count` operations.
    pub fn set_transient_failures(&self, count: u32) {
        self.remaining_failures.store(count, Ordering::Relaxed);
    }

    /// All captured publishes, oldest first.
    pub async fn published(&self) -> Vec<Published> {
        self.published.read().await.clone()
    }

    /// Captured publishes on one topic, oldest first.
    pub async fn published_on(&self, topic: &str) -> Vec<Published> {
        self.published
            .read()
            .await
            .iter()
            .filter(|p| p.topic == topic)
            .cloned()
            .collect()
    }

    /// Forget captured publishes.
    pub async fn clear(&self) {
        self.published.write().await.clear();
    }

    /// Topics subscribed to so far with their QoS.
    pub async fn subscriptions(&self) -> Vec<(String, QoS)> {
        self.subscriptions.read().await.clone()
    }

    /// Whether [`Transport::disconnect`] has not been called yet.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    /// How many times the transport was disconnected.
    pub fn disconnect_count(&self) -> u32 {
        self.disconnect_count.load(Ordering::Relaxed)
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<()> {
        self.check_should_fail()?;
        self.published.write().await.push(Published {
            topic: topic.to_string(),
            payload,
            qos,
        });
        Ok(())
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<()> {
        self.check_should_fail()?;
        self.subscriptions
            .write()
            .await
            .push((topic.to_string(), qos));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, Ordering::Relaxed);
        self.disconnect_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
