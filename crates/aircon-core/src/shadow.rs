//! Differential shadow reporting.
//!
//! The synchronizer remembers the last snapshot it published and only
//! publishes again when the projection of the device state changes. It can
//! be called as often as convenient (every tick, after a command, after a
//! job) without producing duplicate updates.

use tracing::{debug, warn};

use aircon_types::{ShadowDocument, ShadowReported};

use crate::model::DeviceState;
use crate::transport::{QoS, Transport, publish_json};

/// Tracks the last reported shadow state of one device.
#[derive(Debug, Clone)]
pub struct ShadowSynchronizer {
    topic: String,
    last_published: Option<ShadowReported>,
}

impl ShadowSynchronizer {
    /// Create a synchronizer publishing to `topic`. Nothing has been
    /// published yet, so the first call always publishes.
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            last_published: None,
        }
    }

    /// The snapshot most recently handed out for publishing.
    pub fn last_published(&self) -> Option<&ShadowReported> {
        self.last_published.as_ref()
    }

    /// Forget the retained snapshot so the next call publishes unconditionally.
    pub fn invalidate(&mut self) {
        self.last_published = None;
    }

    /// Project `state` and return the document to publish, if anything changed.
    ///
    /// A returned document has already replaced the retained snapshot.
    pub fn diff(&mut self, state: &DeviceState) -> Option<ShadowDocument> {
        let snapshot = state.shadow_projection();
        if self.last_published.as_ref() == Some(&snapshot) {
            return None;
        }
        self.last_published = Some(snapshot.clone());
        Some(ShadowDocument::reported(snapshot))
    }

    /// Publish the reported state if it differs from the last one published.
    ///
    /// Returns whether a publish was attempted. Transport failures are
    /// logged; the snapshot is retained regardless, so a failed publish is
    /// not retried until the state changes again.
    pub async fn maybe_publish(&mut self, state: &DeviceState, transport: &dyn Transport) -> bool {
        let Some(document) = self.diff(state) else {
            return false;
        };
        match publish_json(transport, &self.topic, &document, QoS::AtMostOnce).await {
            Ok(()) => debug!(
                device = %state.name,
                "Reported state to shadow: {:?}",
                document.state.reported
            ),
            Err(e) => warn!(device = %state.name, "Failed to publish shadow update: {}", e),
        }
        true
    }

    /// Publish the reported state even if it is unchanged.
    pub async fn force_publish(&mut self, state: &DeviceState, transport: &dyn Transport) -> bool {
        self.invalidate();
        self.maybe_publish(state, transport).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use aircon_types::{Mode, WattageMode};

    #[test]
    fn test_diff_only_on_change() {
        let mut shadow = ShadowSynchronizer::new("shadow");
        let mut state = DeviceState::new("ac-test");

        assert!(shadow.diff(&state).is_some());
        assert!(shadow.diff(&state).is_none());
        assert!(shadow.diff(&state).is_none());

        state.mode = Mode::FanOnly;
        let doc = shadow.diff(&state).unwrap();
        assert_eq!(doc.state.reported.mode, Mode::FanOnly);
        assert!(shadow.diff(&state).is_none());
    }

    #[test]
    fn test_unprojected_fields_do_not_publish() {
        let mut shadow = ShadowSynchronizer::new("shadow");
        let mut state = DeviceState::new("ac-test");
        shadow.diff(&state);

        state.version = 9.0;
        state.runtime_hours = 120.0;
        state.fan_rpm = 1400;
        state.indoor_humidity_pct = 10;
        // Fractions below a whole degree are invisible in the projection.
        state.indoor_temp_c += 0.4;
        assert!(shadow.diff(&state).is_none());
    }

    #[tokio::test]
    async fn test_maybe_publish_is_idempotent() {
        let transport = MockTransport::new();
        let mut shadow = ShadowSynchronizer::new("$aws/things/ac-test/shadow/update");
        let state = DeviceState::new("ac-test");

        assert!(shadow.maybe_publish(&state, &transport).await);
        assert!(!shadow.maybe_publish(&state, &transport).await);

        let published = transport.published_on("$aws/things/ac-test/shadow/update").await;
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].qos, QoS::AtMostOnce);
        let json = published[0].json();
        assert_eq!(json["state"]["reported"]["mode"], "cool");
    }

    #[tokio::test]
    async fn test_force_publish_repeats_unchanged_state() {
        let transport = MockTransport::new();
        let mut shadow = ShadowSynchronizer::new("shadow");
        let state = DeviceState::new("ac-test");

        shadow.maybe_publish(&state, &transport).await;
        assert!(shadow.force_publish(&state, &transport).await);
        assert_eq!(transport.published_on("shadow").await.len(), 2);
    }

    #[tokio::test]
    async fn test_failed_publish_still_retains_snapshot() {
        let transport = MockTransport::new();
        transport.set_should_fail(true);
        let mut shadow = ShadowSynchronizer::new("shadow");
        let mut state = DeviceState::new("ac-test");

        assert!(shadow.maybe_publish(&state, &transport).await);
        assert!(transport.published().await.is_empty());
        assert!(shadow.last_published().is_some());

        transport.set_should_fail(false);
        assert!(!shadow.maybe_publish(&state, &transport).await);

        state.wattage_mode = WattageMode::Abnormal;
        assert!(shadow.maybe_publish(&state, &transport).await);
        assert_eq!(transport.published().await.len(), 1);
    }
}
