//! Topic layout for one simulated device.

use crate::messages::Inbound;

/// Default telemetry publish topic, shared by the whole fleet.
pub const DEFAULT_TELEMETRY_TOPIC: &str = "aircon/telemetry";
/// Default error-alert publish topic, shared by the whole fleet.
pub const DEFAULT_ERROR_TOPIC: &str = "aircon/errors";

/// All topics a device publishes to or listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    device: String,
    telemetry: String,
    errors: String,
    commands: String,
    shadow_update: String,
    shadow_delta: String,
    jobs_notify: String,
}

impl Topics {
    /// Topics for `device` using the default fleet-wide topics.
    pub fn new(device: impl Into<String>) -> Self {
        Self::with_fleet_topics(device, DEFAULT_TELEMETRY_TOPIC, DEFAULT_ERROR_TOPIC)
    }

    /// Topics for `device` with custom telemetry and error-alert topics.
    pub fn with_fleet_topics(
        device: impl Into<String>,
        telemetry: impl Into<String>,
        errors: impl Into<String>,
    ) -> Self {
        let device = device.into();
        Self {
            commands: format!("aircon/commands/{}", device),
            shadow_update: format!("$aws/things/{}/shadow/update", device),
            shadow_delta: format!("$aws/things/{}/shadow/update/delta", device),
            jobs_notify: format!("$aws/things/{}/jobs/notify", device),
            telemetry: telemetry.into(),
            errors: errors.into(),
            device,
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn telemetry(&self) -> &str {
        &self.telemetry
    }

    pub fn errors(&self) -> &str {
        &self.errors
    }

    pub fn commands(&self) -> &str {
        &self.commands
    }

    pub fn shadow_update(&self) -> &str {
        &self.shadow_update
    }

    pub fn shadow_delta(&self) -> &str {
        &self.shadow_delta
    }

    pub fn jobs_notify(&self) -> &str {
        &self.jobs_notify
    }

    /// Status topic for a single job.
    pub fn job_update(&self, job_id: &str) -> String {
        format!("$aws/things/{}/jobs/{}/update", self.device, job_id)
    }

    /// Topics the device must subscribe to.
    pub fn subscriptions(&self) -> [&str; 3] {
        [&self.commands, &self.shadow_delta, &self.jobs_notify]
    }

    /// Classify an inbound publish by topic.
    ///
    /// Returns `None` for topics this device does not listen on.
    pub fn route(&self, topic: &str, payload: Vec<u8>) -> Option<Inbound> {
        if topic == self.commands {
            Some(Inbound::Command(payload))
        } else if topic == self.shadow_delta {
            Some(Inbound::ShadowDelta(payload))
        } else if topic == self.jobs_notify {
            Some(Inbound::JobsNotify(payload))
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_topics() {
        let topics = Topics::new("ac-01");
        assert_eq!(topics.commands(), "aircon/commands/ac-01");
        assert_eq!(topics.shadow_update(), "$aws/things/ac-01/shadow/update");
        assert_eq!(topics.shadow_delta(), "$aws/things/ac-01/shadow/update/delta");
        assert_eq!(topics.jobs_notify(), "$aws/things/ac-01/jobs/notify");
        assert_eq!(topics.job_update("j1"), "$aws/things/ac-01/jobs/j1/update");
        assert_eq!(topics.telemetry(), "aircon/telemetry");
        assert_eq!(topics.errors(), "aircon/errors");
    }

    #[test]
    fn test_custom_fleet_topics() {
        let topics = Topics::with_fleet_topics("ac-02", "lab/telemetry", "lab/errors");
        assert_eq!(topics.telemetry(), "lab/telemetry");
        assert_eq!(topics.errors(), "lab/errors");
        assert_eq!(topics.commands(), "aircon/commands/ac-02");
    }

    #[test]
    fn test_route_by_topic() {
        let topics = Topics::new("ac-01");
        assert_eq!(
            topics.route("aircon/commands/ac-01", b"{}".to_vec()),
            Some(Inbound::Command(b"{}".to_vec()))
        );
        assert!(matches!(
            topics.route("$aws/things/ac-01/shadow/update/delta", Vec::new()),
            Some(Inbound::ShadowDelta(_))
        ));
        assert!(matches!(
            topics.route("$aws/things/ac-01/jobs/notify", Vec::new()),
            Some(Inbound::JobsNotify(_))
        ));
        assert_eq!(topics.route("aircon/commands/ac-02", Vec::new()), None);
        assert_eq!(topics.route("aircon/telemetry", Vec::new()), None);
    }
}
