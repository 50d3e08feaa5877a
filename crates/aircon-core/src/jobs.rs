//! Job executor.
//!
//! Jobs arrive through a notify message and run a two-phase status
//! protocol: `IN_PROGRESS` is published right away, then after a settle
//! delay the increment is applied to the device version and `SUCCEEDED` is
//! published. The settle delay is a spawned timer that posts the job back
//! into the device inbox, so the device keeps handling other messages while
//! a job settles.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use aircon_types::{JobStatus, JobStatusUpdate};

use crate::error::{Error, Result};
use crate::messages::{InboxSender, Inbound};
use crate::model::DeviceState;
use crate::topics::Topics;
use crate::transport::{QoS, Transport, publish_json};
use crate::util::coerce_number;

/// The only job command this device implements.
pub const INCREMENT_COMMAND: &str = "increment";

/// Increment applied when a job names none or an unusable one.
pub const DEFAULT_INCREMENT: f64 = 1.0;

/// Default settle delay between `IN_PROGRESS` and `SUCCEEDED`.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Payload of a jobs-notify message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobsNotification {
    #[serde(default)]
    pub jobs: Vec<JobDescriptor>,
}

impl JobsNotification {
    /// Decode a jobs-notify payload.
    pub fn from_slice(payload: &[u8]) -> Result<Self> {
        serde_json::from_slice(payload).map_err(|e| Error::protocol("jobs notify", e))
    }
}

/// One job as announced by the jobs backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Usually a string; numeric ids are accepted too.
    #[serde(rename = "jobId", default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<Value>,
    #[serde(rename = "jobDocument", default)]
    pub job_document: JobDocument,
}

impl JobDescriptor {
    /// The job id as used in status topics. Only strings and numbers
    /// qualify.
    pub fn id(&self) -> Option<String> {
        match self.job_id.as_ref()? {
            Value::String(id) if !id.is_empty() => Some(id.clone()),
            Value::Number(id) => Some(id.to_string()),
            _ => None,
        }
    }
}

/// What a job asks the device to do.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDocument {
    #[serde(default)]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub increment: Option<Value>,
}

/// A job accepted for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub job_id: String,
    pub status: JobStatus,
    pub increment: f64,
}

impl Job {
    /// A queued increment job.
    pub fn new(job_id: impl Into<String>, increment: f64) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Queued,
            increment,
        }
    }
}

/// Read a job increment, falling back to [`DEFAULT_INCREMENT`] when it is
/// absent, not numeric or negative. The device version never decreases.
pub fn parse_increment(value: Option<&Value>) -> f64 {
    let Some(raw) = value else {
        return DEFAULT_INCREMENT;
    };
    match coerce_number(raw) {
        Some(increment) if increment >= 0.0 => increment,
        _ => {
            warn!("Unusable job increment {}, using {}", raw, DEFAULT_INCREMENT);
            DEFAULT_INCREMENT
        }
    }
}

/// Runs increment jobs for one device.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    settle_delay: Duration,
    inbox: InboxSender,
}

impl JobExecutor {
    /// Create an executor whose settled jobs are posted to `inbox`.
    pub fn new(settle_delay: Duration, inbox: InboxSender) -> Self {
        Self { settle_delay, inbox }
    }

    /// Delay between the two status publishes.
    pub fn settle_delay(&self) -> Duration {
        self.settle_delay
    }

    /// Turn a notification into queued jobs. Descriptors without a usable id
    /// or with a command other than `increment` are logged and skipped.
    pub fn accept(&self, device: &str, notification: &JobsNotification) -> Vec<Job> {
        if notification.jobs.is_empty() {
            info!(device = %device, "No jobs in notification");
            return Vec::new();
        }

        notification
            .jobs
            .iter()
            .filter_map(|descriptor| {
                let Some(job_id) = descriptor.id() else {
                    warn!(device = %device, "Skipping job without jobId");
                    return None;
                };
                match descriptor.job_document.command.as_deref() {
                    Some(INCREMENT_COMMAND) => {
                        let increment = parse_increment(descriptor.job_document.increment.as_ref());
                        info!(device = %device, "Received job {}: increment by {}", job_id, increment);
                        Some(Job::new(job_id, increment))
                    }
                    other => {
                        warn!(device = %device, "Unknown job command {:?} for job {}", other, job_id);
                        None
                    }
                }
            })
            .collect()
    }

    /// Publish `IN_PROGRESS` for a queued job.
    pub async fn begin(
        &self,
        job: &mut Job,
        state: &DeviceState,
        topics: &Topics,
        transport: &dyn Transport,
    ) -> Result<()> {
        let update = JobStatusUpdate::new(JobStatus::InProgress, state.version);
        publish_json(transport, &topics.job_update(&job.job_id), &update, QoS::AtLeastOnce).await?;
        job.status = JobStatus::InProgress;
        info!(device = %state.name, "Job {} in progress", job.job_id);
        Ok(())
    }

    /// Post the job back into the inbox once the settle delay has elapsed.
    pub fn schedule(&self, job: Job) -> JoinHandle<()> {
        let delay = self.settle_delay;
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let job_id = job.job_id.clone();
            if inbox.send(Inbound::JobSettled(job)).await.is_err() {
                debug!("Device stopped before job {} settled", job_id);
            }
        })
    }

    /// Apply the job's increment and publish `SUCCEEDED`.
    ///
    /// The version changes even when the publish fails.
    pub async fn complete(
        &self,
        job: &mut Job,
        state: &mut DeviceState,
        topics: &Topics,
        transport: &dyn Transport,
    ) -> Result<()> {
        state.version += job.increment;
        job.status = JobStatus::Succeeded;
        info!(
            device = %state.name,
            "Job {} finished, version is now {}",
            job.job_id,
            state.version
        );
        let update = JobStatusUpdate::new(JobStatus::Succeeded, state.version);
        publish_json(transport, &topics.job_update(&job.job_id), &update, QoS::AtLeastOnce).await
    }
}
