//! Device runner.
//!
//! A [`DeviceRunner`] owns one device's state and is the only task that
//! touches it. Ticks and inbound messages are multiplexed in a single
//! `select!` loop, so every read-modify-write on the state runs to
//! completion before the next one starts.
//!
//! # Loop
//!
//! 1. [`start`](DeviceRunner::start) subscribes and publishes the initial shadow.
//! 2. Each tick steps the model, then publishes telemetry, the shadow diff
//!    and any new error alert, then writes the sample to the sink.
//! 3. Inbox messages are applied as they arrive between ticks.
//! 4. A `disconnect` command or the stop signal clears `running`; the
//!    transport teardown runs in its own task and is awaited on exit.

use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use time::OffsetDateTime;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use aircon_types::{ErrorAlert, ErrorCode};

use crate::commands::{self, Command, Effect, ShadowDelta};
use crate::error::Result;
use crate::jobs::{DEFAULT_SETTLE_DELAY, Job, JobExecutor, JobsNotification};
use crate::messages::{Inbound, Inbox};
use crate::model::DeviceState;
use crate::shadow::ShadowSynchronizer;
use crate::sink::TelemetrySink;
use crate::topics::Topics;
use crate::transport::{QoS, Transport, publish_json};

/// Default tick interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// Timing of one device runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Time between telemetry ticks. Must be non-zero.
    pub interval: Duration,
    /// Delay between a job's `IN_PROGRESS` and `SUCCEEDED` publishes.
    pub job_settle_delay: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            job_settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

/// Drives one simulated device.
pub struct DeviceRunner {
    state: DeviceState,
    topics: Topics,
    transport: Arc<dyn Transport>,
    shadow: ShadowSynchronizer,
    jobs: JobExecutor,
    rx: mpsc::Receiver<Inbound>,
    interval: Duration,
    rng: StdRng,
    sink: Option<Box<dyn TelemetrySink>>,
    running: bool,
    teardown: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for DeviceRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceRunner")
            .field("device", &self.state.name)
            .field("interval", &self.interval)
            .field("running", &self.running)
            .finish()
    }
}

impl DeviceRunner {
    /// Create a runner for `state`, draining `inbox`.
    pub fn new(
        state: DeviceState,
        topics: Topics,
        transport: Arc<dyn Transport>,
        inbox: Inbox,
        config: RunnerConfig,
    ) -> Self {
        let (tx, rx) = inbox.into_parts();
        Self {
            shadow: ShadowSynchronizer::new(topics.shadow_update()),
            jobs: JobExecutor::new(config.job_settle_delay, tx),
            state,
            topics,
            transport,
            rx,
            interval: config.interval,
            rng: StdRng::from_os_rng(),
            sink: None,
            running: true,
            teardown: None,
        }
    }

    /// Use a specific random source, e.g. a seeded one for reproducible runs.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    /// Persist every telemetry sample to `sink`.
    pub fn with_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Current device state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Whether the device has not been told to stop yet.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Subscribe to the device's inbound topics and publish the initial
    /// shadow report.
    pub async fn start(&mut self) {
        info!(device = %self.state.name, "Starting device simulation");
        for topic in self.topics.subscriptions() {
            match self.transport.subscribe(topic, QoS::AtLeastOnce).await {
                Ok(()) => debug!(device = %self.state.name, "Subscribed to {}", topic),
                Err(e) => warn!(device = %self.state.name, "Failed to subscribe to {}: {}", topic, e),
            }
        }
        self.shadow
            .force_publish(&self.state, self.transport.as_ref())
            .await;
    }

    /// Run one simulation step and publish its results.
    ///
    /// Only a telemetry encoding failure is returned; transport and sink
    /// failures are logged.
    pub async fn tick(&mut self) -> Result<()> {
        let seconds = self.interval.as_secs_f64();
        let outcome = self
            .state
            .step(seconds, OffsetDateTime::now_utc(), &mut self.rng);

        if outcome.compressor_changed {
            self.shadow
                .maybe_publish(&self.state, self.transport.as_ref())
                .await;
        }

        let payload = serde_json::to_vec(&outcome.sample.record)?;
        match self
            .transport
            .publish(self.topics.telemetry(), payload, QoS::AtLeastOnce)
            .await
        {
            Ok(()) => debug!(device = %self.state.name, "Published telemetry: {:?}", outcome.sample.record),
            Err(e) => warn!(device = %self.state.name, "Failed to publish telemetry: {}", e),
        }

        self.shadow
            .maybe_publish(&self.state, self.transport.as_ref())
            .await;

        if let Some(code) = self.state.take_error_edge() {
            self.publish_alert(code).await;
        }

        if let Some(sink) = self.sink.as_mut()
            && let Err(e) = sink.write(&outcome.sample)
        {
            warn!(device = %self.state.name, "Failed to record telemetry: {}", e);
        }

        Ok(())
    }

    async fn publish_alert(&self, code: ErrorCode) {
        let alert = ErrorAlert {
            device_name: self.state.name.clone(),
            error_code: code,
            timestamp: OffsetDateTime::now_utc().unix_timestamp_nanos() as f64 / 1e9,
        };
        match publish_json(
            self.transport.as_ref(),
            self.topics.errors(),
            &alert,
            QoS::AtLeastOnce,
        )
        .await
        {
            Ok(()) => info!(device = %self.state.name, "Published error alert: {}", code),
            Err(e) => warn!(device = %self.state.name, "Failed to publish error alert: {}", e),
        }
    }

    /// Apply one inbound message. Malformed payloads are logged and dropped.
    pub async fn handle(&mut self, message: Inbound) {
        let channel = message.channel();
        if let Err(e) = self.apply(message).await {
            warn!(device = %self.state.name, "Dropped {} message: {}", channel, e);
        }
    }

    async fn apply(&mut self, message: Inbound) -> Result<()> {
        match message {
            Inbound::Command(payload) => {
                let command = Command::from_slice(&payload)?;
                debug!(device = %self.state.name, "Received command: {:?}", command);
                let effect = commands::dispatch(&mut self.state, command);
                self.follow_up(effect).await;
            }
            Inbound::ShadowDelta(payload) => {
                let delta = ShadowDelta::from_slice(&payload)?;
                debug!(device = %self.state.name, "Received shadow delta: {:?}", delta);
                let effect = commands::apply_delta(&mut self.state, &delta);
                self.follow_up(effect).await;
            }
            Inbound::JobsNotify(payload) => {
                let notification = JobsNotification::from_slice(&payload)?;
                for job in self.jobs.accept(&self.state.name, &notification) {
                    self.begin_job(job).await;
                }
            }
            Inbound::JobSettled(job) => self.finish_job(job).await,
        }
        Ok(())
    }

    async fn follow_up(&mut self, effect: Effect) {
        match effect {
            Effect::None => {}
            Effect::ReportShadow => {
                self.shadow
                    .maybe_publish(&self.state, self.transport.as_ref())
                    .await;
            }
            Effect::ForceShadow => {
                self.shadow
                    .force_publish(&self.state, self.transport.as_ref())
                    .await;
            }
            Effect::Disconnect => self.disconnect(),
        }
    }

    async fn begin_job(&mut self, mut job: Job) {
        match self
            .jobs
            .begin(&mut job, &self.state, &self.topics, self.transport.as_ref())
            .await
        {
            Ok(()) => {
                self.jobs.schedule(job);
            }
            Err(e) => warn!(
                device = %self.state.name,
                "Failed to start job {}: {}",
                job.job_id,
                e
            ),
        }
    }

    async fn finish_job(&mut self, mut job: Job) {
        if let Err(e) = self
            .jobs
            .complete(&mut job, &mut self.state, &self.topics, self.transport.as_ref())
            .await
        {
            warn!(
                device = %self.state.name,
                "Failed to report job {} as succeeded: {}",
                job.job_id,
                e
            );
        }
        self.shadow
            .force_publish(&self.state, self.transport.as_ref())
            .await;
    }

    /// Clear `running` and tear the transport down in the background.
    pub fn disconnect(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        info!(device = %self.state.name, "Disconnecting");

        let transport = Arc::clone(&self.transport);
        let device = self.state.name.clone();
        self.teardown = Some(tokio::spawn(async move {
            match transport.disconnect().await {
                Ok(()) => info!(device = %device, "Disconnected"),
                Err(e) => warn!(device = %device, "Failed to disconnect cleanly: {}", e),
            }
        }));
    }

    /// Wait for the next inbox message and apply it. Returns `false` once
    /// the inbox is closed.
    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(message) => {
                self.handle(message).await;
                true
            }
            None => false,
        }
    }

    /// Run until disconnected or until `stop` turns `true` (or its sender
    /// is dropped). Returns the final device state.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> DeviceState {
        self.start().await;

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        if *stop.borrow_and_update() {
            self.disconnect();
        }

        while self.running {
            tokio::select! {
                biased;
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow_and_update() {
                        info!(device = %self.state.name, "Stop requested");
                        self.disconnect();
                    }
                }
                Some(message) = self.rx.recv() => self.handle(message).await,
                _ = ticker.tick() => {
                    if let Err(e) = self.tick().await {
                        error!(device = %self.state.name, "Simulation step failed: {}", e);
                        self.disconnect();
                    }
                }
            }
        }

        if let Some(teardown) = self.teardown.take()
            && let Err(e) = teardown.await
        {
            warn!(device = %self.state.name, "Disconnect task failed: {}", e);
        }
        info!(device = %self.state.name, "Device simulation stopped");
        self.state
    }
}
