//! Fleet orchestration: one runner task per discovered device.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use aircon_core::{DEFAULT_INBOX_CAPACITY, DeviceRunner, DeviceState, Inbox, Topics};

use crate::config::Config;
use crate::discovery::{DiscoveredDevice, DiscoveryError};
use crate::mqtt::{self, MqttError};
use crate::sink::CsvSink;

/// How long a device's event loop may take to flush its disconnect.
pub const EVENT_LOOP_GRACE: Duration = Duration::from_secs(5);

/// Errors starting a device.
#[derive(Debug, thiserror::Error)]
pub enum FleetError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Mqtt(#[from] MqttError),
    #[error("No device could be started")]
    NothingStarted,
}

struct DeviceTask {
    name: String,
    runner: JoinHandle<DeviceState>,
    event_loop: Option<JoinHandle<()>>,
}

/// All running devices, plus the stop signal they listen to.
pub struct Fleet {
    stop_tx: watch::Sender<bool>,
    devices: Vec<DeviceTask>,
}

impl Default for Fleet {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Fleet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fleet")
            .field("devices", &self.names())
            .finish()
    }
}

impl Fleet {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            stop_tx,
            devices: Vec::new(),
        }
    }

    /// Connect and start every device, skipping the ones that fail.
    pub fn start(config: &Config, devices: &[DiscoveredDevice]) -> Result<Self, FleetError> {
        let mut fleet = Self::new();
        for device in devices {
            info!(device = %device.name(), "Starting simulator");
            match build_runner(config, device) {
                Ok((runner, event_loop)) => fleet.add(runner, Some(event_loop)),
                Err(e) => error!(device = %device.name(), "Failed to start: {}", e),
            }
        }
        if fleet.is_empty() {
            return Err(FleetError::NothingStarted);
        }
        Ok(fleet)
    }

    /// Spawn `runner`. `event_loop` is the task driving its connection, if
    /// any, and is awaited after the runner stops.
    pub fn add(&mut self, runner: DeviceRunner, event_loop: Option<JoinHandle<()>>) {
        let name = runner.state().name.clone();
        let stop_rx = self.stop_tx.subscribe();
        self.devices.push(DeviceTask {
            name,
            runner: tokio::spawn(runner.run(stop_rx)),
            event_loop,
        });
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Names of the devices in start order.
    pub fn names(&self) -> Vec<&str> {
        self.devices.iter().map(|d| d.name.as_str()).collect()
    }

    /// Tell every runner to stop.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Wait until every device has stopped.
    pub async fn join(self) -> Vec<DeviceState> {
        self.run_until(std::future::pending()).await
    }

    /// Run until every device has stopped on its own or `shutdown`
    /// completes, in which case all devices are told to stop. Returns the
    /// final state of every device that exited cleanly.
    pub async fn run_until<F>(self, shutdown: F) -> Vec<DeviceState>
    where
        F: Future<Output = ()>,
    {
        let Fleet { stop_tx, devices } = self;
        let count = devices.len();

        let mut names = Vec::with_capacity(count);
        let mut runners = Vec::with_capacity(count);
        let mut event_loops = Vec::new();
        for device in devices {
            names.push(device.name);
            runners.push(device.runner);
            event_loops.extend(device.event_loop);
        }

        let mut all = join_all(runners);
        tokio::pin!(shutdown);
        let results = tokio::select! {
            results = &mut all => results,
            () = &mut shutdown => {
                info!("Terminating {} simulator(s)", count);
                stop_tx.send_replace(true);
                all.await
            }
        };

        let mut states = Vec::with_capacity(count);
        for (name, result) in names.iter().zip(results) {
            match result {
                Ok(state) => states.push(state),
                Err(e) => error!(device = %name, "Runner task failed: {}", e),
            }
        }

        for event_loop in event_loops {
            if tokio::time::timeout(EVENT_LOOP_GRACE, event_loop).await.is_err() {
                warn!("Connection did not close within {:?}", EVENT_LOOP_GRACE);
            }
        }

        states
    }
}

/// Wire one discovered device to its broker connection.
pub fn build_runner(
    config: &Config,
    device: &DiscoveredDevice,
) -> Result<(DeviceRunner, JoinHandle<()>), FleetError> {
    let credentials = device.load_credentials()?;
    let options = mqtt::mqtt_options(
        device.name(),
        &device.info.endpoint,
        &config.mqtt,
        credentials,
    )?;

    let topics = Topics::with_fleet_topics(
        device.name(),
        &config.simulator.telemetry_topic,
        &config.simulator.error_topic,
    );
    let inbox = Inbox::new(DEFAULT_INBOX_CAPACITY);
    let (transport, event_loop) =
        mqtt::connect(options, &config.mqtt, topics.clone(), inbox.sender());

    let state = DeviceState::randomized(device.name(), &mut rand::rng());
    let mut runner = DeviceRunner::new(
        state,
        topics,
        Arc::new(transport),
        inbox,
        config.simulator.runner_config(),
    );

    if config.simulator.write_csv {
        match CsvSink::open(&config.simulator.csv_dir, device.name()) {
            Ok(sink) => {
                info!(device = %device.name(), "Writing telemetry to {}", sink.path().display());
                runner = runner.with_sink(Box::new(sink));
            }
            Err(e) => warn!(device = %device.name(), "CSV output disabled: {}", e),
        }
    }

    Ok((runner, event_loop))
}
