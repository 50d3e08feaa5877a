//! Per-device simulation engine for networked air-conditioner units.
//!
//! This crate owns everything a simulated unit does between its network
//! boundary and its physics: the thermal and electrical model, differential
//! shadow reporting, command dispatch, the job status protocol and the
//! runner loop that ties them together.
//!
//! # Features
//!
//! - **Telemetry model**: compressor control, outdoor drift, fault effects
//! - **Shadow sync**: publishes reported state only when its projection changes
//! - **Commands**: fault injection, filter and wattage overrides, disconnect
//! - **Jobs**: two-phase `IN_PROGRESS` / `SUCCEEDED` reporting with a settle delay
//! - **Transport seam**: any pub/sub client behind the [`Transport`] trait
//!
//! # Components
//!
//! | Module | Role |
//! |--------|------|
//! | [`model`] | [`DeviceState`] and its `step` function |
//! | [`shadow`] | [`ShadowSynchronizer`] |
//! | [`commands`] | [`dispatch`](commands::dispatch) and [`apply_delta`](commands::apply_delta) |
//! | [`jobs`] | [`JobExecutor`] |
//! | [`runner`] | [`DeviceRunner`], one task per device |
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use aircon_core::{DeviceRunner, DeviceState, Inbox, MockTransport, RunnerConfig, Topics};
//!
//! #[tokio::main]
//! async fn main() {
//!     let transport = Arc::new(MockTransport::new());
//!     let mut runner = DeviceRunner::new(
//!         DeviceState::new("ac-lobby"),
//!         Topics::new("ac-lobby"),
//!         transport.clone(),
//!         Inbox::default(),
//!         RunnerConfig::default(),
//!     );
//!
//!     runner.start().await;
//!     runner.tick().await.unwrap();
//!     assert_eq!(transport.published_on("aircon/telemetry").await.len(), 1);
//! }
//! ```

pub mod commands;
pub mod error;
pub mod jobs;
pub mod messages;
pub mod mock;
pub mod model;
pub mod runner;
pub mod shadow;
pub mod sink;
pub mod topics;
pub mod transport;
pub mod util;

pub use commands::{Command, DesiredState, Effect, ShadowDelta};
pub use error::{Error, Result};
pub use jobs::{Job, JobDescriptor, JobDocument, JobExecutor, JobsNotification};
pub use messages::{DEFAULT_INBOX_CAPACITY, Inbound, Inbox, InboxSender};
pub use mock::{MockTransport, Published};
pub use model::{DeviceState, StepOutcome, TelemetrySample};
pub use runner::{DeviceRunner, RunnerConfig};
pub use shadow::ShadowSynchronizer;
pub use sink::TelemetrySink;
pub use topics::Topics;
pub use transport::{QoS, Transport, publish_json};

// Re-export the value types so downstream crates need a single dependency.
pub use aircon_types;
