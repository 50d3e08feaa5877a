//! Air-conditioner fleet simulator.
//!
//! Run with: `cargo run -p aircon-service -- run --devices-folder devices`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use aircon_service::send::DEFAULT_SEND_TIMEOUT;
use aircon_service::{Action, Config, Credentials, Fleet, build_command, discover, send_command};
use aircon_types::{FaultType, FilterStatus, WattageMode};

/// Air-conditioner fleet simulator.
#[derive(Parser, Debug)]
#[command(name = "aircon-sim")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate every discovered device (default).
    Run(RunArgs),

    /// Send one command to a running device.
    Send(SendArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Folder searched for device_info.json files (overrides config).
    #[arg(long)]
    devices_folder: Option<PathBuf>,

    /// Only start the device in this folder.
    #[arg(long)]
    device_name: Option<String>,

    /// Telemetry topic (overrides config).
    #[arg(long)]
    topic: Option<String>,

    /// Seconds between telemetry publishes (overrides config).
    #[arg(long)]
    interval: Option<f64>,

    /// Append telemetry to {device}_telemetry.csv.
    #[arg(long)]
    write_csv: bool,
}

#[derive(Args, Debug)]
struct SendArgs {
    /// Name of the target device.
    #[arg(long)]
    device_name: String,

    /// Action to perform.
    #[arg(long, value_enum)]
    action: Action,

    /// Fault to inject (inject_fault).
    #[arg(long)]
    fault_type: Option<FaultType>,

    /// New filter status (update_filter_status).
    #[arg(long)]
    filter_status: Option<FilterStatus>,

    /// New wattage mode (set_wattage_mode).
    #[arg(long)]
    wattage_mode: Option<WattageMode>,

    /// Broker endpoint.
    #[arg(long)]
    endpoint: String,

    /// Path to root CA certificate.
    #[arg(long)]
    root_ca: PathBuf,

    /// Path to client certificate.
    #[arg(long)]
    cert: PathBuf,

    /// Path to private key.
    #[arg(long)]
    key: PathBuf,

    /// Seconds to wait for the broker.
    #[arg(long)]
    timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("aircon_service=info,aircon_core=info")),
        )
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    match cli.command {
        Some(Command::Send(args)) => send(config, args).await,
        Some(Command::Run(args)) => run(config, args).await,
        None => run(config, RunArgs::default()).await,
    }
}

async fn run(mut config: Config, args: RunArgs) -> anyhow::Result<()> {
    if let Some(folder) = args.devices_folder {
        config.devices.folder = folder;
    }
    if let Some(topic) = args.topic {
        config.simulator.telemetry_topic = topic;
    }
    if let Some(interval) = args.interval {
        config.simulator.interval_secs = interval;
    }
    if args.write_csv {
        config.simulator.write_csv = true;
    }
    config.validate()?;

    let devices = discover(&config.devices.folder, args.device_name.as_deref())?;
    info!(
        "Found {} device(s) in {}",
        devices.len(),
        config.devices.folder.display()
    );

    let fleet = Fleet::start(&config, &devices)?;
    let states = fleet
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("Failed to listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    info!("{} simulator(s) stopped", states.len());
    Ok(())
}

async fn send(config: Config, args: SendArgs) -> anyhow::Result<()> {
    config.validate()?;

    let credentials = Credentials::from_files(&args.root_ca, &args.cert, &args.key)?;
    let command = build_command(
        args.action,
        args.fault_type,
        args.filter_status,
        args.wattage_mode,
    );
    let timeout = args
        .timeout
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_SEND_TIMEOUT);

    send_command(
        &args.device_name,
        &command,
        &args.endpoint,
        &config.mqtt,
        credentials,
        timeout,
    )
    .await
    .with_context(|| format!("Failed to send command to {}", args.device_name))?;

    println!(
        "Sent command to {}: {}",
        args.device_name,
        serde_json::to_string(&command)?
    );
    Ok(())
}
