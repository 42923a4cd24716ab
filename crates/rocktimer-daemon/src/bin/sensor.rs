//! Remote checkpoint sensor

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use rocktimer_core::CheckpointId;
use rocktimer_daemon::{spawn_console, ConsoleCommand};
use rocktimer_runtime::{init_logging, SensorConfig};
use rocktimer_time::{Clock, SystemClock};
use rocktimer_transport::{resolve, spawn_heartbeat_loop, UdpTransport};
use rocktimer_wire::WireMessage;

#[derive(Parser, Debug)]
#[command(name = "rocktimer-sensor", about = "RockTimer checkpoint sensor")]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Checkpoint this sensor reports as
    #[arg(long)]
    device_id: Option<String>,

    /// Coordinator address, host:port
    #[arg(long)]
    server: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = SensorConfig::load(args.config.as_deref())?;
    if let Some(device_id) = args.device_id {
        config.device_id = device_id;
    }
    if let Some(server) = args.server {
        config.server = server;
    }
    config.validate()?;
    init_logging(&config.logging)?;

    let transport = Arc::new(UdpTransport::bind(config.bind).await?);
    let server = resolve(&config.server).await?;
    let clock = SystemClock::new();

    let heartbeat = spawn_heartbeat_loop(
        Arc::clone(&transport),
        config.device_id.clone(),
        server,
        config.heartbeat_interval,
    );
    tracing::info!(
        device_id = %config.device_id,
        %server,
        known = CheckpointId::parse(&config.device_id).is_some(),
        "sensor started; empty line on stdin = trigger"
    );

    let (tx, mut rx) = mpsc::channel(16);
    spawn_console(tx);

    loop {
        let command = tokio::select! {
            command = rx.recv() => command,
            _ = tokio::signal::ctrl_c() => None,
        };

        match command {
            Some(ConsoleCommand::Trigger) => {
                let message = WireMessage::trigger(config.device_id.as_str(), clock.now_ns());
                match transport.send_message(&message, server).await {
                    Ok(()) => tracing::info!(device_id = %config.device_id, "trigger sent"),
                    Err(e) => tracing::warn!("trigger send failed: {}", e),
                }
            }
            Some(ConsoleCommand::Arm | ConsoleCommand::Disarm) => {
                tracing::warn!("arm/disarm are coordinator commands");
            }
            Some(ConsoleCommand::Quit) | None => break,
        }
    }

    heartbeat.abort();
    tracing::info!("sensor stopped");
    Ok(())
}
