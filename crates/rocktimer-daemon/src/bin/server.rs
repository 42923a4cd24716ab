//! Coordinator host

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::mpsc;

use rocktimer_daemon::{spawn_console, ConsoleCommand};
use rocktimer_runtime::{init_logging, RunningServer, ServerConfig};
use rocktimer_time::SystemClock;

#[derive(Parser, Debug)]
#[command(name = "rocktimer-server", about = "RockTimer measurement coordinator")]
struct Args {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the configured log filter
    #[arg(long)]
    log_level: Option<String>,

    /// Read trigger/arm/disarm commands from stdin for the local checkpoint
    #[arg(long)]
    console: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    init_logging(&config.logging)?;

    let server = RunningServer::start(&config, Arc::new(SystemClock::new())).await?;
    let node = Arc::clone(&server.node);
    let local_sensor = server.local_sensor.clone();

    let (console_tx, mut console_rx) = mpsc::channel(16);
    if args.console {
        spawn_console(console_tx);
        tracing::info!("console: empty line = trigger, arm, disarm, quit");
    } else {
        drop(console_tx);
    }

    let console = async move {
        while let Some(command) = console_rx.recv().await {
            match command {
                ConsoleCommand::Trigger => match &local_sensor {
                    Some(sensor) => {
                        sensor.trigger();
                    }
                    None => tracing::warn!("no local checkpoint configured"),
                },
                ConsoleCommand::Arm => {
                    node.arm();
                }
                ConsoleCommand::Disarm => {
                    node.disarm();
                }
                ConsoleCommand::Quit => return,
            }
        }
        // Console disabled: wait forever
        std::future::pending::<()>().await
    };

    tokio::select! {
        result = server.wait() => result?,
        _ = console => tracing::info!("console closed, shutting down"),
        _ = tokio::signal::ctrl_c() => tracing::info!("interrupted, shutting down"),
    }

    Ok(())
}
