//! Trigger simulator: single triggers or full stone passes over UDP

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use rand::Rng;

use rocktimer_core::CheckpointId;
use rocktimer_time::{Clock, SystemClock};
use rocktimer_transport::{resolve, UdpTransport};
use rocktimer_wire::WireMessage;

/// Typical tee to near hog line, seconds
const TEE_HOG: (f64, f64) = (2.80, 3.30);
/// Typical hog to hog, seconds
const HOG_HOG: (f64, f64) = (8.0, 14.0);

#[derive(Parser, Debug)]
#[command(name = "rocktimer-sim", about = "Simulate RockTimer triggers via UDP")]
struct Args {
    /// Coordinator host
    #[arg(long, default_value = "127.0.0.1")]
    server: String,

    /// Coordinator UDP port
    #[arg(long, default_value_t = 5000)]
    port: u16,

    /// Send a single trigger for this checkpoint
    #[arg(long, value_parser = ["tee", "hog_close", "hog_far"])]
    device: Option<String>,

    /// Simulate a full stone pass
    #[arg(long)]
    simulate: bool,

    /// Tee to hog close, seconds (random if omitted)
    #[arg(long)]
    tee_hog: Option<f64>,

    /// Hog to hog, seconds (random if omitted)
    #[arg(long)]
    hog_hog: Option<f64>,

    /// Stop after the near hog line
    #[arg(long)]
    skip_far: bool,

    /// Number of passes
    #[arg(long = "loop", default_value_t = 1)]
    passes: u32,

    /// Pause between passes, seconds
    #[arg(long, default_value_t = 3.0)]
    delay: f64,
}

struct Simulator {
    transport: UdpTransport,
    server: SocketAddr,
    clock: SystemClock,
}

impl Simulator {
    async fn send(&self, checkpoint: CheckpointId) -> Result<(), Box<dyn std::error::Error>> {
        let message = WireMessage::trigger(checkpoint.as_str(), self.clock.now_ns());
        self.transport.send_message(&message, self.server).await?;
        println!("  -> {}", checkpoint);
        Ok(())
    }

    async fn stone_pass(
        &self,
        tee_hog: f64,
        hog_hog: f64,
        skip_far: bool,
    ) -> Result<(), Box<dyn std::error::Error>> {
        println!(
            "stone pass: tee-hog {:.2}s{}",
            tee_hog,
            if skip_far {
                String::new()
            } else {
                format!(", hog-hog {:.2}s", hog_hog)
            }
        );

        self.send(CheckpointId::Tee).await?;
        tokio::time::sleep(seconds(tee_hog)).await;
        self.send(CheckpointId::HogClose).await?;

        if !skip_far {
            tokio::time::sleep(seconds(hog_hog)).await;
            self.send(CheckpointId::HogFar).await?;
        }
        Ok(())
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or_default()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let server = resolve(&format!("{}:{}", args.server, args.port)).await?;
    let simulator = Simulator {
        transport: UdpTransport::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await?,
        server,
        clock: SystemClock::new(),
    };

    if let Some(device) = &args.device {
        let checkpoint = device.parse::<CheckpointId>()?;
        simulator.send(checkpoint).await?;
        return Ok(());
    }

    if !args.simulate {
        println!("nothing to do: pass --device <id> or --simulate");
        return Ok(());
    }

    let mut rng = rand::thread_rng();
    for pass in 0..args.passes {
        if pass > 0 {
            tokio::time::sleep(seconds(args.delay)).await;
        }
        let tee_hog = args
            .tee_hog
            .unwrap_or_else(|| rng.gen_range(TEE_HOG.0..=TEE_HOG.1));
        let hog_hog = args
            .hog_hog
            .unwrap_or_else(|| rng.gen_range(HOG_HOG.0..=HOG_HOG.1));

        println!("[{}/{}]", pass + 1, args.passes);
        simulator.stone_pass(tee_hog, hog_hog, args.skip_far).await?;
    }

    Ok(())
}
