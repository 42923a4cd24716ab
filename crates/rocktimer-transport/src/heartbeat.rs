//! Periodic heartbeat emitter for remote sensors

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use rocktimer_wire::WireMessage;

use crate::UdpTransport;

/// Spawn a task sending a heartbeat for `device_id` every `period`.
/// Send failures are logged and the loop keeps going.
pub fn spawn_heartbeat_loop(
    transport: Arc<UdpTransport>,
    device_id: String,
    server: SocketAddr,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let message = WireMessage::heartbeat(device_id);
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            if let Err(e) = transport.send_message(&message, server).await {
                tracing::warn!(%server, "heartbeat send failed: {}", e);
            }
        }
    })
}
