//! Checkpoint ingress
//!
//! Two producers feed the node: the UDP receive loop (raw datagrams from
//! remote sensors) and a locally wired sensor. Both are funneled through a
//! single pump task, so admission is serialized without waiting on the
//! network.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

use rocktimer_core::{CheckpointId, Source};
use rocktimer_time::Clock;
use rocktimer_transport::PacketReceiver;
use rocktimer_wire::WireMessage;

use crate::TimerNode;

/// A parsed message and where it came from
#[derive(Clone, Debug, PartialEq)]
pub struct Inbound {
    pub message: WireMessage,
    pub source: Source,
}

impl Inbound {
    pub fn new(message: WireMessage, source: Source) -> Self {
        Inbound { message, source }
    }
}

pub type InboundSender = mpsc::Sender<Inbound>;
pub type InboundReceiver = mpsc::Receiver<Inbound>;

/// Bounded channel for local captures
pub fn inbound_channel(capacity: usize) -> (InboundSender, InboundReceiver) {
    mpsc::channel(capacity)
}

/// Parse a datagram. Malformed input is logged and discarded.
pub fn decode_datagram(bytes: &[u8], from: SocketAddr) -> Option<Inbound> {
    match WireMessage::parse(bytes) {
        Ok(message) => Some(Inbound::new(message, Source::Remote(from))),
        Err(e) => {
            tracing::warn!(%from, len = bytes.len(), "discarding datagram: {}", e);
            None
        }
    }
}

/// Sensor wired directly to the coordinator host.
/// Stamps captures with the host clock and never waits for admission.
#[derive(Clone)]
pub struct LocalSensor {
    checkpoint: CheckpointId,
    clock: Arc<dyn Clock>,
    tx: InboundSender,
}

impl LocalSensor {
    pub fn new(checkpoint: CheckpointId, clock: Arc<dyn Clock>, tx: InboundSender) -> Self {
        LocalSensor {
            checkpoint,
            clock,
            tx,
        }
    }

    pub fn checkpoint(&self) -> CheckpointId {
        self.checkpoint
    }

    /// Capture a trigger now. Returns false if the capture could not be queued.
    pub fn trigger(&self) -> bool {
        let timestamp = self.clock.now_ns();
        self.submit(WireMessage::trigger(self.checkpoint.as_str(), timestamp))
    }

    /// Report the local sensor as alive without triggering
    pub fn heartbeat(&self) -> bool {
        self.submit(WireMessage::heartbeat(self.checkpoint.as_str()))
    }

    fn submit(&self, message: WireMessage) -> bool {
        match self.tx.try_send(Inbound::new(message, Source::Local)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                tracing::warn!(checkpoint = %self.checkpoint, "ingress queue full, capture dropped");
                false
            }
            Err(TrySendError::Closed(_)) => {
                tracing::debug!(checkpoint = %self.checkpoint, "ingress closed");
                false
            }
        }
    }
}

/// Drive the node from both producers until both are closed
pub fn spawn_ingress_pump(
    node: Arc<TimerNode>,
    mut packets: PacketReceiver,
    mut local: InboundReceiver,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut packets_open = true;
        let mut local_open = true;

        while packets_open || local_open {
            tokio::select! {
                packet = packets.recv(), if packets_open => match packet {
                    Some((bytes, from)) => {
                        if let Some(inbound) = decode_datagram(&bytes, from) {
                            node.ingest(inbound);
                        }
                    }
                    None => packets_open = false,
                },
                inbound = local.recv(), if local_open => match inbound {
                    Some(inbound) => {
                        node.ingest(inbound);
                    }
                    None => local_open = false,
                },
            }
        }

        tracing::debug!("ingress pump stopped");
    })
}
