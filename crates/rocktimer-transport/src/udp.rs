//! UDP transport for sensor datagrams

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{lookup_host, UdpSocket};
use tokio::sync::mpsc;

use rocktimer_core::{RockTimerError, RockTimerResult};
use rocktimer_wire::{WireMessage, MAX_MESSAGE_SIZE};

/// Receive buffer; one byte larger than the message limit so oversize is detectable
const RECV_BUFFER_SIZE: usize = MAX_MESSAGE_SIZE + 1;

/// UDP transport for RockTimer
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> RockTimerResult<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|e| RockTimerError::TransportError(e.to_string()))?;

        let local_addr = socket
            .local_addr()
            .map_err(|e| RockTimerError::TransportError(e.to_string()))?;

        Ok(UdpTransport {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Send a message to a destination
    pub async fn send_message(&self, message: &WireMessage, dest: SocketAddr) -> RockTimerResult<()> {
        let bytes = message.encode()?;
        self.send_bytes_to(&bytes, dest).await
    }

    /// Send raw bytes to a destination
    pub async fn send_bytes_to(&self, bytes: &[u8], dest: SocketAddr) -> RockTimerResult<()> {
        self.socket
            .send_to(bytes, dest)
            .await
            .map_err(|e| RockTimerError::TransportError(e.to_string()))?;
        Ok(())
    }

    /// Receive and parse one message.
    /// The outer error is a socket failure; the inner one a malformed payload.
    pub async fn recv_message(&self) -> RockTimerResult<(RockTimerResult<WireMessage>, SocketAddr)> {
        let (bytes, addr) = self.recv_bytes_from().await?;
        Ok((WireMessage::parse(&bytes), addr))
    }

    /// Receive raw bytes
    pub async fn recv_bytes_from(&self) -> RockTimerResult<(Vec<u8>, SocketAddr)> {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        let (len, addr) = self
            .socket
            .recv_from(&mut buf)
            .await
            .map_err(|e| RockTimerError::TransportError(e.to_string()))?;

        Ok((buf[..len].to_vec(), addr))
    }

    /// Get a clone of the socket for concurrent operations
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

/// Resolve `host:port` to the first socket address
pub async fn resolve(target: &str) -> RockTimerResult<SocketAddr> {
    lookup_host(target)
        .await
        .map_err(|e| RockTimerError::TransportError(format!("{}: {}", target, e)))?
        .next()
        .ok_or_else(|| RockTimerError::TransportError(format!("{}: no address", target)))
}

/// Datagram receiver channel
pub type PacketReceiver = mpsc::Receiver<(Vec<u8>, SocketAddr)>;

/// Datagram sender channel
pub type PacketSender = mpsc::Sender<(Vec<u8>, SocketAddr)>;

/// Start a background receive loop.
/// The loop never parses; it only moves bytes so a slow consumer cannot stall the socket
/// beyond `buffer_size` datagrams.
pub fn start_receive_loop(socket: Arc<UdpSocket>, buffer_size: usize) -> PacketReceiver {
    let (tx, rx) = mpsc::channel(buffer_size);

    tokio::spawn(async move {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];
        loop {
            match socket.recv_from(&mut buf).await {
                Ok((len, addr)) => {
                    let packet = buf[..len].to_vec();
                    if tx.send((packet, addr)).await.is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    tracing::warn!("UDP receive error: {}", e);
                }
            }
        }
    });

    rx
}
