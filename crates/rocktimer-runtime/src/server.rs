//! Coordinator host assembly

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use rocktimer_core::{RockTimerError, RockTimerResult};
use rocktimer_time::Clock;
use rocktimer_transport::{start_receive_loop, UdpTransport};

use crate::{
    announcement_channel, http, inbound_channel, spawn_announcer, spawn_ingress_pump,
    spawn_liveness_ticker, AnnouncementSink, LocalSensor, LogAnnouncer, NodeConfig, ServerConfig,
    SpeechAnnouncer, TimerNode,
};

/// A started coordinator host
pub struct RunningServer {
    pub node: Arc<TimerNode>,
    /// Present when a checkpoint is wired to this host
    pub local_sensor: Option<LocalSensor>,
    pub udp_addr: SocketAddr,
    pub http_addr: SocketAddr,
    http: JoinHandle<RockTimerResult<()>>,
    tasks: Vec<JoinHandle<()>>,
}

impl RunningServer {
    /// Bind both endpoints and spawn every background task
    pub async fn start(config: &ServerConfig, clock: Arc<dyn Clock>) -> RockTimerResult<Self> {
        let (announce_tx, announce_rx) = announcement_channel(config.announcement_buffer);
        let mut sinks: Vec<Arc<dyn AnnouncementSink>> = vec![Arc::new(LogAnnouncer)];
        if let Some(speech) = SpeechAnnouncer::from_config(&config.speech) {
            sinks.push(Arc::new(speech));
        }

        let node = Arc::new(TimerNode::new(
            NodeConfig::from(config),
            Arc::clone(&clock),
            Some(announce_tx),
        ));

        let udp = UdpTransport::bind(config.udp_bind).await?;
        let udp_addr = udp.local_addr();
        let packets = start_receive_loop(udp.socket(), config.ingress_buffer);

        let (local_tx, local_rx) = inbound_channel(config.ingress_buffer);
        let local_sensor = config
            .local_checkpoint
            .map(|checkpoint| LocalSensor::new(checkpoint, clock, local_tx));

        let listener = TcpListener::bind(config.http_bind)
            .await
            .map_err(|e| RockTimerError::TransportError(e.to_string()))?;
        let http_addr = listener
            .local_addr()
            .map_err(|e| RockTimerError::TransportError(e.to_string()))?;

        let tasks = vec![
            spawn_ingress_pump(Arc::clone(&node), packets, local_rx),
            spawn_liveness_ticker(Arc::clone(&node), config.liveness_poll_interval),
            spawn_announcer(announce_rx, sinks),
        ];
        let http = tokio::spawn(http::serve(listener, Arc::clone(&node)));

        tracing::info!(
            %udp_addr,
            %http_addr,
            local = ?config.local_checkpoint,
            "coordinator started"
        );

        Ok(RunningServer {
            node,
            local_sensor,
            udp_addr,
            http_addr,
            http,
            tasks,
        })
    }

    /// Run until the HTTP server stops
    pub async fn wait(self) -> RockTimerResult<()> {
        let result = match self.http.await {
            Ok(result) => result,
            Err(e) => Err(RockTimerError::TransportError(e.to_string())),
        };
        for task in &self.tasks {
            task.abort();
        }
        result
    }

    /// Stop every task
    pub fn shutdown(self) {
        self.http.abort();
        for task in &self.tasks {
            task.abort();
        }
        tracing::info!("coordinator stopped");
    }
}
