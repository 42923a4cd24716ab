//! End-to-end tests over real sockets

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use rocktimer_core::{SystemState, TimestampNs};
use rocktimer_runtime::{RunningServer, ServerConfig};
use rocktimer_time::SystemClock;
use rocktimer_transport::UdpTransport;
use rocktimer_wire::WireMessage;

const SEC: u64 = 1_000_000_000;

async fn start() -> RunningServer {
    let config = ServerConfig {
        udp_bind: "127.0.0.1:0".parse().unwrap(),
        http_bind: "127.0.0.1:0".parse().unwrap(),
        liveness_poll_interval: Duration::from_millis(50),
        ..ServerConfig::default()
    };
    RunningServer::start(&config, Arc::new(SystemClock::new()))
        .await
        .unwrap()
}

async fn wait_for_state(server: &RunningServer, state: SystemState) {
    for _ in 0..200 {
        if server.node.state() == state {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("never reached {:?}", state);
}

#[tokio::test]
async fn test_measurement_over_udp_and_http() {
    let server = start().await;
    let base = format!("http://{}", server.http_addr);
    let client = reqwest::Client::new();

    let armed: Value = client
        .post(format!("{}/api/arm", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(armed["success"], true);
    assert_eq!(armed["state"], "armed");

    let sensor = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    let t0 = 1_700_000_000 * SEC;
    sensor
        .send_message(&WireMessage::trigger("tee", TimestampNs(t0)), server.udp_addr)
        .await
        .unwrap();
    sensor
        .send_bytes_to(b"{broken", server.udp_addr)
        .await
        .unwrap();
    wait_for_state(&server, SystemState::Measuring).await;

    sensor
        .send_message(
            &WireMessage::trigger("hog_close", TimestampNs(t0 + 3 * SEC)),
            server.udp_addr,
        )
        .await
        .unwrap();
    wait_for_state(&server, SystemState::Completed).await;

    let times: Value = client
        .get(format!("{}/api/times?limit=10", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(times.as_array().unwrap().len(), 1);
    assert_eq!(times[0]["tee_to_hog_close_ms"], 3000.0);
    assert!(times[0]["hog_to_hog_ms"].is_null());

    let status: Value = client
        .get(format!("{}/api/status", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(status["state"], "completed");
    assert_eq!(status["sensors"]["tee"]["status"], "online");
    assert_eq!(status["session"]["has_hog_close"], true);

    let cleared: Value = client
        .delete(format!("{}/api/times", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(cleared["success"], true);
    assert!(server.node.history(50).is_empty());

    server.shutdown();
}

#[tokio::test]
async fn test_local_sensor_feeds_coordinator() {
    let server = start().await;
    server.node.arm();

    // The local sensor sits on the near hog line, so it needs a tee first
    let sensor = UdpTransport::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
    sensor
        .send_message(&WireMessage::trigger("tee", TimestampNs(1)), server.udp_addr)
        .await
        .unwrap();
    wait_for_state(&server, SystemState::Measuring).await;

    let local = server.local_sensor.as_ref().unwrap();
    assert!(local.trigger());
    wait_for_state(&server, SystemState::Completed).await;

    let records = server.node.history(1);
    assert!(records[0].tee_to_hog_close_ms > 0.0);

    server.shutdown();
}

#[tokio::test]
async fn test_unknown_record_delete() {
    let server = start().await;
    let client = reqwest::Client::new();

    let ack: Value = client
        .delete(format!("http://{}/api/times/42", server.http_addr))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(ack["success"], false);

    let page = client
        .get(format!("http://{}/", server.http_addr))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert!(page.contains("RockTimer"));

    server.shutdown();
}
