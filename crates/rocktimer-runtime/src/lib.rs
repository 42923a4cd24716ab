//! RockTimer Runtime - Coordinator orchestration
//!
//! This crate wires the measurement coordinator into a running service:
//! 1. Receive datagrams (remote sensors) and local sensor captures
//! 2. Decode and discard malformed input
//! 3. Refresh liveness for every parsed message
//! 4. Admit triggers under the node lock
//! 5. Snapshot state under the lock, publish after release
//! 6. Hand announcements to an asynchronous consumer
//!
//! Control commands from the HTTP/WebSocket surface go through the same lock.

pub mod announce;
pub mod broadcast;
pub mod config;
pub mod http;
pub mod ingress;
pub mod node;
pub mod server;
pub mod snapshot;
pub mod telemetry;

pub use announce::*;
pub use broadcast::*;
pub use config::*;
pub use ingress::*;
pub use node::*;
pub use server::*;
pub use snapshot::*;
pub use telemetry::*;
