//! RockTimer Transport Layer - UDP datagrams
//!
//! This crate provides:
//! - UDP transport for sensor messages
//! - Background receive loop feeding a channel
//! - Periodic heartbeat emitter for remote sensors

pub mod heartbeat;
pub mod udp;

pub use heartbeat::*;
pub use udp::*;
