//! RockTimer Wire Protocol - JSON message contract
//!
//! This crate implements the datagram payloads exchanged with sensors:
//! - Trigger (checkpoint identity + sender-local nanoseconds)
//! - Heartbeat (checkpoint identity only)
//!
//! and the control commands accepted from live observers.

pub mod control;
pub mod message;

pub use control::*;
pub use message::*;
