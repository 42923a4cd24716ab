//! RockTimer Daemon - shared pieces of the binaries
//!
//! - `rocktimer-server`: coordinator host with the HTTP/WebSocket surface
//! - `rocktimer-sensor`: remote checkpoint sensor (triggers + heartbeats)
//! - `rocktimer-sim`: sends synthetic triggers or full stone passes

pub mod console;

pub use console::*;
