//! RockTimer Test Harness - Whole-run validation under hostile delivery
//!
//! This crate provides:
//! - Chaos delivery (loss, burst loss, jitter, reordering, duplication)
//! - Stone-pass simulation with sender-local timestamps
//! - An end-to-end harness driving the coordinator node with datagrams

pub mod chaos;
pub mod integration;
pub mod simulator;

pub use chaos::*;
pub use integration::*;
pub use simulator::*;
