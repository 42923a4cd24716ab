//! RockTimer Time - Clocks and liveness
//!
//! This crate implements:
//! - Clock abstraction (wall clock, sender-local nanoseconds, monotonic age)
//! - A manually driven clock for deterministic tests
//! - The liveness tracker for checkpoint senders

pub mod clock;
pub mod liveness;

pub use clock::*;
pub use liveness::*;
