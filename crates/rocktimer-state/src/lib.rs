//! RockTimer State Engine - Measurement admission and history
//!
//! This crate implements the measurement coordinator:
//! - Session tracking (first-wins per checkpoint)
//! - Traversal-order validation
//! - Idle/Armed/Measuring/Completed state machine
//! - Late backfill of the far split
//! - Bounded, most-recent-first timing history

pub mod coordinator;
pub mod history;
pub mod session;

pub use coordinator::*;
pub use history::*;
pub use session::*;
