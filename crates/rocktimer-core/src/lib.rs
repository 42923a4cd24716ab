//! RockTimer Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every RockTimer crate:
//! - Checkpoint identities (tee, near hog line, far hog line)
//! - Sender-local nanosecond timestamps and split arithmetic
//! - Record identifiers
//! - Checkpoint events and their origin
//! - The process-wide system state

pub mod checkpoint;
pub mod id;
pub mod time;
pub mod event;
pub mod state;
pub mod error;

pub use checkpoint::*;
pub use id::*;
pub use time::*;
pub use event::*;
pub use state::*;
pub use error::*;
