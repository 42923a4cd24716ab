//! Error types for RockTimer

use thiserror::Error;

/// Core RockTimer errors
#[derive(Error, Debug)]
pub enum RockTimerError {
    // Wire errors
    #[error("Invalid wire message: {0}")]
    InvalidMessage(String),

    #[error("Message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },

    #[error("Unknown checkpoint: {0}")]
    UnknownCheckpoint(String),

    // Transport errors
    #[error("Transport error: {0}")]
    TransportError(String),

    // Runtime errors
    #[error("Channel closed: {0}")]
    ChannelClosed(&'static str),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for RockTimer operations
pub type RockTimerResult<T> = Result<T, RockTimerError>;
