//! Error types for the core protocol layer

use crate::protocol::Channel;
use thiserror::Error;

/// Failures reported by a [`Transport`](crate::Transport) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// Writing a characteristic failed
    #[error("Write to {channel} failed: {message}")]
    Write { channel: Channel, message: String },

    /// Enabling notifications failed
    #[error("Subscribe to {channel} failed: {message}")]
    Subscribe { channel: Channel, message: String },

    /// Disabling notifications failed
    #[error("Unsubscribe from {channel} failed: {message}")]
    Unsubscribe { channel: Channel, message: String },

    /// The peripheral went away
    #[error("Device disconnected")]
    Disconnected,
}

/// Core error type
#[derive(Error, Debug)]
pub enum CoreError {
    /// Transport-level failure
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A ride-mode record did not have the fixed length
    #[error("Invalid ride-mode record length: expected {expected} bytes, got {actual}")]
    InvalidRecordLength { expected: usize, actual: usize },

    /// Unknown ride-mode name
    #[error("Unknown ride mode: {0}")]
    UnknownRideMode(String),
}

/// Result type alias using `CoreError`
pub type Result<T> = std::result::Result<T, CoreError>;
