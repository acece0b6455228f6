use crate::state::Phase;
use cphw_core::TransportError;
use thiserror::Error;

/// Errors that can occur during a firmware update
#[derive(Error, Debug)]
pub enum DfuError {
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Firmware image too short: {len} bytes (erase header alone needs {min})")]
    ImageTooShort { len: usize, min: usize },

    /// The device did not acknowledge within the phase deadline. The session
    /// has already been reset to idle; the device is left wherever it stopped.
    #[error("Timed out waiting for {phase} acknowledgment")]
    PhaseTimeout { phase: Phase },

    /// An upload was requested for a block the image does not have
    #[error("Block {index} out of range for a {count}-block image")]
    BlockOutOfRange { index: usize, count: usize },

    #[error("Update already in progress")]
    AlreadyRunning,

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, DfuError>;
