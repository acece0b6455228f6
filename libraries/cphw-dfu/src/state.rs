//! Update state and pure transition functions
//!
//! Transitions never perform I/O. Each returns the next state plus the step
//! the driver must issue, so the whole protocol can be exercised without a
//! device.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single request/acknowledgment cycle of the bootloader protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Erase,
    Program,
    Checksum,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Erase => "erase",
            Phase::Program => "program",
            Phase::Checksum => "checksum",
        };
        f.write_str(name)
    }
}

/// Where the session is in the erase → program → checksum sequence.
///
/// `Idle` is both the initial and the terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum UpdateState {
    #[default]
    Idle,
    Erasing,
    /// Waiting for the acknowledgment of block `index`
    Programming(usize),
    Checksumming,
}

/// Command the driver has to send after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Erase,
    Upload(usize),
    VerifyChecksum,
    ResetToApp,
}

/// Result of feeding an input to an [`UpdateState`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub next: UpdateState,
    pub step: Option<Step>,
}

impl Transition {
    fn to(next: UpdateState, step: Step) -> Self {
        Self {
            next,
            step: Some(step),
        }
    }

    fn silent(next: UpdateState) -> Self {
        Self {
            next,
            step: None,
        }
    }
}

impl UpdateState {
    /// Phase whose acknowledgment is outstanding, if any
    pub fn phase(self) -> Option<Phase> {
        match self {
            UpdateState::Idle => None,
            UpdateState::Erasing => Some(Phase::Erase),
            UpdateState::Programming(_) => Some(Phase::Program),
            UpdateState::Checksumming => Some(Phase::Checksum),
        }
    }

    pub fn is_idle(self) -> bool {
        self == UpdateState::Idle
    }

    /// Begin a session. Only valid from `Idle`; any other state is left as is.
    pub fn start(self) -> Transition {
        match self {
            UpdateState::Idle => Transition::to(UpdateState::Erasing, Step::Erase),
            busy => Transition::silent(busy),
        }
    }

    /// The device acknowledged the outstanding command.
    pub fn acknowledge(self, block_count: usize) -> Transition {
        match self {
            UpdateState::Idle => Transition::silent(UpdateState::Idle),
            UpdateState::Erasing => Self::program_or_verify(0, block_count),
            UpdateState::Programming(index) => Self::program_or_verify(index + 1, block_count),
            UpdateState::Checksumming => Transition::to(UpdateState::Idle, Step::ResetToApp),
        }
    }

    /// The phase deadline passed. The session is abandoned without a command.
    pub fn expire(self) -> Transition {
        Transition::silent(UpdateState::Idle)
    }

    fn program_or_verify(next_block: usize, block_count: usize) -> Transition {
        if next_block < block_count {
            Transition::to(
                UpdateState::Programming(next_block),
                Step::Upload(next_block),
            )
        } else {
            Transition::to(UpdateState::Checksumming, Step::VerifyChecksum)
        }
    }
}

impl fmt::Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateState::Idle => f.write_str("idle"),
            UpdateState::Erasing => f.write_str("erasing"),
            UpdateState::Programming(index) => write!(f, "programming block {}", index),
            UpdateState::Checksumming => f.write_str("checksumming"),
        }
    }
}
