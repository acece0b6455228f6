use crate::state::Phase;
use serde::{Deserialize, Serialize};

/// Progress events emitted while a session runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum UpdateProgress {
    /// A phase command was sent and its acknowledgment is awaited
    PhaseStarted { phase: Phase },
    /// The device acknowledged block `index` (zero-based) of `total`
    BlockUploaded { index: usize, total: usize },
    /// Raw checksum acknowledgment; its contents are not interpreted
    ChecksumAcknowledged { response: Vec<u8> },
    /// Reset command sent and settle delay elapsed
    Completed { blocks: usize },
    /// The phase overran its deadline and the session was abandoned
    TimedOut { phase: Phase },
}

impl UpdateProgress {
    /// Rough completion estimate in percent.
    ///
    /// `None` for an abandoned update.
    pub fn percent(&self) -> Option<f32> {
        let percent = match self {
            UpdateProgress::PhaseStarted { phase: Phase::Erase } => 0.0,
            UpdateProgress::PhaseStarted { phase: Phase::Program } => 5.0,
            UpdateProgress::BlockUploaded { index, total } => {
                if *total == 0 {
                    95.0
                } else {
                    5.0 + ((*index + 1) as f32 / *total as f32) * 90.0
                }
            }
            UpdateProgress::PhaseStarted {
                phase: Phase::Checksum,
            } => 95.0,
            UpdateProgress::ChecksumAcknowledged { .. } => 98.0,
            UpdateProgress::Completed { .. } => 100.0,
            UpdateProgress::TimedOut { .. } => return None,
        };
        Some(percent)
    }
}

/// Summary of a completed update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateReport {
    pub started_at: String,
    pub completed_at: String,
    pub duration_ms: u64,
    pub blocks_uploaded: usize,
    pub bytes_uploaded: usize,
    /// Trailing image bytes that were not uploaded
    pub bytes_dropped: usize,
    /// Raw checksum acknowledgment
    pub checksum_response: Vec<u8>,
    pub ignored_notifications: usize,
    /// Duplicate notifications folded into a single acknowledgment
    pub coalesced_notifications: usize,
}
