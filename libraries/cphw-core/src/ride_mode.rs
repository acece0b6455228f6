//! Ride-mode presets and payload framing
//!
//! A ride-mode write is a fixed 18-byte parameter record followed by the two
//! CRC16 bytes computed over that record. The wheel drops writes whose
//! checksum does not match.

use crate::checksum::crc16;
use crate::error::{CoreError, Result};
use crate::protocol::Channel;
use crate::transport::{Transport, WriteKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Length of a ride-mode parameter record (checksum excluded)
pub const RIDE_MODE_RECORD_LEN: usize = 18;

const TURBO: [u8; RIDE_MODE_RECORD_LEN] = [
    0x7f, 0x55, 0x00, 0x7d, 0x00, 0x00, 0x00, 0x00, 0x80, 0x40, 0x40, 0xff, 0xd5, 0x00, 0x00, 0x00,
    0x00, 0x01,
];

const STANDARD: [u8; RIDE_MODE_RECORD_LEN] = [
    0x40, 0x40, 0x1e, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7f, 0x7f, 0x7f, 0x7f, 0x7f, 0x00, 0x00, 0x00,
    0x00, 0x01,
];

const ECO: [u8; RIDE_MODE_RECORD_LEN] = [
    0x20, 0x20, 0x0a, 0x00, 0x00, 0x00, 0x00, 0x00, 0x7f, 0x7f, 0x7f, 0x7f, 0x7f, 0x00, 0x00, 0x00,
    0x00, 0x01,
];

/// Stock ride modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RideMode {
    Turbo,
    Standard,
    Eco,
}

impl RideMode {
    /// Parameter record for this preset
    pub const fn record(self) -> [u8; RIDE_MODE_RECORD_LEN] {
        match self {
            RideMode::Turbo => TURBO,
            RideMode::Standard => STANDARD,
            RideMode::Eco => ECO,
        }
    }

    /// Checksummed payload for this preset
    pub fn payload(self) -> RideModePayload {
        RideModePayload::new(self.record())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideMode::Turbo => "turbo",
            RideMode::Standard => "standard",
            RideMode::Eco => "eco",
        }
    }
}

impl fmt::Display for RideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "turbo" => Ok(RideMode::Turbo),
            "standard" => Ok(RideMode::Standard),
            "eco" => Ok(RideMode::Eco),
            other => Err(CoreError::UnknownRideMode(other.to_string())),
        }
    }
}

/// A parameter record together with its checksum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RideModePayload {
    record: [u8; RIDE_MODE_RECORD_LEN],
    checksum: (u8, u8),
}

impl RideModePayload {
    pub fn new(record: [u8; RIDE_MODE_RECORD_LEN]) -> Self {
        let checksum = crc16(&record);
        Self { record, checksum }
    }

    /// Build a payload from a raw record, e.g. one read back from the wheel
    pub fn from_record(record: &[u8]) -> Result<Self> {
        let record: [u8; RIDE_MODE_RECORD_LEN] =
            record.try_into().map_err(|_| CoreError::InvalidRecordLength {
                expected: RIDE_MODE_RECORD_LEN,
                actual: record.len(),
            })?;
        Ok(Self::new(record))
    }

    pub fn record(&self) -> &[u8; RIDE_MODE_RECORD_LEN] {
        &self.record
    }

    /// `(low_byte, high_byte)`
    pub fn checksum(&self) -> (u8, u8) {
        self.checksum
    }

    /// Record followed by the low and high checksum bytes
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(RIDE_MODE_RECORD_LEN + 2);
        bytes.extend_from_slice(&self.record);
        bytes.push(self.checksum.0);
        bytes.push(self.checksum.1);
        bytes
    }
}

/// Write a ride-mode preset to an authenticated wheel.
///
/// Returns the payload that was written.
pub async fn set_ride_mode<T: Transport + ?Sized>(
    transport: &T,
    mode: RideMode,
) -> Result<RideModePayload> {
    let payload = mode.payload();
    let bytes = payload.to_bytes();

    debug!(mode = %mode, payload = ?bytes, "Writing ride mode");
    transport
        .write(Channel::RideMode, &bytes, WriteKind::WithResponse)
        .await?;
    info!(mode = %mode, "Ride mode set");

    Ok(payload)
}
