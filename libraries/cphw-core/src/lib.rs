//! CPHW Core
//!
//! Transport-agnostic building blocks shared by every tool that talks to a
//! CPHW wheel over BLE.
//!
//! This crate provides:
//! - **Protocol constants**: GATT characteristic map and literal command bytes
//! - **Transport seam**: the `Transport` trait that a BLE backend implements
//! - **Checksum engine**: the bit-serial CRC16 the wheel expects on ride-mode writes
//! - **Ride modes**: the stock presets and payload framing
//!
//! # Architecture
//!
//! `cphw-core` never touches a Bluetooth stack. Scanning, connecting and the
//! authentication handshake live in the backend that implements [`Transport`].
//!
//! # Example: Building a ride-mode payload
//!
//! ```rust
//! use cphw_core::{crc16, RideMode};
//!
//! let payload = RideMode::Standard.payload();
//! let bytes = payload.to_bytes();
//!
//! assert_eq!(bytes.len(), 20);
//! assert_eq!(crc16(&bytes[..18]), (bytes[18], bytes[19]));
//! ```

pub mod checksum;
pub mod error;
pub mod protocol;
pub mod ride_mode;
pub mod transport;

// Public exports
pub use checksum::{append_crc16, crc16};
pub use error::{CoreError, Result, TransportError};
pub use protocol::Channel;
pub use ride_mode::{set_ride_mode, RideMode, RideModePayload, RIDE_MODE_RECORD_LEN};
pub use transport::{NotificationHandler, Transport, WriteKind};
