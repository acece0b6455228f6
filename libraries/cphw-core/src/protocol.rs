//! GATT characteristic map and literal command bytes
//!
//! Every CPHW characteristic lives in the `52756265-6e43-6167-6e69-6543504850xx`
//! family. Multi-byte values are little-endian.

use std::fmt;
use uuid::Uuid;

/// Primary service advertised by a wheel running its application firmware
pub const CPHW_SERVICE_UUID: Uuid = Uuid::from_u128(0x52756265_6e43_6167_6e69_654350485000);

/// Service exposed while the wheel sits in its bootloader
pub const BOOTLOADER_SERVICE_UUID: Uuid = Uuid::from_u128(0x52756265_6e43_6167_6e69_654350485200);

/// Erase header length at the start of a firmware image
pub const ERASE_HEADER_LEN: usize = 10;

/// Payload length of one upload command
pub const BLOCK_LEN: usize = 64;

/// Switch the application into its bootloader
pub const ENTER_BOOTLOADER: [u8; 3] = [0xF0, 0x01, 0x01];

/// Ask the bootloader to verify the programmed image
pub const VERIFY_CHECKSUM: [u8; 1] = [0xFB];

/// Leave the bootloader and boot the application
pub const RESET_TO_APP: [u8; 3] = [0xF9, 0x01, 0x01];

/// Characteristics the tools write to or listen on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Application control characteristic (bootloader entry)
    Control,
    /// Ride-mode parameter record
    RideMode,
    /// Bootloader acknowledgments (notify)
    BootloaderResponse,
    /// Bootloader block upload
    BootloaderData,
    /// Bootloader erase / checksum / reset commands
    BootloaderControl,
}

impl Channel {
    /// 128-bit characteristic UUID
    pub const fn uuid(self) -> Uuid {
        match self {
            Channel::Control => Uuid::from_u128(0x52756265_6e43_6167_6e69_654350485001),
            Channel::RideMode => Uuid::from_u128(0x52756265_6e43_6167_6e69_65435048500A),
            Channel::BootloaderResponse => {
                Uuid::from_u128(0x52756265_6e43_6167_6e69_654350485201)
            }
            Channel::BootloaderData => Uuid::from_u128(0x52756265_6e43_6167_6e69_654350485202),
            Channel::BootloaderControl => {
                Uuid::from_u128(0x52756265_6e43_6167_6e69_654350485203)
            }
        }
    }

    /// Short name used in logs and error messages
    pub fn name(self) -> &'static str {
        match self {
            Channel::Control => "control",
            Channel::RideMode => "ride-mode",
            Channel::BootloaderResponse => "bootloader-response",
            Channel::BootloaderData => "bootloader-data",
            Channel::BootloaderControl => "bootloader-control",
        }
    }

    /// Look up the channel for a characteristic UUID
    pub fn from_uuid(uuid: Uuid) -> Option<Self> {
        [
            Channel::Control,
            Channel::RideMode,
            Channel::BootloaderResponse,
            Channel::BootloaderData,
            Channel::BootloaderControl,
        ]
        .into_iter()
        .find(|channel| channel.uuid() == uuid)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
