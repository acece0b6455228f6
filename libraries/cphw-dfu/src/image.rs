//! Firmware image loader
//!
//! A wheel firmware file is a raw binary: the first 10 bytes are the erase
//! parameters, the rest is uploaded in 64-byte blocks. A trailing partial
//! block is never sent to the bootloader.

use crate::error::{DfuError, Result};
use cphw_core::protocol::{BLOCK_LEN, ERASE_HEADER_LEN};
use std::path::Path;
use tracing::{debug, warn};

/// One upload command's worth of firmware
pub type Block = [u8; BLOCK_LEN];

/// A firmware file split into protocol-sized pieces.
///
/// `blocks()[i]` holds file bytes `10 + 64*i .. 10 + 64*(i+1)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    erase_header: [u8; ERASE_HEADER_LEN],
    blocks: Vec<Block>,
    dropped_bytes: usize,
}

impl FirmwareImage {
    /// Read and split the firmware file at `path`
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        debug!(path = %path.display(), len = bytes.len(), "Read firmware file");
        Self::from_bytes(&bytes)
    }

    /// Split an in-memory firmware binary
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < ERASE_HEADER_LEN {
            return Err(DfuError::ImageTooShort {
                len: bytes.len(),
                min: ERASE_HEADER_LEN,
            });
        }

        let (header, body) = bytes.split_at(ERASE_HEADER_LEN);
        let mut erase_header = [0u8; ERASE_HEADER_LEN];
        erase_header.copy_from_slice(header);

        let chunks = body.chunks_exact(BLOCK_LEN);
        let dropped_bytes = chunks.remainder().len();
        let blocks: Vec<Block> = chunks
            .map(|chunk| {
                let mut block = [0u8; BLOCK_LEN];
                block.copy_from_slice(chunk);
                block
            })
            .collect();

        if dropped_bytes > 0 {
            warn!(
                dropped_bytes,
                blocks = blocks.len(),
                "Firmware image does not end on a block boundary, trailing bytes will not be uploaded"
            );
        }

        Ok(Self {
            erase_header,
            blocks,
            dropped_bytes,
        })
    }

    /// Payload of the erase command
    pub fn erase_header(&self) -> &[u8; ERASE_HEADER_LEN] {
        &self.erase_header
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Bytes that will actually be uploaded
    pub fn payload_len(&self) -> usize {
        self.blocks.len() * BLOCK_LEN
    }

    /// Trailing bytes past the last full block
    pub fn dropped_bytes(&self) -> usize {
        self.dropped_bytes
    }
}
