//! CPHW Firmware Update
//!
//! Reflashes a CPHW wheel through its BLE bootloader.
//!
//! This crate provides:
//! - Firmware image loading (erase header + 64-byte blocks)
//! - A pure update state machine (erase → program → checksum → reset)
//! - Per-phase timeout supervision
//! - An async session driver on top of [`cphw_core::Transport`]
//!
//! # Protocol
//!
//! The bootloader is strictly half-duplex: every command is acknowledged by
//! exactly one notification on the response characteristic before the next
//! command may be sent. There are no sequence numbers, so the session never
//! pipelines.
//!
//! # Example
//!
//! ```ignore
//! use cphw_dfu::{FirmwareImage, UpdateConfig, UpdateSession};
//!
//! let config = UpdateConfig::load(None)?;
//! let image = FirmwareImage::load("firmware.bin")?;
//!
//! let (tx, mut rx) = tokio::sync::mpsc::channel(32);
//! let session = UpdateSession::new(&transport, config).with_progress(tx);
//!
//! tokio::spawn(async move {
//!     while let Some(progress) = rx.recv().await {
//!         match progress.percent() {
//!             Some(percent) => println!("{:?} ({:.0}%)", progress, percent),
//!             None => println!("{:?}", progress),
//!         }
//!     }
//! });
//!
//! let report = session.run(image).await?;
//! ```

mod config;
mod error;
mod image;
mod machine;
mod session;
mod state;
mod supervisor;
mod types;

// Public exports
pub use config::{PhaseTimeouts, UpdateConfig};
pub use error::{DfuError, Result};
pub use image::{Block, FirmwareImage};
pub use machine::{Command, UpdateMachine};
pub use session::UpdateSession;
pub use state::{Phase, Step, Transition, UpdateState};
pub use supervisor::TimeoutSupervisor;
pub use types::{UpdateProgress, UpdateReport};
