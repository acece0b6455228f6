/// Update engine configuration
use crate::error::{DfuError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Timeouts, poll cadence and settle delays for an update session.
///
/// Values can be layered from an optional TOML file and `CPHW_`-prefixed
/// environment variables (e.g. `CPHW_ERASE_TIMEOUT_SECS=45`).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct UpdateConfig {
    #[serde(default = "default_phase_timeout_secs")]
    pub erase_timeout_secs: u64,

    #[serde(default = "default_phase_timeout_secs")]
    pub program_timeout_secs: u64,

    #[serde(default = "default_phase_timeout_secs")]
    pub checksum_timeout_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Wait after the reset command while the wheel reboots into its application
    #[serde(default = "default_settle_ms")]
    pub reset_settle_ms: u64,

    /// Wait after the bootloader entry command before reconnecting
    #[serde(default = "default_settle_ms")]
    pub bootloader_settle_ms: u64,
}

/// Per-phase acknowledgment deadlines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhaseTimeouts {
    pub erase: Duration,
    pub program: Duration,
    pub checksum: Duration,
}

impl Default for PhaseTimeouts {
    fn default() -> Self {
        let timeout = Duration::from_secs(default_phase_timeout_secs());
        Self {
            erase: timeout,
            program: timeout,
            checksum: timeout,
        }
    }
}

impl UpdateConfig {
    /// Load configuration from an optional file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        if let Some(path) = path {
            settings = settings.add_source(config::File::from(path.to_path_buf()));
        }

        // Override with environment variables (prefixed with CPHW_)
        settings = settings.add_source(config::Environment::with_prefix("CPHW").try_parsing(true));

        let config = settings
            .build()
            .map_err(|e| DfuError::Config(e.to_string()))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| DfuError::Config(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("erase_timeout_secs", self.erase_timeout_secs),
            ("program_timeout_secs", self.program_timeout_secs),
            ("checksum_timeout_secs", self.checksum_timeout_secs),
            ("poll_interval_ms", self.poll_interval_ms),
        ];

        for (name, value) in timeouts {
            if value == 0 {
                return Err(DfuError::Config(format!("{} must be greater than zero", name)));
            }
        }

        if Duration::from_millis(self.poll_interval_ms)
            >= Duration::from_secs(self.erase_timeout_secs)
                .min(Duration::from_secs(self.program_timeout_secs))
                .min(Duration::from_secs(self.checksum_timeout_secs))
        {
            return Err(DfuError::Config(
                "poll_interval_ms must be shorter than every phase timeout".to_string(),
            ));
        }

        Ok(())
    }

    pub fn phase_timeouts(&self) -> PhaseTimeouts {
        PhaseTimeouts {
            erase: Duration::from_secs(self.erase_timeout_secs),
            program: Duration::from_secs(self.program_timeout_secs),
            checksum: Duration::from_secs(self.checksum_timeout_secs),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    pub fn bootloader_settle(&self) -> Duration {
        Duration::from_millis(self.bootloader_settle_ms)
    }
}

// Default values
fn default_phase_timeout_secs() -> u64 {
    30
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_settle_ms() -> u64 {
    2000
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            erase_timeout_secs: default_phase_timeout_secs(),
            program_timeout_secs: default_phase_timeout_secs(),
            checksum_timeout_secs: default_phase_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            reset_settle_ms: default_settle_ms(),
            bootloader_settle_ms: default_settle_ms(),
        }
    }
}
