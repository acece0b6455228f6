//! Update state machine
//!
//! Owns the firmware image, the current [`UpdateState`] and the phase
//! deadline for one session. The session driver feeds it notifications and
//! clock readings and sends whatever [`Command`] it hands back.

use crate::config::PhaseTimeouts;
use crate::error::{DfuError, Result};
use crate::image::FirmwareImage;
use crate::state::{Step, Transition, UpdateState};
use crate::supervisor::TimeoutSupervisor;
use cphw_core::protocol::{RESET_TO_APP, VERIFY_CHECKSUM};
use cphw_core::{Channel, WriteKind};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A characteristic write the driver must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    pub step: Step,
    pub channel: Channel,
    pub payload: Vec<u8>,
    pub kind: WriteKind,
}

/// State machine for one update session
#[derive(Debug)]
pub struct UpdateMachine {
    image: FirmwareImage,
    state: UpdateState,
    supervisor: TimeoutSupervisor,
    timeouts: PhaseTimeouts,
    checksum_response: Option<Vec<u8>>,
    ignored_notifications: usize,
}

impl UpdateMachine {
    pub fn new(image: FirmwareImage, timeouts: PhaseTimeouts) -> Self {
        Self {
            image,
            state: UpdateState::Idle,
            supervisor: TimeoutSupervisor::new(),
            timeouts,
            checksum_response: None,
            ignored_notifications: 0,
        }
    }

    pub fn state(&self) -> UpdateState {
        self.state
    }

    pub fn image(&self) -> &FirmwareImage {
        &self.image
    }

    pub fn supervisor(&self) -> &TimeoutSupervisor {
        &self.supervisor
    }

    /// Payload of the checksum acknowledgment, once received.
    ///
    /// The bootloader's verdict is not decoded; callers get the raw bytes.
    pub fn checksum_response(&self) -> Option<&[u8]> {
        self.checksum_response.as_deref()
    }

    /// Notifications that arrived while nothing was outstanding
    pub fn ignored_notifications(&self) -> usize {
        self.ignored_notifications
    }

    /// `Idle → Erasing`: returns the erase command
    pub fn start(&mut self, now: Instant) -> Result<Command> {
        if !self.state.is_idle() {
            return Err(DfuError::AlreadyRunning);
        }

        info!(
            blocks = self.image.block_count(),
            bytes = self.image.payload_len(),
            "Starting firmware update"
        );

        let transition = self.state.start();
        self.apply(transition, now)?.ok_or(DfuError::AlreadyRunning)
    }

    /// Feed one notification from the bootloader response channel.
    ///
    /// Returns the next command, or `None` when the notification was not
    /// expected (session idle).
    pub fn on_notification(&mut self, payload: &[u8], now: Instant) -> Result<Option<Command>> {
        match self.state {
            UpdateState::Idle => {
                self.ignored_notifications += 1;
                warn!(payload = ?payload, "Ignoring notification while idle");
                return Ok(None);
            }
            UpdateState::Erasing => info!("Erase acknowledged"),
            UpdateState::Programming(index) => {
                debug!(block = index, "Block acknowledged");
            }
            UpdateState::Checksumming => {
                info!(response = ?payload, "Checksum acknowledged");
                self.checksum_response = Some(payload.to_vec());
            }
        }

        let transition = self.state.acknowledge(self.image.block_count());
        self.apply(transition, now)
    }

    /// Abort to `Idle` if the outstanding phase overran its deadline.
    ///
    /// No command is produced on this path; the error names the phase that
    /// timed out.
    pub fn check_deadline(&mut self, now: Instant) -> Result<()> {
        let Some(phase) = self.state.phase() else {
            return Ok(());
        };

        if !self.supervisor.expired(now) {
            return Ok(());
        }

        warn!(state = %self.state, "Phase timed out, abandoning update");
        let transition = self.state.expire();
        self.apply(transition, now)?;

        Err(DfuError::PhaseTimeout { phase })
    }

    /// Restart the current phase's deadline from `now`.
    ///
    /// The driver calls this once the command write has returned; the device
    /// gets the full phase timeout counted from that point.
    pub fn rearm(&mut self, now: Instant) {
        match self.state {
            UpdateState::Idle => self.supervisor.disarm(),
            UpdateState::Erasing => self.supervisor.arm_from(now, self.timeouts.erase),
            UpdateState::Programming(_) => self.supervisor.arm_from(now, self.timeouts.program),
            UpdateState::Checksumming => self.supervisor.arm_from(now, self.timeouts.checksum),
        }
    }

    fn apply(&mut self, transition: Transition, now: Instant) -> Result<Option<Command>> {
        let command = transition.step.map(|step| self.command(step)).transpose()?;

        self.state = transition.next;
        self.rearm(now);

        Ok(command)
    }

    fn command(&self, step: Step) -> Result<Command> {
        let (channel, payload, kind) = match step {
            Step::Erase => (
                Channel::BootloaderControl,
                self.image.erase_header().to_vec(),
                WriteKind::WithoutResponse,
            ),
            Step::Upload(index) => {
                let block = self.image.block(index).ok_or(DfuError::BlockOutOfRange {
                    index,
                    count: self.image.block_count(),
                })?;
                (
                    Channel::BootloaderData,
                    block.to_vec(),
                    WriteKind::WithoutResponse,
                )
            }
            Step::VerifyChecksum => (
                Channel::BootloaderControl,
                VERIFY_CHECKSUM.to_vec(),
                WriteKind::WithoutResponse,
            ),
            Step::ResetToApp => (
                Channel::BootloaderControl,
                RESET_TO_APP.to_vec(),
                WriteKind::WithResponse,
            ),
        };

        Ok(Command {
            step,
            channel,
            payload,
            kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Phase;
    use std::time::Duration;

    fn image(blocks: usize) -> FirmwareImage {
        let bytes: Vec<u8> = (0..10 + 64 * blocks).map(|i| i as u8).collect();
        FirmwareImage::from_bytes(&bytes).unwrap()
    }

    #[test]
    fn test_full_sequence_visits_every_state_once() {
        let now = Instant::now();
        let mut machine = UpdateMachine::new(image(3), PhaseTimeouts::default());

        let erase = machine.start(now).unwrap();
        assert_eq!(erase.step, Step::Erase);
        assert_eq!(erase.payload, (0u8..10).collect::<Vec<_>>());

        let mut visited = vec![machine.state()];
        let mut steps = vec![erase.step];
        while let Some(command) = machine.on_notification(&[0x01], now).unwrap() {
            visited.push(machine.state());
            steps.push(command.step);
        }

        assert_eq!(
            visited,
            vec![
                UpdateState::Erasing,
                UpdateState::Programming(0),
                UpdateState::Programming(1),
                UpdateState::Programming(2),
                UpdateState::Checksumming,
                UpdateState::Idle,
            ]
        );
        assert_eq!(
            steps,
            vec![
                Step::Erase,
                Step::Upload(0),
                Step::Upload(1),
                Step::Upload(2),
                Step::VerifyChecksum,
                Step::ResetToApp,
            ]
        );
        assert_eq!(machine.ignored_notifications(), 1);
    }

    #[test]
    fn test_upload_commands_carry_blocks() {
        let now = Instant::now();
        let mut machine = UpdateMachine::new(image(2), PhaseTimeouts::default());
        machine.start(now).unwrap();

        let upload = machine.on_notification(&[], now).unwrap().unwrap();
        assert_eq!(upload.channel, Channel::BootloaderData);
        assert_eq!(upload.kind, WriteKind::WithoutResponse);
        assert_eq!(upload.payload.len(), 64);
        assert_eq!(upload.payload[0], 10);
    }

    #[test]
    fn test_checksum_and_reset_commands() {
        let now = Instant::now();
        let mut machine = UpdateMachine::new(image(0), PhaseTimeouts::default());
        machine.start(now).unwrap();

        let verify = machine.on_notification(&[], now).unwrap().unwrap();
        assert_eq!(verify.channel, Channel::BootloaderControl);
        assert_eq!(verify.payload, vec![0xFB]);

        let reset = machine.on_notification(&[0xFB, 0x00], now).unwrap().unwrap();
        assert_eq!(reset.payload, vec![0xF9, 0x01, 0x01]);
        assert_eq!(reset.kind, WriteKind::WithResponse);
        assert_eq!(machine.checksum_response(), Some(&[0xFB, 0x00][..]));
        assert!(machine.state().is_idle());
        assert!(machine.supervisor().deadline().is_none());
    }

    #[test]
    fn test_start_twice_is_rejected() {
        let now = Instant::now();
        let mut machine = UpdateMachine::new(image(1), PhaseTimeouts::default());
        machine.start(now).unwrap();
        assert!(matches!(machine.start(now), Err(DfuError::AlreadyRunning)));
        assert_eq!(machine.state(), UpdateState::Erasing);
    }

    #[test]
    fn test_idle_notification_is_ignored() {
        let mut machine = UpdateMachine::new(image(1), PhaseTimeouts::default());
        assert!(machine
            .on_notification(&[0x01], Instant::now())
            .unwrap()
            .is_none());
        assert_eq!(machine.state(), UpdateState::Idle);
        assert_eq!(machine.ignored_notifications(), 1);
    }

    #[test]
    fn test_deadline_expiry_aborts_to_idle() {
        let start = Instant::now();
        let timeouts = PhaseTimeouts {
            erase: Duration::from_secs(5),
            program: Duration::from_secs(2),
            checksum: Duration::from_secs(2),
        };
        let mut machine = UpdateMachine::new(image(4), timeouts);
        machine.start(start).unwrap();

        assert!(machine.check_deadline(start + Duration::from_secs(4)).is_ok());

        // Ack at t=4 re-arms with the program timeout
        let acked = start + Duration::from_secs(4);
        machine.on_notification(&[], acked).unwrap().unwrap();
        assert!(machine.check_deadline(acked + Duration::from_secs(2)).is_ok());

        match machine.check_deadline(acked + Duration::from_millis(2_100)) {
            Err(DfuError::PhaseTimeout { phase }) => assert_eq!(phase, Phase::Program),
            other => panic!("Expected PhaseTimeout, got {:?}", other),
        }
        assert_eq!(machine.state(), UpdateState::Idle);

        // Nothing is outstanding any more
        assert!(machine.on_notification(&[], acked).unwrap().is_none());
        assert!(machine.check_deadline(acked + Duration::from_secs(60)).is_ok());
    }

    #[test]
    fn test_rearm_restarts_deadline_from_write_completion() {
        let start = Instant::now();
        let timeouts = PhaseTimeouts {
            erase: Duration::from_secs(5),
            ..PhaseTimeouts::default()
        };
        let mut machine = UpdateMachine::new(image(1), timeouts);
        machine.start(start).unwrap();

        // Erase write took 3s to complete
        let written = start + Duration::from_secs(3);
        machine.rearm(written);

        assert_eq!(
            machine.supervisor().deadline(),
            Some(written + Duration::from_secs(5))
        );
        assert!(machine.check_deadline(start + Duration::from_secs(7)).is_ok());
        assert!(machine.check_deadline(start + Duration::from_secs(9)).is_err());
    }

    #[test]
    fn test_upload_past_last_block_is_an_error() {
        let machine = UpdateMachine::new(image(2), PhaseTimeouts::default());

        assert!(machine.command(Step::Upload(1)).is_ok());
        match machine.command(Step::Upload(2)) {
            Err(DfuError::BlockOutOfRange { index, count }) => {
                assert_eq!(index, 2);
                assert_eq!(count, 2);
            }
            other => panic!("Expected BlockOutOfRange, got {:?}", other),
        }
    }
}
