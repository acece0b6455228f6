use crate::config::UpdateConfig;
use crate::error::{DfuError, Result};
use crate::image::FirmwareImage;
use crate::machine::{Command, UpdateMachine};
use crate::state::{Phase, Step, UpdateState};
use crate::types::{UpdateProgress, UpdateReport};
use cphw_core::protocol::ENTER_BOOTLOADER;
use cphw_core::{Channel, Transport, TransportError, WriteKind};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Drives one firmware update over a connected, authenticated transport.
///
/// The session exclusively owns the bootloader command/response
/// characteristics while it runs. Notifications are pushed onto a queue by
/// the subscription callback and consumed by a single poll loop, so only one
/// command is ever in flight.
///
/// # Example
///
/// ```ignore
/// use cphw_dfu::{FirmwareImage, UpdateConfig, UpdateSession};
///
/// let image = FirmwareImage::load("firmware.bin")?;
/// let session = UpdateSession::new(&transport, UpdateConfig::default());
///
/// session.enter_bootloader().await?;
/// // reconnect, then:
/// let report = session.run(image).await?;
/// println!("Uploaded {} blocks", report.blocks_uploaded);
/// ```
pub struct UpdateSession<'a, T: Transport + ?Sized> {
    transport: &'a T,
    config: UpdateConfig,
    progress: Option<mpsc::Sender<UpdateProgress>>,
}

impl<'a, T: Transport + ?Sized> UpdateSession<'a, T> {
    pub fn new(transport: &'a T, config: UpdateConfig) -> Self {
        Self {
            transport,
            config,
            progress: None,
        }
    }

    /// Report progress events on `tx`
    pub fn with_progress(mut self, tx: mpsc::Sender<UpdateProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Ask the application firmware to reboot into its bootloader.
    ///
    /// The wheel drops the link shortly afterwards; callers reconnect once
    /// this returns.
    pub async fn enter_bootloader(&self) -> Result<()> {
        info!("Resetting into bootloader");
        self.transport
            .write(Channel::Control, &ENTER_BOOTLOADER, WriteKind::WithoutResponse)
            .await?;
        tokio::time::sleep(self.config.bootloader_settle()).await;
        Ok(())
    }

    /// Run erase → program → checksum → reset for `image`.
    ///
    /// Transport failures abort immediately. A phase that is not
    /// acknowledged in time returns [`DfuError::PhaseTimeout`] without any
    /// further command being sent.
    pub async fn run(&self, image: FirmwareImage) -> Result<UpdateReport> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        self.transport
            .subscribe(
                Channel::BootloaderResponse,
                Box::new(move |payload: &[u8]| {
                    let _ = tx.send(payload.to_vec());
                }),
            )
            .await?;

        let outcome = self.drive(image, &mut rx).await;

        // The wheel reboots after the reset command, so a failed unsubscribe
        // is expected and never masks the session outcome.
        if let Err(e) = self
            .transport
            .unsubscribe(Channel::BootloaderResponse)
            .await
        {
            warn!("Unsubscribe after update failed: {}", e);
        }

        if let Err(e) = &outcome {
            error!("Firmware update failed: {}", e);
        }

        outcome
    }

    async fn drive(
        &self,
        image: FirmwareImage,
        notifications: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Result<UpdateReport> {
        let start_time = Instant::now();
        let started_at = chrono::Utc::now().to_rfc3339();
        let total = image.block_count();
        let bytes_dropped = image.dropped_bytes();

        let mut machine = UpdateMachine::new(image, self.config.phase_timeouts());

        // Anything that arrived between subscribing and the erase request
        // answers nothing we sent.
        while let Ok(payload) = notifications.try_recv() {
            machine.on_notification(&payload, Instant::now())?;
        }

        let erase = machine.start(Instant::now())?;
        self.issue(&erase).await?;
        machine.rearm(Instant::now());

        let mut coalesced = 0;
        loop {
            tokio::time::sleep(self.config.poll_interval()).await;

            if let Some((payload, extra)) = Self::take_notification(notifications)? {
                coalesced += extra;
                debug!(payload = ?payload, "Notified");
                let acknowledged = machine.state();

                if let Some(command) = machine.on_notification(&payload, Instant::now())? {
                    self.report_ack(acknowledged, total, &payload).await;
                    self.issue(&command).await?;

                    if command.step == Step::ResetToApp {
                        tokio::time::sleep(self.config.reset_settle()).await;
                        break;
                    }
                    machine.rearm(Instant::now());
                }
            }

            if let Err(e) = machine.check_deadline(Instant::now()) {
                if let DfuError::PhaseTimeout { phase } = &e {
                    self.emit(UpdateProgress::TimedOut { phase: *phase }).await;
                }
                return Err(e);
            }
        }

        let image = machine.image();
        let summary = UpdateReport {
            started_at,
            completed_at: chrono::Utc::now().to_rfc3339(),
            duration_ms: start_time.elapsed().as_millis() as u64,
            blocks_uploaded: image.block_count(),
            bytes_uploaded: image.payload_len(),
            bytes_dropped,
            checksum_response: machine.checksum_response().unwrap_or_default().to_vec(),
            ignored_notifications: machine.ignored_notifications(),
            coalesced_notifications: coalesced,
        };

        self.emit(UpdateProgress::Completed {
            blocks: summary.blocks_uploaded,
        })
        .await;

        info!(
            "Firmware update complete: {} blocks ({} bytes) in {}ms",
            summary.blocks_uploaded, summary.bytes_uploaded, summary.duration_ms
        );

        Ok(summary)
    }

    /// Drain the queue and treat whatever arrived during one tick as a
    /// single acknowledgment.
    ///
    /// Returns the latest payload and how many earlier ones were folded into
    /// it. A closed queue is only an error once it is also empty.
    fn take_notification(
        notifications: &mut mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Result<Option<(Vec<u8>, usize)>> {
        let mut latest: Option<Vec<u8>> = None;
        let mut extra = 0;

        loop {
            match notifications.try_recv() {
                Ok(payload) => {
                    if let Some(earlier) = latest.replace(payload) {
                        debug!(payload = ?earlier, "Coalescing notification");
                        extra += 1;
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) if latest.is_some() => break,
                Err(TryRecvError::Disconnected) => {
                    return Err(DfuError::Transport(TransportError::Disconnected));
                }
            }
        }

        Ok(latest.map(|payload| (payload, extra)))
    }

    async fn issue(&self, command: &Command) -> Result<()> {
        match command.step {
            Step::Erase => {
                info!(header = ?command.payload, "Requesting erase");
                self.emit(UpdateProgress::PhaseStarted {
                    phase: Phase::Erase,
                })
                .await;
            }
            Step::Upload(index) => {
                if index == 0 {
                    info!("Programming");
                    self.emit(UpdateProgress::PhaseStarted {
                        phase: Phase::Program,
                    })
                    .await;
                }
                debug!(block = index, "Writing block");
            }
            Step::VerifyChecksum => {
                info!("Checking checksum");
                self.emit(UpdateProgress::PhaseStarted {
                    phase: Phase::Checksum,
                })
                .await;
            }
            Step::ResetToApp => info!("Resetting to application"),
        }

        self.transport
            .write(command.channel, &command.payload, command.kind)
            .await?;
        Ok(())
    }

    async fn report_ack(&self, acknowledged: UpdateState, total: usize, payload: &[u8]) {
        match acknowledged {
            UpdateState::Programming(index) => {
                self.emit(UpdateProgress::BlockUploaded { index, total }).await;
            }
            UpdateState::Checksumming => {
                self.emit(UpdateProgress::ChecksumAcknowledged {
                    response: payload.to_vec(),
                })
                .await;
            }
            UpdateState::Idle | UpdateState::Erasing => {}
        }
    }

    async fn emit(&self, progress: UpdateProgress) {
        if let Some(tx) = &self.progress {
            let _ = tx.send(progress).await;
        }
    }
}
