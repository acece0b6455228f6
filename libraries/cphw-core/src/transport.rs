/// The seam between the wheel protocol and a BLE backend
use crate::error::TransportError;
use crate::protocol::Channel;
use async_trait::async_trait;

/// Callback invoked once per incoming notification payload.
///
/// Backends call this from their own notification task, so implementations
/// should only hand the payload off (e.g. push it onto a channel).
pub type NotificationHandler = Box<dyn Fn(&[u8]) + Send + Sync + 'static>;

/// GATT write flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// Wait for the peripheral's write response
    WithResponse,
    /// Fire and forget
    WithoutResponse,
}

/// A connected, authenticated link to one wheel.
///
/// Implementers own connection management, pairing and discovery; the
/// protocol code only ever writes characteristics and listens for
/// notifications.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Write `payload` to `channel`
    ///
    /// # Errors
    /// Returns an error if the write could not be delivered
    async fn write(
        &self,
        channel: Channel,
        payload: &[u8],
        kind: WriteKind,
    ) -> Result<(), TransportError>;

    /// Register `handler` for notifications on `channel`
    async fn subscribe(
        &self,
        channel: Channel,
        handler: NotificationHandler,
    ) -> Result<(), TransportError>;

    /// Remove the notification handler for `channel`
    async fn unsubscribe(&self, channel: Channel) -> Result<(), TransportError>;
}
