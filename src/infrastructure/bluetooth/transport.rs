//! Transport contract
//!
//! What the controller needs from a Bluetooth stack. Asynchronous callbacks
//! (value changes, link loss) arrive as [`TransportEvent`]s on the channel
//! handed to [`Transport::connect`].

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Distinguishes successive connections, so late events from a replaced
/// session can be recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDevice {
    /// Stable transport-level identifier.
    pub identity: String,
    pub name: Option<String>,
}

/// A characteristic resolved on a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRef {
    pub service: Uuid,
    pub uuid: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEventKind {
    Notification { characteristic: Uuid, value: Vec<u8> },
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportEvent {
    pub session: SessionId,
    pub identity: String,
    pub kind: TransportEventKind,
}

pub type EventSender = mpsc::UnboundedSender<TransportEvent>;
pub type EventReceiver = mpsc::UnboundedReceiver<TransportEvent>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("User cancelled the device chooser")]
    UserCancelled,
    #[error("No Bluetooth adapter available")]
    NoAdapter,
    #[error("No matching device found")]
    NoDeviceFound,
    #[error("Device {0} is not reachable")]
    DeviceNotFound(String),
    #[error("Characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("Device {0} is not connected")]
    NotConnected(String),
    #[error("Empty value read from {0}")]
    EmptyRead(Uuid),
    #[error("Bluetooth error: {0}")]
    Backend(#[from] btleplug::Error),
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::UserCancelled)
    }
}

/// Live change-notification stream. Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    cancel: CancellationToken,
}

impl Subscription {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Let the user choose a device advertising `service`, skipping any whose
    /// identity is in `exclude`.
    async fn request_device(
        &self,
        service: Uuid,
        exclude: &[String],
    ) -> Result<DiscoveredDevice, TransportError>;

    /// Find a previously paired device again.
    async fn device_by_identity(&self, identity: &str) -> Result<DiscoveredDevice, TransportError>;

    /// Open a session. The transport reports link loss and value changes for
    /// this session on `events`.
    async fn connect(
        &self,
        device: &DiscoveredDevice,
        session: SessionId,
        events: EventSender,
    ) -> Result<Box<dyn GattSession>, TransportError>;
}

#[async_trait]
pub trait GattSession: Send + Sync {
    async fn characteristic(&self, service: Uuid, uuid: Uuid)
        -> Result<CharacteristicRef, TransportError>;

    async fn read(&self, characteristic: &CharacteristicRef) -> Result<u8, TransportError>;

    async fn write(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), TransportError>;

    async fn subscribe(&self, characteristic: &CharacteristicRef)
        -> Result<Subscription, TransportError>;

    /// Best effort; the session is unusable afterwards.
    async fn disconnect(&self);
}
