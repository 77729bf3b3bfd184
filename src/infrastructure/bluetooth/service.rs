//! Bluetooth Service Module
//!
//! btleplug implementation of the transport contract. Change notifications
//! and link loss are forwarded from btleplug's streams onto the controller's
//! event channel by small background tasks, each tied to a cancellation token.

use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::transport::{
    CharacteristicRef, DiscoveredDevice, EventSender, GattSession, SessionId, Subscription,
    Transport, TransportError, TransportEvent, TransportEventKind,
};
use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, Characteristic, Peripheral as _, WriteType};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Transport backed by the host's first Bluetooth adapter.
pub struct BtleTransport {
    scanner: Option<BleScanner>,
    service: Uuid,
}

impl BtleTransport {
    /// Open the default adapter. A missing adapter is not fatal: every
    /// operation then fails with [`TransportError::NoAdapter`].
    pub async fn new(service: Uuid, scan_window: Duration) -> Self {
        let scanner = match BleScanner::open(scan_window).await {
            Ok(scanner) => Some(scanner),
            Err(e) => {
                warn!("Bluetooth unavailable: {}", e);
                None
            }
        };
        Self { scanner, service }
    }

    pub fn is_available(&self) -> bool {
        self.scanner.is_some()
    }

    fn scanner(&self) -> Result<&BleScanner, TransportError> {
        self.scanner.as_ref().ok_or(TransportError::NoAdapter)
    }
}

#[async_trait]
impl Transport for BtleTransport {
    async fn request_device(
        &self,
        service: Uuid,
        exclude: &[String],
    ) -> Result<DiscoveredDevice, TransportError> {
        let devices = self.scanner()?.scan(service).await?;
        devices
            .into_iter()
            .find(|d| !exclude.contains(&d.identity))
            .map(|d| DiscoveredDevice {
                identity: d.identity,
                name: d.name,
            })
            .ok_or(TransportError::NoDeviceFound)
    }

    async fn device_by_identity(&self, identity: &str) -> Result<DiscoveredDevice, TransportError> {
        let found = self.scanner()?.find(identity, self.service).await?;
        Ok(DiscoveredDevice {
            identity: found.identity,
            name: found.name,
        })
    }

    async fn connect(
        &self,
        device: &DiscoveredDevice,
        session: SessionId,
        events: EventSender,
    ) -> Result<Box<dyn GattSession>, TransportError> {
        let scanner = self.scanner()?;
        let peripheral = scanner.find(&device.identity, self.service).await?.peripheral;

        if !peripheral.is_connected().await? {
            peripheral.connect().await?;
        }
        peripheral.discover_services().await?;

        let cancel = CancellationToken::new();
        let mut central_events = scanner.adapter().events().await?;
        let peripheral_id = peripheral.id();
        let watch_cancel = cancel.clone();
        let watch_events = events.clone();
        let identity = device.identity.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = watch_cancel.cancelled() => break,
                    event = central_events.next() => match event {
                        Some(CentralEvent::DeviceDisconnected(id)) if id == peripheral_id => {
                            info!("Link lost to {}", identity);
                            let _ = watch_events.send(TransportEvent {
                                session,
                                identity: identity.clone(),
                                kind: TransportEventKind::Disconnected,
                            });
                            break;
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
        });

        Ok(Box::new(BtleSession {
            peripheral,
            identity: device.identity.clone(),
            session,
            events,
            cancel,
        }))
    }
}

/// One open GATT connection.
pub struct BtleSession {
    peripheral: Peripheral,
    identity: String,
    session: SessionId,
    events: EventSender,
    cancel: CancellationToken,
}

impl BtleSession {
    fn lookup(&self, characteristic: &CharacteristicRef) -> Result<Characteristic, TransportError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == characteristic.uuid && c.service_uuid == characteristic.service)
            .ok_or(TransportError::CharacteristicNotFound(characteristic.uuid))
    }
}

#[async_trait]
impl GattSession for BtleSession {
    async fn characteristic(
        &self,
        service: Uuid,
        uuid: Uuid,
    ) -> Result<CharacteristicRef, TransportError> {
        let characteristics = self.peripheral.characteristics();
        // Prefer the control service, but standard characteristics such as
        // Battery Level often live in their own service.
        let found = characteristics
            .iter()
            .find(|c| c.uuid == uuid && c.service_uuid == service)
            .or_else(|| characteristics.iter().find(|c| c.uuid == uuid))
            .ok_or(TransportError::CharacteristicNotFound(uuid))?;
        Ok(CharacteristicRef {
            service: found.service_uuid,
            uuid,
        })
    }

    async fn read(&self, characteristic: &CharacteristicRef) -> Result<u8, TransportError> {
        let c = self.lookup(characteristic)?;
        let value = self.peripheral.read(&c).await?;
        value
            .first()
            .copied()
            .ok_or(TransportError::EmptyRead(characteristic.uuid))
    }

    async fn write(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let c = self.lookup(characteristic)?;
        self.peripheral
            .write(&c, payload, WriteType::WithResponse)
            .await?;
        Ok(())
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<Subscription, TransportError> {
        let c = self.lookup(characteristic)?;
        let mut notifications = self.peripheral.notifications().await?;
        self.peripheral.subscribe(&c).await?;

        let token = self.cancel.child_token();
        let task_token = token.clone();
        let events = self.events.clone();
        let identity = self.identity.clone();
        let session = self.session;
        let uuid = c.uuid;

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    notification = notifications.next() => match notification {
                        Some(n) if n.uuid == uuid => {
                            let sent = events.send(TransportEvent {
                                session,
                                identity: identity.clone(),
                                kind: TransportEventKind::Notification {
                                    characteristic: uuid,
                                    value: n.value,
                                },
                            });
                            if sent.is_err() {
                                break;
                            }
                        }
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            debug!("Notification forwarder for {} on {} stopped", uuid, identity);
        });

        Ok(Subscription::new(token))
    }

    async fn disconnect(&self) {
        self.cancel.cancel();
        if let Err(e) = self.peripheral.disconnect().await {
            warn!("Disconnect from {} failed: {}", self.identity, e);
        }
    }
}
