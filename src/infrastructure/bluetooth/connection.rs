//! Connection Manager
//!
//! Owns every live session, keyed by device identity. Registry bookkeeping
//! stays with the controller; this module only opens, tracks and closes
//! transport sessions and translates their events.

use crate::domain::models::PowerSource;
use crate::domain::telemetry::TelemetryEvent;
use crate::infrastructure::bluetooth::protocol::{BleProfile, CharacteristicRole};
use crate::infrastructure::bluetooth::transport::{
    CharacteristicRef, DiscoveredDevice, EventSender, GattSession, SessionId, Subscription,
    Transport, TransportError, TransportEvent, TransportEventKind,
};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// The characteristics a session must expose to be usable.
#[derive(Debug, Clone, Copy)]
pub struct Characteristics {
    pub intensity: CharacteristicRef,
    pub duration: CharacteristicRef,
    pub command: CharacteristicRef,
    pub battery_level: CharacteristicRef,
    pub power_source: CharacteristicRef,
}

impl Characteristics {
    pub fn get(&self, role: CharacteristicRole) -> &CharacteristicRef {
        match role {
            CharacteristicRole::Intensity => &self.intensity,
            CharacteristicRole::Duration => &self.duration,
            CharacteristicRole::Command => &self.command,
            CharacteristicRole::BatteryLevel => &self.battery_level,
            CharacteristicRole::PowerSource => &self.power_source,
        }
    }
}

/// One live connection.
pub struct ConnectionHandle {
    pub session_id: SessionId,
    session: Box<dyn GattSession>,
    characteristics: Characteristics,
    subscriptions: Vec<Subscription>,
}

impl ConnectionHandle {
    pub fn subscriptions(&self) -> &[Subscription] {
        &self.subscriptions
    }
}

/// What a transport event means once matched against live sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Lost { identity: String },
    Telemetry { identity: String, event: TelemetryEvent },
}

pub struct ConnectionManager {
    transport: Box<dyn Transport>,
    profile: BleProfile,
    events: EventSender,
    connections: HashMap<String, ConnectionHandle>,
    connecting: HashSet<usize>,
    next_session: u64,
}

impl ConnectionManager {
    pub fn new(transport: Box<dyn Transport>, profile: BleProfile, events: EventSender) -> Self {
        Self {
            transport,
            profile,
            events,
            connections: HashMap::new(),
            connecting: HashSet::new(),
            next_session: 0,
        }
    }

    pub fn is_connected(&self, identity: &str) -> bool {
        self.connections.contains_key(identity)
    }

    pub fn is_connecting(&self, slot: usize) -> bool {
        self.connecting.contains(&slot)
    }

    pub fn set_connecting(&mut self, slot: usize, connecting: bool) {
        if connecting {
            self.connecting.insert(slot);
        } else {
            self.connecting.remove(&slot);
        }
    }

    pub fn live_count(&self) -> usize {
        self.connections.len()
    }

    pub fn handle(&self, identity: &str) -> Option<&ConnectionHandle> {
        self.connections.get(identity)
    }

    /// Run device discovery filtered to the profile's service.
    pub async fn discover(&self, exclude: &[String]) -> Result<DiscoveredDevice, TransportError> {
        self.transport
            .request_device(self.profile.service, exclude)
            .await
    }

    pub async fn reacquire(&self, identity: &str) -> Result<DiscoveredDevice, TransportError> {
        self.transport.device_by_identity(identity).await
    }

    /// Open a session and resolve every required characteristic.
    ///
    /// A missing characteristic fails the whole attempt and closes the
    /// session. An existing connection to the same device is replaced.
    pub async fn establish(&mut self, device: &DiscoveredDevice) -> Result<(), TransportError> {
        self.next_session += 1;
        let session_id = SessionId(self.next_session);

        info!("Connecting to {} (session {})", device.identity, session_id.0);
        let session = self
            .transport
            .connect(device, session_id, self.events.clone())
            .await?;

        let characteristics = match self.resolve(session.as_ref()).await {
            Ok(characteristics) => characteristics,
            Err(e) => {
                warn!("Characteristic discovery failed for {}: {}", device.identity, e);
                session.disconnect().await;
                return Err(e);
            }
        };

        if let Some(old) = self.connections.remove(&device.identity) {
            debug!("Replacing session {} for {}", old.session_id.0, device.identity);
            old.session.disconnect().await;
        }

        self.connections.insert(
            device.identity.clone(),
            ConnectionHandle {
                session_id,
                session,
                characteristics,
                subscriptions: Vec::new(),
            },
        );
        info!("Connected to {}", device.identity);
        Ok(())
    }

    async fn resolve(&self, session: &dyn GattSession) -> Result<Characteristics, TransportError> {
        let profile = self.profile;
        let lookup =
            move |role: CharacteristicRole| session.characteristic(profile.service, profile.uuid_for(role));

        Ok(Characteristics {
            intensity: lookup(CharacteristicRole::Intensity).await?,
            duration: lookup(CharacteristicRole::Duration).await?,
            command: lookup(CharacteristicRole::Command).await?,
            battery_level: lookup(CharacteristicRole::BatteryLevel).await?,
            power_source: lookup(CharacteristicRole::PowerSource).await?,
        })
    }

    /// Subscribe to power-source and battery changes.
    pub async fn subscribe_telemetry(&mut self, identity: &str) -> Result<(), TransportError> {
        let handle = self
            .connections
            .get_mut(identity)
            .ok_or_else(|| TransportError::NotConnected(identity.to_string()))?;

        for role in [CharacteristicRole::PowerSource, CharacteristicRole::BatteryLevel] {
            let characteristic = *handle.characteristics.get(role);
            let subscription = handle.session.subscribe(&characteristic).await?;
            debug!("Subscribed to {} on {}", role.label(), identity);
            handle.subscriptions.push(subscription);
        }
        Ok(())
    }

    pub async fn read(&self, identity: &str, role: CharacteristicRole) -> Result<u8, TransportError> {
        let handle = self
            .connections
            .get(identity)
            .ok_or_else(|| TransportError::NotConnected(identity.to_string()))?;
        handle.session.read(handle.characteristics.get(role)).await
    }

    pub async fn write(
        &self,
        identity: &str,
        role: CharacteristicRole,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        let handle = self
            .connections
            .get(identity)
            .ok_or_else(|| TransportError::NotConnected(identity.to_string()))?;
        debug!("Write {} {:?} to {}", role.label(), payload, identity);
        handle
            .session
            .write(handle.characteristics.get(role), payload)
            .await
    }

    /// Close one session. Returns false if none was live.
    pub async fn close(&mut self, identity: &str) -> bool {
        match self.connections.remove(identity) {
            Some(handle) => {
                info!("Closing connection to {}", identity);
                handle.session.disconnect().await;
                true
            }
            None => false,
        }
    }

    /// Close every session, returning the identities that were live.
    pub async fn close_all(&mut self) -> Vec<String> {
        let identities: Vec<String> = self.connections.keys().cloned().collect();
        for identity in &identities {
            self.close(identity).await;
        }
        identities
    }

    /// Match a transport event against live sessions.
    ///
    /// Link loss removes the handle. Events from sessions that are no longer
    /// current, and notifications from unknown characteristics, yield `None`.
    pub fn accept(&mut self, event: TransportEvent) -> Option<LinkEvent> {
        let current = self.connections.get(&event.identity)?;
        if current.session_id != event.session {
            debug!(
                "Ignoring event from stale session {} for {}",
                event.session.0, event.identity
            );
            return None;
        }

        match event.kind {
            TransportEventKind::Disconnected => {
                self.connections.remove(&event.identity);
                Some(LinkEvent::Lost {
                    identity: event.identity,
                })
            }
            TransportEventKind::Notification {
                characteristic,
                value,
            } => {
                let byte = *value.first()?;
                let event_kind = if characteristic == self.profile.battery_level {
                    TelemetryEvent::Battery(byte)
                } else if characteristic == self.profile.power_source {
                    TelemetryEvent::PowerSource(PowerSource::from_wire(byte))
                } else {
                    return None;
                };
                Some(LinkEvent::Telemetry {
                    identity: event.identity,
                    event: event_kind,
                })
            }
        }
    }
}
