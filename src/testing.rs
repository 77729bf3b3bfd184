//! In-memory collaborators for controller tests.

use crate::domain::models::Alert;
use crate::infrastructure::bluetooth::protocol::BleProfile;
use crate::infrastructure::bluetooth::transport::{
    CharacteristicRef, DiscoveredDevice, EventSender, GattSession, SessionId, Subscription,
    Transport, TransportError, TransportEvent, TransportEventKind,
};
use crate::infrastructure::notifier::Notifier;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const SERVICE: Uuid = Uuid::from_u128(0x0000ffff_0000_1000_8000_00805f9b34fb);
pub const INTENSITY: Uuid = Uuid::from_u128(0x0000ff01_0000_1000_8000_00805f9b34fb);
pub const DURATION: Uuid = Uuid::from_u128(0x0000ff02_0000_1000_8000_00805f9b34fb);
pub const COMMAND: Uuid = Uuid::from_u128(0x0000ff03_0000_1000_8000_00805f9b34fb);
pub const BATTERY: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
pub const POWER: Uuid = Uuid::from_u128(0x0000ff04_0000_1000_8000_00805f9b34fb);

/// Profile with a distinct UUID per role so writes can be told apart.
pub fn test_profile() -> BleProfile {
    BleProfile {
        service: SERVICE,
        intensity: INTENSITY,
        duration: DURATION,
        command: COMMAND,
        battery_level: BATTERY,
        power_source: POWER,
    }
}

pub fn device(identity: &str, name: &str) -> DiscoveredDevice {
    DiscoveredDevice {
        identity: identity.to_string(),
        name: Some(name.to_string()),
    }
}

#[derive(Default)]
struct FakeState {
    /// `None` means the user dismissed the chooser.
    choices: VecDeque<Option<DiscoveredDevice>>,
    known: HashMap<String, DiscoveredDevice>,
    missing: HashSet<Uuid>,
    reads: HashMap<(String, Uuid), u8>,
    writes: Vec<(String, Uuid, Vec<u8>)>,
    failing_writes: HashSet<String>,
    failing_characteristics: HashSet<Uuid>,
    disconnects: Vec<String>,
    sessions: HashMap<String, (SessionId, EventSender)>,
    subscriptions: Vec<(String, Uuid, CancellationToken)>,
}

/// Scripted transport. Clones share state, so a test keeps one handle while
/// the controller owns another.
#[derive(Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<FakeState>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    /// Next chooser returns `device`; it also becomes reachable by identity.
    pub fn offer(&self, device: DiscoveredDevice) {
        self.with(|s| {
            s.known.insert(device.identity.clone(), device.clone());
            s.choices.push_back(Some(device));
        });
    }

    pub fn cancel_next(&self) {
        self.with(|s| s.choices.push_back(None));
    }

    pub fn set_read(&self, identity: &str, uuid: Uuid, value: u8) {
        self.with(|s| {
            s.reads.insert((identity.to_string(), uuid), value);
        });
    }

    pub fn set_missing(&self, uuid: Uuid) {
        self.with(|s| {
            s.missing.insert(uuid);
        });
    }

    pub fn fail_writes_for(&self, identity: &str, failing: bool) {
        self.with(|s| {
            if failing {
                s.failing_writes.insert(identity.to_string());
            } else {
                s.failing_writes.remove(identity);
            }
        });
    }

    /// Writes to `uuid` fail on every device; other characteristics still work.
    pub fn fail_writes_to(&self, uuid: Uuid) {
        self.with(|s| {
            s.failing_characteristics.insert(uuid);
        });
    }

    pub fn writes(&self) -> Vec<(String, Uuid, Vec<u8>)> {
        self.with(|s| s.writes.clone())
    }

    pub fn writes_to(&self, identity: &str) -> Vec<(Uuid, Vec<u8>)> {
        self.with(|s| {
            s.writes
                .iter()
                .filter(|(id, _, _)| id == identity)
                .map(|(_, uuid, payload)| (*uuid, payload.clone()))
                .collect()
        })
    }

    pub fn clear_writes(&self) {
        self.with(|s| s.writes.clear());
    }

    pub fn disconnects(&self) -> Vec<String> {
        self.with(|s| s.disconnects.clone())
    }

    pub fn session_of(&self, identity: &str) -> Option<SessionId> {
        self.with(|s| s.sessions.get(identity).map(|(id, _)| *id))
    }

    pub fn subscription_tokens(&self, identity: &str) -> Vec<CancellationToken> {
        self.with(|s| {
            s.subscriptions
                .iter()
                .filter(|(id, _, _)| id == identity)
                .map(|(_, _, token)| token.clone())
                .collect()
        })
    }

    /// Deliver an event as if it came from `session`.
    pub fn emit(&self, identity: &str, session: SessionId, kind: TransportEventKind) {
        self.with(|s| {
            if let Some((_, sender)) = s.sessions.get(identity) {
                let _ = sender.send(TransportEvent {
                    session,
                    identity: identity.to_string(),
                    kind,
                });
            }
        });
    }

    /// Value change on the current session.
    pub fn notify(&self, identity: &str, characteristic: Uuid, value: u8) {
        if let Some(session) = self.session_of(identity) {
            self.emit(
                identity,
                session,
                TransportEventKind::Notification {
                    characteristic,
                    value: vec![value],
                },
            );
        }
    }

    /// Link loss on the current session.
    pub fn drop_link(&self, identity: &str) {
        if let Some(session) = self.session_of(identity) {
            self.emit(identity, session, TransportEventKind::Disconnected);
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn request_device(
        &self,
        _service: Uuid,
        exclude: &[String],
    ) -> Result<DiscoveredDevice, TransportError> {
        match self.with(|s| s.choices.pop_front()) {
            Some(Some(device)) if !exclude.contains(&device.identity) => Ok(device),
            Some(Some(_)) => Err(TransportError::NoDeviceFound),
            Some(None) => Err(TransportError::UserCancelled),
            None => Err(TransportError::NoDeviceFound),
        }
    }

    async fn device_by_identity(&self, identity: &str) -> Result<DiscoveredDevice, TransportError> {
        self.with(|s| s.known.get(identity).cloned())
            .ok_or_else(|| TransportError::DeviceNotFound(identity.to_string()))
    }

    async fn connect(
        &self,
        device: &DiscoveredDevice,
        session: SessionId,
        events: EventSender,
    ) -> Result<Box<dyn GattSession>, TransportError> {
        self.with(|s| {
            s.sessions
                .insert(device.identity.clone(), (session, events));
        });
        Ok(Box::new(FakeSession {
            identity: device.identity.clone(),
            transport: self.clone(),
        }))
    }
}

struct FakeSession {
    identity: String,
    transport: FakeTransport,
}

#[async_trait]
impl GattSession for FakeSession {
    async fn characteristic(
        &self,
        service: Uuid,
        uuid: Uuid,
    ) -> Result<CharacteristicRef, TransportError> {
        if self.transport.with(|s| s.missing.contains(&uuid)) {
            return Err(TransportError::CharacteristicNotFound(uuid));
        }
        Ok(CharacteristicRef { service, uuid })
    }

    async fn read(&self, characteristic: &CharacteristicRef) -> Result<u8, TransportError> {
        let key = (self.identity.clone(), characteristic.uuid);
        Ok(self
            .transport
            .with(|s| s.reads.get(&key).copied())
            .unwrap_or(100))
    }

    async fn write(
        &self,
        characteristic: &CharacteristicRef,
        payload: &[u8],
    ) -> Result<(), TransportError> {
        self.transport.with(|s| {
            if s.failing_writes.contains(&self.identity)
                || s.failing_characteristics.contains(&characteristic.uuid)
            {
                return Err(TransportError::Other("GATT write failed".to_string()));
            }
            s.writes
                .push((self.identity.clone(), characteristic.uuid, payload.to_vec()));
            Ok(())
        })
    }

    async fn subscribe(
        &self,
        characteristic: &CharacteristicRef,
    ) -> Result<Subscription, TransportError> {
        let token = CancellationToken::new();
        self.transport.with(|s| {
            s.subscriptions
                .push((self.identity.clone(), characteristic.uuid, token.clone()))
        });
        Ok(Subscription::new(token))
    }

    async fn disconnect(&self) {
        self.transport
            .with(|s| s.disconnects.push(self.identity.clone()));
    }
}

/// Notifier that remembers every alert.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn titles(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.title.clone())
            .collect()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.alerts.lock().unwrap().clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, title: &str, body: &str) {
        self.alerts.lock().unwrap().push(Alert::new(title, body));
    }
}
