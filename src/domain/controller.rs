//! Session Controller
//!
//! Orchestrates every user-facing operation: pairing, connecting, sending
//! commands (or queuing them while a device is away), sessions, telemetry
//! reactions and the inactivity timeout.
//!
//! All state lives in [`AppState`], owned by the controller and mutated from a
//! single task. Transport callbacks reach it as events on a channel, so no
//! two handlers ever interleave.

use crate::domain::models::{
    AppEvent, CommandKind, ConnectionState, DeviceRecord, PowerSource, RawValue, SessionInputs,
    APP_VERSION, MAX_DEVICES,
};
use crate::domain::queue::{CommandQueue, QueueFull};
use crate::domain::registry::DeviceRegistry;
use crate::domain::scheduler::{Clock, Scheduler, TimerKey};
use crate::domain::stats::{Preset, UsageStats};
use crate::domain::telemetry::{self, TelemetryEvent};
use crate::domain::validator;
use crate::infrastructure::bluetooth::connection::LinkEvent;
use crate::infrastructure::bluetooth::protocol::{
    command_payload, duration_payload, intensity_payload, BleProfile, CharacteristicRole,
    CMD_START, CMD_STOP,
};
use crate::infrastructure::bluetooth::transport::{
    DiscoveredDevice, EventReceiver, Transport, TransportError, TransportEvent,
};
use crate::infrastructure::bluetooth::ConnectionManager;
use crate::infrastructure::logging::REPORT_TARGET;
use crate::infrastructure::notifier::Notifier;
use crate::infrastructure::storage::{
    Storage, StorageError, KEY_APP_VERSION, KEY_COMMAND_QUEUE, KEY_FIRST_RUN,
};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("No device slot {0}")]
    InvalidSlot(usize),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    QueueFull(#[from] QueueFull),
}

/// How a command left the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Sent,
    Queued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkOutcome {
    Connected,
    /// The user dismissed the device chooser.
    Cancelled,
}

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub profile: BleProfile,
    pub inactivity_timeout: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            profile: BleProfile::default(),
            inactivity_timeout: Duration::from_secs(300),
        }
    }
}

/// Everything the controller mutates.
#[derive(Debug)]
pub struct AppState {
    pub registry: DeviceRegistry,
    pub queue: CommandQueue,
    pub inputs: Vec<SessionInputs>,
    pub scheduler: Scheduler,
}

impl AppState {
    fn load(storage: &dyn Storage) -> Self {
        let inputs = (0..MAX_DEVICES)
            .map(|slot| {
                let mut inputs = SessionInputs::default();
                if let Some(preset) = Preset::load(storage, slot) {
                    preset.apply_to(&mut inputs);
                }
                inputs
            })
            .collect();

        Self {
            registry: DeviceRegistry::load(storage),
            queue: CommandQueue::from_value(storage.get(KEY_COMMAND_QUEUE)),
            inputs,
            scheduler: Scheduler::new(),
        }
    }
}

pub struct Controller {
    state: AppState,
    connections: ConnectionManager,
    transport_events: EventReceiver,
    storage: Box<dyn Storage>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    updates: mpsc::UnboundedSender<AppEvent>,
    inactivity_timeout_ms: u64,
}

impl Controller {
    pub fn new(
        transport: Box<dyn Transport>,
        storage: Box<dyn Storage>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        updates: mpsc::UnboundedSender<AppEvent>,
        config: ControllerConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let state = AppState::load(storage.as_ref());

        info!(
            "Loaded {} paired devices, {} queued commands",
            state.registry.records().iter().filter(|r| r.paired).count(),
            state.queue.len()
        );

        Self {
            state,
            connections: ConnectionManager::new(transport, config.profile, events_tx),
            transport_events: events_rx,
            storage,
            notifier,
            clock,
            updates,
            inactivity_timeout_ms: u64::try_from(config.inactivity_timeout.as_millis())
                .unwrap_or(u64::MAX),
        }
    }

    /// Startup bookkeeping: record the version, greet first-time users and arm
    /// the inactivity timer.
    pub fn start(&mut self) {
        if let Err(e) = self.storage.set(KEY_APP_VERSION, json!(APP_VERSION)) {
            self.storage_failed(&e);
        }

        if self.storage.get(KEY_FIRST_RUN).is_none() {
            self.alert("Welcome", "Connect devices to begin");
            if let Err(e) = self.storage.set(KEY_FIRST_RUN, json!("completed")) {
                self.storage_failed(&e);
            }
        }

        self.record_activity();
    }

    pub fn records(&self) -> &[DeviceRecord] {
        self.state.registry.records()
    }

    pub fn device(&self, slot: usize) -> Option<&DeviceRecord> {
        self.state.registry.get(slot)
    }

    pub fn connection_state(&self, slot: usize) -> Option<ConnectionState> {
        let record = self.state.registry.get(slot)?;
        let state = if self.connections.is_connecting(slot) {
            ConnectionState::Connecting
        } else if self.connections.is_connected(&record.id) {
            ConnectionState::Connected
        } else if record.paired {
            ConnectionState::Disconnected
        } else {
            ConnectionState::Unpaired
        };
        Some(state)
    }

    pub fn queue_len(&self) -> usize {
        self.state.queue.len()
    }

    pub fn queued_for(&self, slot: usize) -> usize {
        self.state.queue.for_slot(slot).count()
    }

    pub fn live_connections(&self) -> usize {
        self.connections.live_count()
    }

    pub fn inputs(&self, slot: usize) -> Option<&SessionInputs> {
        self.state.inputs.get(slot)
    }

    pub fn stats(&self, slot: usize) -> UsageStats {
        UsageStats::load(self.storage.as_ref(), slot)
    }

    /// Whole seconds left on the slot's session, if one is running.
    pub fn countdown_secs(&self, slot: usize) -> Option<u64> {
        self.state
            .scheduler
            .remaining_ms(TimerKey::Countdown(slot), self.clock.now_ms())
            .map(|ms| ms.div_ceil(1000))
    }

    // ---- activity and timers ------------------------------------------------

    /// Push the inactivity deadline out by the full timeout.
    pub fn record_activity(&mut self) {
        let at = self.clock.now_ms().saturating_add(self.inactivity_timeout_ms);
        self.state.scheduler.schedule(TimerKey::Inactivity, at);
    }

    /// Fire every timer that is due.
    pub async fn tick(&mut self) {
        let now = self.clock.now_ms();
        for key in self.state.scheduler.take_due(now) {
            match key {
                TimerKey::Inactivity => {
                    let closed = self.disconnect_all().await;
                    info!("Inactivity timeout, closed {} connections", closed);
                    self.alert("Auto-Disconnected", "Inactivity timeout");
                }
                TimerKey::Countdown(slot) => {
                    debug!("Session countdown finished on slot {}", slot);
                    self.emit(slot);
                }
            }
        }
    }

    // ---- transport events ---------------------------------------------------

    /// Wait for the next transport event. Never resolves to `None` while the
    /// controller is alive.
    pub async fn next_transport_event(&mut self) -> Option<TransportEvent> {
        self.transport_events.recv().await
    }

    /// Handle everything already queued on the transport channel.
    pub async fn process_pending_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.transport_events.try_recv() {
            self.handle_transport_event(event).await;
            handled += 1;
        }
        handled
    }

    pub async fn handle_transport_event(&mut self, event: TransportEvent) {
        match self.connections.accept(event) {
            Some(LinkEvent::Lost { identity }) => self.on_link_lost(&identity),
            Some(LinkEvent::Telemetry { identity, event }) => {
                if let Some(slot) = self.state.registry.slot_of(&identity) {
                    self.apply_telemetry(slot, event, false).await;
                }
            }
            None => {}
        }
    }

    fn on_link_lost(&mut self, identity: &str) {
        let Some(slot) = self.state.registry.slot_of(identity) else {
            return;
        };
        warn!("Lost connection to {} (slot {})", identity, slot);
        self.state.scheduler.cancel(TimerKey::Countdown(slot));
        self.persist();
        let name = self.name_of(slot);
        self.alert("Disconnected", &format!("{} disconnected", name));
        self.emit(slot);
    }

    async fn apply_telemetry(&mut self, slot: usize, event: TelemetryEvent, seeded: bool) {
        let Some(record) = self.state.registry.get_mut(slot) else {
            return;
        };
        let outcome = if seeded {
            telemetry::seed(record, event)
        } else {
            telemetry::apply(record, event)
        };

        self.persist();
        for alert in &outcome.alerts {
            self.alert(&alert.title, &alert.body);
        }
        self.emit(slot);

        if outcome.emergency_stop {
            warn!("Battery exhausted on slot {}, stopping", slot);
            let _ = self.stop_slot(slot).await;
        }
    }

    // ---- pairing and connection ---------------------------------------------

    /// Let the user choose a new device for `slot` and connect to it.
    pub async fn pair(&mut self, slot: usize) -> Result<LinkOutcome, ControlError> {
        self.check_slot(slot)?;
        self.record_activity();
        let exclude = self.state.registry.paired_identities_except(slot);

        self.set_connecting(slot, true);
        let device = match self.connections.discover(&exclude).await {
            Ok(device) => device,
            Err(e) => return self.link_failed(slot, "Pairing Failed", e),
        };

        match self.link(slot, &device).await {
            Ok(()) => {
                let name = self.name_of(slot);
                self.alert("Device Paired", &format!("{} paired", name));
                Ok(LinkOutcome::Connected)
            }
            Err(e) => self.link_failed(slot, "Pairing Failed", e),
        }
    }

    /// Connect `slot`, either to a device the caller already holds or by
    /// finding the slot's paired device again (or a new one when unpaired).
    pub async fn connect(
        &mut self,
        slot: usize,
        device: Option<DiscoveredDevice>,
    ) -> Result<LinkOutcome, ControlError> {
        let record = self
            .state
            .registry
            .get(slot)
            .cloned()
            .ok_or(ControlError::InvalidSlot(slot))?;
        self.record_activity();

        self.set_connecting(slot, true);
        let device = match device {
            Some(device) => device,
            None => {
                let lookup = if record.paired {
                    self.connections.reacquire(&record.id).await
                } else {
                    let exclude = self.state.registry.paired_identities_except(slot);
                    self.connections.discover(&exclude).await
                };
                match lookup {
                    Ok(device) => device,
                    Err(e) => return self.link_failed(slot, "Connection Failed", e),
                }
            }
        };

        match self.link(slot, &device).await {
            Ok(()) => Ok(LinkOutcome::Connected),
            Err(e) => self.link_failed(slot, "Connection Failed", e),
        }
    }

    /// Open the session, adopt it into the registry, start telemetry and
    /// replay anything queued for the device.
    async fn link(&mut self, slot: usize, device: &DiscoveredDevice) -> Result<(), TransportError> {
        let established = self.connections.establish(device).await;
        self.connections.set_connecting(slot, false);
        established?;

        let previous = self.state.registry.identity(slot).map(str::to_string);
        if let Some(old) = previous.filter(|old| *old != device.identity) {
            if self.connections.close(&old).await {
                info!("Slot {} moved from {} to {}", slot, old, device.identity);
            }
        }

        let now = self.clock.now_ms();
        self.state
            .registry
            .adopt_connection(slot, &device.identity, device.name.as_deref(), now);

        if let Err(e) = self.connections.subscribe_telemetry(&device.identity).await {
            warn!("Telemetry subscription failed for {}: {}", device.identity, e);
            self.report("Telemetry subscription", &e);
        }
        self.seed_telemetry(slot, &device.identity).await;

        self.persist();
        let name = self.name_of(slot);
        self.alert("Connected", &format!("Connected to {}", name));
        self.emit(slot);

        self.drain(&device.identity).await;
        Ok(())
    }

    async fn seed_telemetry(&mut self, slot: usize, identity: &str) {
        match self
            .connections
            .read(identity, CharacteristicRole::PowerSource)
            .await
        {
            Ok(code) => {
                let source = PowerSource::from_wire(code);
                self.apply_telemetry(slot, TelemetryEvent::PowerSource(source), true)
                    .await;
            }
            Err(e) => warn!("Could not read power source from {}: {}", identity, e),
        }

        match self
            .connections
            .read(identity, CharacteristicRole::BatteryLevel)
            .await
        {
            Ok(level) => {
                self.apply_telemetry(slot, TelemetryEvent::Battery(level), true)
                    .await
            }
            Err(e) => warn!("Could not read battery level from {}: {}", identity, e),
        }
    }

    fn link_failed(
        &mut self,
        slot: usize,
        title: &str,
        err: TransportError,
    ) -> Result<LinkOutcome, ControlError> {
        self.set_connecting(slot, false);

        if err.is_cancelled() {
            info!("Device chooser dismissed for slot {}", slot);
            self.alert("Cancelled", "Device selection cancelled");
            return Ok(LinkOutcome::Cancelled);
        }

        self.report(title, &err);
        self.alert(title, &err.to_string());
        Err(err.into())
    }

    fn set_connecting(&mut self, slot: usize, connecting: bool) {
        self.connections.set_connecting(slot, connecting);
        self.emit(slot);
    }

    /// Close every live connection. Pairings are kept.
    pub async fn disconnect_all(&mut self) -> usize {
        let closed = self.connections.close_all().await;
        for identity in &closed {
            if let Some(slot) = self.state.registry.slot_of(identity) {
                self.state.scheduler.cancel(TimerKey::Countdown(slot));
                self.emit(slot);
            }
        }
        self.persist();
        closed.len()
    }

    // ---- slot editing -------------------------------------------------------

    /// Rename a slot. Blank names are rejected without change.
    pub fn rename(&mut self, slot: usize, name: &str) -> bool {
        if !self.state.registry.rename(slot, name) {
            return false;
        }
        self.persist();
        self.emit(slot);
        true
    }

    /// Close the slot's connection and reset it to an unpaired placeholder.
    pub async fn remove(&mut self, slot: usize) -> Result<(), ControlError> {
        let identity = self.identity_of(slot)?;
        self.record_activity();

        self.connections.close(&identity).await;
        self.state.scheduler.cancel(TimerKey::Countdown(slot));
        self.state.registry.reset(slot);
        self.persist();

        self.alert("Device Removed", "Device unpaired");
        self.emit(slot);
        Ok(())
    }

    pub fn set_intensity(&mut self, slot: usize, value: RawValue) -> Result<(), ControlError> {
        self.inputs_mut(slot)?.intensity = value;
        Ok(())
    }

    pub fn set_duration(&mut self, slot: usize, value: RawValue) -> Result<(), ControlError> {
        self.inputs_mut(slot)?.duration = value;
        Ok(())
    }

    /// Save the slot's current inputs (clamped) as its preset.
    pub fn save_preset(&mut self, slot: usize) -> Result<Preset, ControlError> {
        let preset = Preset::from_inputs(self.inputs_mut(slot)?);
        match preset.save(self.storage.as_mut(), slot) {
            Ok(()) => self.alert("Preset Saved", &format!("Preset {} saved", slot + 1)),
            Err(e) => self.storage_failed(&e),
        }
        Ok(preset)
    }

    fn inputs_mut(&mut self, slot: usize) -> Result<&mut SessionInputs, ControlError> {
        self.state
            .inputs
            .get_mut(slot)
            .ok_or(ControlError::InvalidSlot(slot))
    }

    // ---- commands and sessions ----------------------------------------------

    /// Send an intensity level now, or queue it while the device is away.
    pub async fn send_intensity(
        &mut self,
        slot: usize,
        value: RawValue,
    ) -> Result<Delivery, ControlError> {
        self.record_activity();
        let result = self.send(slot, CommandKind::Intensity, value).await;
        self.command_failed(&result);
        result
    }

    pub async fn send_duration(
        &mut self,
        slot: usize,
        value: RawValue,
    ) -> Result<Delivery, ControlError> {
        self.record_activity();
        let result = self.send(slot, CommandKind::Duration, value).await;
        self.command_failed(&result);
        result
    }

    pub async fn start_session(&mut self, slot: usize) -> Result<Delivery, ControlError> {
        self.record_activity();
        let result = self
            .send(slot, CommandKind::Start, RawValue::Number(i64::from(CMD_START)))
            .await;
        self.command_failed(&result);
        result
    }

    /// Send the slot's intensity, duration and start in that order. The first
    /// failure aborts the rest.
    pub async fn prepare_and_start(&mut self, slot: usize) -> Result<(), ControlError> {
        let inputs = self
            .state
            .inputs
            .get(slot)
            .cloned()
            .ok_or(ControlError::InvalidSlot(slot))?;
        self.record_activity();

        let steps = [
            (CommandKind::Intensity, inputs.intensity),
            (CommandKind::Duration, inputs.duration),
            (CommandKind::Start, RawValue::Number(i64::from(CMD_START))),
        ];
        for (kind, value) in steps {
            if let Err(e) = self.send(slot, kind, value).await {
                self.report("Session start", &e);
                self.alert("Session Failed", &format!("Error: {}", e));
                return Err(e);
            }
        }
        Ok(())
    }

    /// Stop a running session immediately. Returns false when the device is
    /// not connected; stop commands are never queued.
    pub async fn emergency_stop(&mut self, slot: usize) -> Result<bool, ControlError> {
        self.check_slot(slot)?;
        self.record_activity();
        self.stop_slot(slot).await
    }

    /// Write the stop command without touching the inactivity timer. Used
    /// directly when telemetry forces a stop.
    async fn stop_slot(&mut self, slot: usize) -> Result<bool, ControlError> {
        let identity = self.identity_of(slot)?;
        if !self.connections.is_connected(&identity) {
            return Ok(false);
        }

        if let Err(e) = self
            .connections
            .write(&identity, CharacteristicRole::Command, &command_payload(CMD_STOP))
            .await
        {
            self.report("Emergency stop", &e);
            self.alert("Error", &e.to_string());
            return Err(e.into());
        }

        self.state.scheduler.cancel(TimerKey::Countdown(slot));
        let name = self.name_of(slot);
        self.alert("EMERGENCY STOP", &format!("{} stopped", name));
        self.emit(slot);
        Ok(true)
    }

    /// Start every connected slot. One slot failing does not stop the others.
    pub async fn start_all(&mut self) -> Vec<(usize, Result<(), ControlError>)> {
        let mut results = Vec::new();
        for slot in self.connected_slots() {
            let result = self.prepare_and_start(slot).await;
            results.push((slot, result));
        }
        results
    }

    pub async fn stop_all(&mut self) -> Vec<(usize, Result<bool, ControlError>)> {
        let mut results = Vec::new();
        for slot in self.connected_slots() {
            let result = self.emergency_stop(slot).await;
            results.push((slot, result));
        }
        results
    }

    fn connected_slots(&self) -> Vec<usize> {
        self.state
            .registry
            .records()
            .iter()
            .filter(|r| self.connections.is_connected(&r.id))
            .map(|r| r.index)
            .collect()
    }

    /// Deliver now when the slot's device is live, otherwise queue.
    async fn send(
        &mut self,
        slot: usize,
        kind: CommandKind,
        value: RawValue,
    ) -> Result<Delivery, ControlError> {
        let identity = self.identity_of(slot)?;
        if !self.connections.is_connected(&identity) {
            self.enqueue(slot, kind, value)?;
            return Ok(Delivery::Queued);
        }
        self.deliver(slot, &identity, kind, &value).await?;
        Ok(Delivery::Sent)
    }

    fn enqueue(&mut self, slot: usize, kind: CommandKind, value: RawValue) -> Result<(), QueueFull> {
        let now = self.clock.now_ms();
        if let Err(full) = self.state.queue.enqueue(slot, kind, value, now) {
            warn!("Dropping {:?} for slot {}: {}", kind, slot, full);
            self.alert("Queue Full", "Too many pending commands");
            return Err(full);
        }
        debug!("Queued {:?} for slot {} ({} pending)", kind, slot, self.state.queue.len());
        self.persist();
        self.alert("Command Queued", "Will execute when connected");
        self.emit(slot);
        Ok(())
    }

    /// Validate and write one command.
    async fn deliver(
        &mut self,
        slot: usize,
        identity: &str,
        kind: CommandKind,
        value: &RawValue,
    ) -> Result<(), TransportError> {
        match kind {
            CommandKind::Intensity => {
                let level = validator::intensity(value);
                self.connections
                    .write(identity, CharacteristicRole::Intensity, &intensity_payload(level))
                    .await
            }
            CommandKind::Duration => {
                let secs = validator::duration_secs(value);
                self.connections
                    .write(identity, CharacteristicRole::Duration, &duration_payload(secs))
                    .await
            }
            CommandKind::Start => {
                self.connections
                    .write(identity, CharacteristicRole::Command, &command_payload(CMD_START))
                    .await?;
                self.on_session_started(slot);
                Ok(())
            }
        }
    }

    fn on_session_started(&mut self, slot: usize) {
        let duration = self
            .state
            .inputs
            .get(slot)
            .map(|inputs| validator::duration_secs(&inputs.duration))
            .unwrap_or(0);

        if let Err(e) = UsageStats::record_session(self.storage.as_mut(), slot, u64::from(duration)) {
            self.storage_failed(&e);
        }
        if duration > 0 {
            let at = self
                .clock
                .now_ms()
                .saturating_add(u64::from(duration).saturating_mul(1000));
            self.state.scheduler.schedule(TimerKey::Countdown(slot), at);
        }

        let name = self.name_of(slot);
        info!("Session started on slot {} for {}s", slot, duration);
        self.alert("Session Started", &format!("{} activated", name));
        self.emit(slot);
    }

    fn command_failed(&self, result: &Result<Delivery, ControlError>) {
        match result {
            Err(ControlError::Transport(e)) => {
                self.report("Command", e);
                self.alert("Error", &e.to_string());
            }
            Err(ControlError::InvalidSlot(slot)) => warn!("Command for unknown slot {}", slot),
            // Already alerted when the queue refused it.
            Err(ControlError::QueueFull(_)) | Ok(_) => {}
        }
    }

    /// Replay commands queued for `identity`, in order, then drop them.
    ///
    /// Each entry is re-validated on delivery. Failures are logged and the
    /// replay moves on; failed entries are not re-queued.
    pub async fn drain(&mut self, identity: &str) -> usize {
        let pending = self.state.queue.pending_for(identity, &self.state.registry);
        if pending.is_empty() {
            return 0;
        }
        info!("Replaying {} queued commands for {}", pending.len(), identity);

        let mut delivered = 0;
        for command in &pending {
            let Some(current) = self.state.registry.identity(command.slot).map(str::to_string)
            else {
                continue;
            };
            match self
                .deliver(command.slot, &current, command.kind, &command.value)
                .await
            {
                Ok(()) => delivered += 1,
                Err(e) => {
                    warn!(
                        "Queued {:?} for slot {} failed: {}",
                        command.kind, command.slot, e
                    );
                    self.report("Queued command", &e);
                }
            }
        }

        let purged = self.state.queue.purge_for(identity, &self.state.registry);
        debug!("Purged {} queued commands for {}", purged, identity);
        self.persist();
        delivered
    }

    // ---- helpers ------------------------------------------------------------

    fn check_slot(&self, slot: usize) -> Result<(), ControlError> {
        if slot < MAX_DEVICES {
            Ok(())
        } else {
            Err(ControlError::InvalidSlot(slot))
        }
    }

    fn identity_of(&self, slot: usize) -> Result<String, ControlError> {
        self.state
            .registry
            .identity(slot)
            .map(str::to_string)
            .ok_or(ControlError::InvalidSlot(slot))
    }

    fn name_of(&self, slot: usize) -> String {
        self.state
            .registry
            .get(slot)
            .map(|r| r.name.clone())
            .unwrap_or_default()
    }

    /// Recompute connected flags and save registry and queue together.
    fn persist(&mut self) {
        let connections = &self.connections;
        self.state
            .registry
            .sync_connected(|identity| connections.is_connected(identity));

        if let Err(e) = self
            .state
            .registry
            .save(&self.state.queue, self.storage.as_mut())
        {
            self.storage_failed(&e);
        }
    }

    fn storage_failed(&self, err: &StorageError) {
        warn!("Storage write failed: {}", err);
        self.report("Storage write", err);
        self.alert("Storage Error", "Changes could not be saved");
    }

    fn alert(&self, title: &str, body: &str) {
        self.notifier.notify(title, body);
    }

    fn report(&self, context: &str, err: &dyn fmt::Display) {
        error!(target: REPORT_TARGET, "{} failed: {}", context, err);
    }

    fn emit(&self, slot: usize) {
        let _ = self.updates.send(AppEvent::DeviceChanged(slot));
    }
}
