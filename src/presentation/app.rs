use crate::domain::controller::{Controller, ControllerConfig, Delivery, LinkOutcome};
use crate::domain::models::{AppEvent, CommandKind, MAX_DEVICES};
use crate::domain::scheduler::SystemClock;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol::BleProfile;
use crate::infrastructure::bluetooth::BtleTransport;
use crate::infrastructure::notifier::{ChannelNotifier, Notifier};
use crate::infrastructure::storage::FileStorage;
use crate::presentation::console::{self, UiCommand, HELP};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

/// Build every collaborator and run the console until `quit` or end of input.
pub async fn run(settings: Settings) -> anyhow::Result<()> {
    let profile = BleProfile::from_settings(&settings)?;
    let transport = BtleTransport::new(
        profile.service,
        Duration::from_secs(settings.scan_duration_secs),
    )
    .await;
    let bluetooth_available = transport.is_available();

    let storage_path = match &settings.storage_path {
        Some(path) => PathBuf::from(path),
        None => FileStorage::default_path()?,
    };
    info!("Using storage at {}", storage_path.display());
    let storage = FileStorage::open(storage_path)?;

    let (updates_tx, mut updates_rx) = mpsc::unbounded_channel();
    let notifier: Arc<dyn Notifier> = Arc::new(ChannelNotifier::new(
        updates_tx.clone(),
        settings.notifications_enabled,
    ));

    let mut controller = Controller::new(
        Box::new(transport),
        Box::new(storage),
        notifier.clone(),
        Arc::new(SystemClock),
        updates_tx,
        ControllerConfig {
            profile,
            inactivity_timeout: Duration::from_secs(settings.inactivity_timeout_secs),
        },
    );

    if !bluetooth_available {
        notifier.notify("Bluetooth Not Supported", "No Bluetooth adapter was found");
    }
    controller.start();

    println!("{}", HELP);
    print_devices(&controller);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(Duration::from_secs(1));

    loop {
        tokio::select! {
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if !handle_line(&mut controller, &line).await {
                            break;
                        }
                    }
                    None => break,
                }
            }
            Some(event) = controller.next_transport_event() => {
                controller.handle_transport_event(event).await;
            }
            _ = ticker.tick() => {
                controller.tick().await;
            }
        }
        render_updates(&controller, &mut updates_rx);
    }

    let closed = controller.disconnect_all().await;
    info!("Shutting down, closed {} connections", closed);
    render_updates(&controller, &mut updates_rx);
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_line(controller: &mut Controller, line: &str) -> bool {
    let command = match UiCommand::parse(line) {
        Ok(Some(command)) => command,
        Ok(None) => return true,
        Err(e) => {
            println!("{}", e);
            return true;
        }
    };
    controller.record_activity();

    match command {
        UiCommand::Help => println!("{}", HELP),
        UiCommand::List => print_devices(controller),
        UiCommand::Pair(slot) => {
            println!("Searching for devices...");
            if let Ok(LinkOutcome::Connected) = controller.pair(slot).await {
                print_slot(controller, slot);
            }
        }
        UiCommand::Connect(slot) => {
            if let Ok(LinkOutcome::Connected) = controller.connect(slot, None).await {
                print_slot(controller, slot);
            }
        }
        UiCommand::Rename(slot, name) => {
            if !controller.rename(slot, &name) {
                println!("Name cannot be blank");
            }
        }
        UiCommand::SetIntensity(slot, value) => {
            if let Err(e) = controller.set_intensity(slot, value) {
                println!("{}", e);
            }
        }
        UiCommand::SetDuration(slot, value) => {
            if let Err(e) = controller.set_duration(slot, value) {
                println!("{}", e);
            }
        }
        UiCommand::Send(slot, kind, value) => {
            let result = match kind {
                CommandKind::Intensity => controller.send_intensity(slot, value).await,
                CommandKind::Duration => controller.send_duration(slot, value).await,
                CommandKind::Start => controller.start_session(slot).await,
            };
            if let Ok(Delivery::Sent) = result {
                println!("Sent {:?} to slot {}", kind, slot + 1);
            }
        }
        UiCommand::Start(slot) => {
            let _ = controller.prepare_and_start(slot).await;
        }
        UiCommand::Stop(slot) => match controller.emergency_stop(slot).await {
            Ok(false) => println!("Slot {} is not connected", slot + 1),
            Ok(true) => {}
            Err(e) => error!("Emergency stop on slot {} failed: {}", slot + 1, e),
        },
        UiCommand::Remove(slot) => {
            if let Err(e) = controller.remove(slot).await {
                println!("{}", e);
            }
        }
        UiCommand::SavePreset(slot) => {
            if let Err(e) = controller.save_preset(slot) {
                println!("{}", e);
            }
        }
        UiCommand::Stats(slot) => println!("{}", console::describe_stats(controller, slot)),
        UiCommand::StartAll => {
            let results = controller.start_all().await;
            if results.is_empty() {
                println!("No connected devices");
            }
            for (slot, result) in results {
                if let Err(e) = result {
                    println!("Slot {}: {}", slot + 1, e);
                }
            }
        }
        UiCommand::StopAll => {
            for (slot, result) in controller.stop_all().await {
                if let Err(e) = result {
                    println!("Slot {}: {}", slot + 1, e);
                }
            }
        }
        UiCommand::DisconnectAll => {
            let closed = controller.disconnect_all().await;
            println!("Closed {} connections", closed);
        }
        UiCommand::Quit => return false,
    }
    true
}

/// Print alerts as they come and one fresh line per changed slot.
fn render_updates(controller: &Controller, updates: &mut mpsc::UnboundedReceiver<AppEvent>) {
    let mut changed = BTreeSet::new();
    while let Ok(event) = updates.try_recv() {
        match event {
            AppEvent::Alert(alert) => println!("** {}: {}", alert.title, alert.body),
            AppEvent::DeviceChanged(slot) => {
                changed.insert(slot);
            }
        }
    }
    for slot in changed {
        print_slot(controller, slot);
    }
}

fn print_slot(controller: &Controller, slot: usize) {
    if let Some(line) = console::describe(controller, slot) {
        println!("{}", line);
    }
}

fn print_devices(controller: &Controller) {
    for slot in 0..MAX_DEVICES {
        print_slot(controller, slot);
    }
}
