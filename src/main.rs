use fog_control::domain::models::APP_VERSION;
use fog_control::domain::settings::SettingsService;
use fog_control::infrastructure::logging;
use fog_control::presentation::app;
use tracing::{info, warn};

fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;

    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting FogSmartControl {}", APP_VERSION);

    // Write back so newly added fields show up with their defaults
    if let Err(e) = settings_service.save() {
        warn!("Failed to save settings: {}", e);
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(app::run(settings_service.get().clone()))
}
