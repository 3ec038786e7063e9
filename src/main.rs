mod bridge;
mod domain;
mod error;
mod infrastructure;

use crate::bridge::Bridge;
use crate::domain::settings::{BridgeConfig, Settings, SettingsService};
use crate::infrastructure::bluetooth::PlatformCentral;
use crate::infrastructure::host::{IpcHost, IpcHostConfig};
use crate::infrastructure::logging;
use crate::infrastructure::shutdown::ShutdownSignal;
use anyhow::Context;
use tracing::{error, info, warn};

fn main() -> anyhow::Result<()> {
    let settings_service = SettingsService::new()?;
    let _logging_guard = logging::init_logger(&settings_service.get().log_settings)?;

    info!("Starting Picomni Rover bridge");

    if !settings_service.path().exists() {
        match settings_service.save() {
            Ok(()) => info!("Wrote default settings to {}", settings_service.path().display()),
            Err(e) => warn!("Could not write default settings: {}", e),
        }
    }

    let settings = settings_service.get().clone();
    let config = settings.bridge_config()?;

    // Both loops share one thread; neither needs parallelism
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to create tokio runtime")?;

    rt.block_on(run(settings, config)).inspect_err(|e| error!("Bridge failed: {:#}", e))
}

async fn run(settings: Settings, config: BridgeConfig) -> anyhow::Result<()> {
    let host = IpcHost::bind(IpcHostConfig::from(&settings))
        .context("Failed to open host socket")?;
    let central = PlatformCentral::new()
        .await
        .context("Failed to open Bluetooth adapter")?;

    let shutdown = ShutdownSignal::new();
    let ctrl_c = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, shutting down");
            ctrl_c.trigger();
        }
    });

    let bridge = Bridge::new(central, host, &config);
    let mut states = bridge.session_state();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            info!("Session state: {:?}", state);
        }
    });

    bridge.run(shutdown).await?;
    Ok(())
}
