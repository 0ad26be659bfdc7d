//! # bentechd — bentech hub daemon
//!
//! Composition root that wires the hub to a radio backend and runs it.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Initialise `tracing` from the configured filter
//! - Select the radio backend: the in-process virtual fleet, or the host
//!   Bluetooth adapter through `btleplug`
//! - Construct the hub, injecting the radio and collaborators via port traits
//! - Run the hub loops until SIGINT, then disconnect every peripheral
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no protocol logic belongs here.

mod config;

use std::time::Duration;

use tracing_subscriber::EnvFilter;

use bentech_adapter_btleplug::BtleplugCentral;
use bentech_adapter_virtual::{
    CompanionClient, LogReporter, VirtualAir, VirtualCentral, VirtualPeripheral, VirtualWifi,
    spawn_fleet,
};
use bentech_app::hub::Hub;
use bentech_app::ports::{CentralLink, OccupancySensor, PeripheralLink, UsageReporter, WifiNetwork};
use bentech_domain::session::WifiCredentials;

use config::{Backend, Config};

/// Delay before the scripted companion looks for the hub.
const COMPANION_DELAY: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();
    tracing::info!(backend = ?config.transport.backend, "bentechd starting");

    match config.transport.backend {
        Backend::Virtual => run_virtual(&config).await,
        Backend::Btleplug => run_btleplug(&config).await,
    }
}

async fn run_virtual(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let air = VirtualAir::new();
    let _fleet = spawn_fleet(&air, &config.fleet_config());

    let hub = Hub::new(
        air.central(),
        VirtualWifi::new(config.wifi_network()),
        LogReporter::default(),
        config.hub_config(),
    );

    if config.simulation.provision {
        tokio::spawn(provision(
            air.central(),
            config.wifi_network(),
            config.hub_config().scan_window,
        ));
    }

    serve(&hub, Some(air.peripheral()), config.visit_schedule()).await;
    Ok(())
}

async fn run_btleplug(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let central = BtleplugCentral::new(config.transport.btleplug.clone()).await?;

    // The host stack offers no peripheral role: the companion application
    // loop stays off and collaborators are simulated.
    let hub = Hub::new(
        central,
        VirtualWifi::default(),
        LogReporter::default(),
        config.hub_config(),
    );
    serve(&hub, None::<VirtualPeripheral>, config.visit_schedule()).await;
    Ok(())
}

async fn serve<C, W, R, P, S>(hub: &Hub<C, W, R>, peripheral: Option<P>, sensor: S)
where
    C: CentralLink,
    W: WifiNetwork,
    R: UsageReporter,
    P: PeripheralLink,
    S: OccupancySensor,
{
    tokio::select! {
        () = hub.run(peripheral, sensor) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                tracing::error!(%err, "unable to listen for shutdown signal");
            }
            tracing::info!("shutdown requested");
        }
    }
    hub.shutdown().await;
    tracing::info!("bentechd stopped");
}

/// Scripted companion session: provision Wi-Fi, register a subscription and
/// read back the hub status.
async fn provision(central: VirtualCentral, credentials: WifiCredentials, scan_window: Duration) {
    tokio::time::sleep(COMPANION_DELAY).await;

    let mut companion = match CompanionClient::connect(&central, scan_window).await {
        Ok(companion) => companion,
        Err(err) => {
            tracing::warn!(%err, "companion could not reach the hub");
            return;
        }
    };

    match companion.provision_wifi(&credentials).await {
        Ok(status) => tracing::info!(status = status.0, "companion provisioned wifi"),
        Err(err) => tracing::warn!(%err, "wifi provisioning failed"),
    }
    let subscription = serde_json::json!({ "endpoint": "https://push.bentech.invalid/demo" });
    if let Err(err) = companion.set_subscription(&subscription).await {
        tracing::warn!(%err, "subscription not registered");
    }
    match companion.request_info().await {
        Ok(info) => tracing::info!(
            wifi = info.wifi_connected,
            devices = ?info.connected_devices,
            "companion read hub info",
        ),
        Err(err) => tracing::warn!(%err, "hub info unavailable"),
    }
    if let Err(err) = companion.disconnect().await {
        tracing::debug!(%err, "companion disconnect failed");
    }
}
