//! # bentech-adapter-virtual
//!
//! In-process simulation of the whole installation, for tests and demos.
//!
//! ## Provided pieces
//!
//! | Piece | Port | Behaviour |
//! |-------|------|-----------|
//! | [`VirtualAir`] | `CentralLink` / `PeripheralLink` | Shared radio medium; advertise, scan, connect |
//! | [`LidFirmware`] | `CommandHandler` | Opens/closes after an actuation delay, notifies close completion |
//! | [`PaperFirmware`] | `CommandHandler` | Counts a fixed number of rolls per visit, notifies the count |
//! | [`FlusherFirmware`] / [`DeodorizerFirmware`] | `CommandHandler` | Count their cycles |
//! | [`VirtualWifi`] | `WifiNetwork` | One known network; rejects bad SSID or password |
//! | [`ManualOccupancy`] / [`OccupancySchedule`] | `OccupancySensor` | Switch-driven or periodic visits |
//! | [`LogReporter`] | `UsageReporter` | Logs reports, optionally forwards them |
//! | [`CompanionClient`] | — | Scripted companion application talking to the hub |
//!
//! ## Dependency rule
//!
//! Depends on `bentech-app` (port traits, server) and `bentech-domain` only.

mod companion;
mod devices;
mod occupancy;
mod radio;
mod reporter;
mod wifi;

pub use companion::{CompanionClient, CompanionError};
pub use devices::{
    DeodorizerFirmware, FleetConfig, FlusherFirmware, LidFirmware, PaperFirmware, VirtualFleet,
    spawn_fleet,
};
pub use occupancy::{ManualOccupancy, OccupancySchedule, OccupancySwitch};
pub use radio::{
    VirtualAddress, VirtualAir, VirtualCentral, VirtualConnection, VirtualPeripheral,
    VirtualSession,
};
pub use reporter::LogReporter;
pub use wifi::VirtualWifi;
