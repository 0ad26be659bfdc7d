//! # bentech-app
//!
//! Application layer — the device protocol core and **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement:
//!   - `CentralLink` / `GattConnection` — scan, connect, attribute I/O
//!   - `PeripheralLink` / `InboundSession` — advertise, serve one central
//!   - `WifiNetwork`, `UsageReporter`, `OccupancySensor` — external collaborators
//! - Central role:
//!   - attribute accessor (per-connection lookup cache)
//!   - device reference (identity, discovered handle, connection)
//!   - controllable and responsive **device managers**
//! - Peripheral role: the **device server** state machine and its dispatch trait
//! - The **streaming extension**, layered on both roles
//! - The **hub orchestrator** composing all of the above
//!
//! ## Dependency rule
//! Depends on `bentech-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod attribute;
pub mod hub;
pub mod managers;
pub mod occupancy;
pub mod ports;
pub mod reference;
pub mod server;
pub mod streaming;

#[cfg(test)]
pub(crate) mod testing;
