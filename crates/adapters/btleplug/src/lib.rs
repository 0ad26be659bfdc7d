//! # bentech-adapter-btleplug
//!
//! Central-role BLE adapter — drives real hardware through `btleplug`.
//!
//! ## How it works
//!
//! [`BtleplugCentral`] implements the `CentralLink` port: scanning forwards
//! btleplug discovery events as advertisements carrying the peripheral's
//! local name, and connecting opens a GATT connection and discovers its
//! services. [`BtleplugConnection`] implements `GattConnection` on top of
//! the discovered services and characteristics.
//!
//! The peripheral role is not available here; btleplug only acts as a
//! central.
//!
//! ## Dependency rule
//!
//! Same as other adapters: depends on `bentech-app` and `bentech-domain`.

mod central;
mod config;
mod error;
mod gatt;

pub use central::BtleplugCentral;
pub use config::BleConfig;
pub use error::BleError;
pub use gatt::BtleplugConnection;
