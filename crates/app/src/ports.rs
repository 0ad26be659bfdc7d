//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the protocol core and the outside world:
//! the radio in both roles and the external collaborators (Wi-Fi, backend,
//! occupancy sensor). They are defined here (in `app`) so that both the core
//! and the adapter layer can depend on them without circular dependencies.

pub mod backend;
pub mod central;
pub mod occupancy;
pub mod peripheral;
pub mod wifi;

pub use backend::UsageReporter;
pub use central::{Advertisement, Advertisements, CentralLink, GattConnection, Notifications};
pub use occupancy::OccupancySensor;
pub use peripheral::{InboundSession, PeripheralLink};
pub use wifi::WifiNetwork;
