//! Occupancy port — the motion/presence sensor, an external collaborator.

use std::future::Future;

/// Samples whether someone is currently present.
pub trait OccupancySensor: Send {
    /// Take one sample.
    fn is_occupied(&mut self) -> impl Future<Output = bool> + Send;
}
