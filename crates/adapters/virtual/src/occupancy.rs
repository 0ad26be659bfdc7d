//! Simulated occupancy sensors.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

use bentech_app::ports::OccupancySensor;

/// Sensor driven by hand through an [`OccupancySwitch`].
#[derive(Debug)]
pub struct ManualOccupancy {
    occupied: watch::Receiver<bool>,
}

/// Sets what a [`ManualOccupancy`] reports.
#[derive(Debug)]
pub struct OccupancySwitch {
    occupied: watch::Sender<bool>,
}

impl ManualOccupancy {
    /// A sensor reporting nobody present, and the switch that drives it.
    #[must_use]
    pub fn new() -> (Self, OccupancySwitch) {
        let (tx, rx) = watch::channel(false);
        (Self { occupied: rx }, OccupancySwitch { occupied: tx })
    }
}

impl OccupancySwitch {
    pub fn set(&self, occupied: bool) {
        self.occupied.send_replace(occupied);
    }
}

impl OccupancySensor for ManualOccupancy {
    async fn is_occupied(&mut self) -> bool {
        *self.occupied.borrow()
    }
}

/// Sensor reporting periodic visits: the first one `first_visit` after
/// creation, then one every `interval`, each lasting `visit`.
#[derive(Debug, Clone)]
pub struct OccupancySchedule {
    origin: Instant,
    first_visit: Duration,
    visit: Duration,
    interval: Duration,
}

impl OccupancySchedule {
    #[must_use]
    pub fn new(first_visit: Duration, visit: Duration, interval: Duration) -> Self {
        Self {
            origin: Instant::now(),
            first_visit,
            visit,
            interval,
        }
    }

    fn occupied_at(&self, elapsed: Duration) -> bool {
        let Some(since_first) = elapsed.checked_sub(self.first_visit) else {
            return false;
        };
        if self.interval.is_zero() {
            return since_first < self.visit;
        }
        since_first.as_nanos() % self.interval.as_nanos() < self.visit.as_nanos()
    }
}

impl OccupancySensor for OccupancySchedule {
    async fn is_occupied(&mut self) -> bool {
        self.occupied_at(self.origin.elapsed())
    }
}
