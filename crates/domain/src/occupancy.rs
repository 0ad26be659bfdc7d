//! Occupancy edges.
//!
//! The occupancy sensor reports a level (someone present or not); the hub
//! reacts to transitions only.

/// Edge-triggered occupancy event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OccupancyEvent {
    /// Motion started: someone arrived.
    Started,
    /// Motion ended: the visit is over.
    Ended,
}

/// Turns sampled occupancy levels into [`OccupancyEvent`] edges.
#[derive(Debug, Default)]
pub struct EdgeDetector {
    occupied: bool,
}

impl EdgeDetector {
    /// Feed one sample; returns an event only when the level changed.
    pub fn update(&mut self, occupied: bool) -> Option<OccupancyEvent> {
        if occupied == self.occupied {
            return None;
        }
        self.occupied = occupied;
        Some(if occupied {
            OccupancyEvent::Started
        } else {
            OccupancyEvent::Ended
        })
    }

    /// Whether the last sample reported occupancy.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.occupied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_start_unoccupied() {
        let mut detector = EdgeDetector::default();
        assert!(!detector.is_occupied());
        assert_eq!(detector.update(false), None);
    }

    #[test]
    fn should_emit_one_event_per_transition() {
        let mut detector = EdgeDetector::default();
        let samples = [false, true, true, true, false, false, true, false];
        let events: Vec<OccupancyEvent> =
            samples.iter().filter_map(|s| detector.update(*s)).collect();
        assert_eq!(
            events,
            vec![
                OccupancyEvent::Started,
                OccupancyEvent::Ended,
                OccupancyEvent::Started,
                OccupancyEvent::Ended,
            ]
        );
    }
}
