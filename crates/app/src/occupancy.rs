//! Occupancy monitor loop — turns sensor samples into start/end edges.

use std::time::Duration;

use tokio::sync::mpsc;

use bentech_domain::occupancy::{EdgeDetector, OccupancyEvent};

use crate::ports::OccupancySensor;

/// Poll `sensor` every `poll` and emit an event on each edge.
///
/// Returns once the receiving side of `events` is dropped.
pub async fn monitor_occupancy<S: OccupancySensor>(
    sensor: &mut S,
    events: mpsc::Sender<OccupancyEvent>,
    poll: Duration,
) {
    let mut edges = EdgeDetector::default();
    let mut ticker = tokio::time::interval(poll);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            () = events.closed() => break,
        }
        let Some(event) = edges.update(sensor.is_occupied().await) else {
            continue;
        };
        tracing::info!(?event, "occupancy changed");
        if events.send(event).await.is_err() {
            break;
        }
    }
    tracing::debug!("occupancy monitor stopped");
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    struct Samples(VecDeque<bool>);

    impl OccupancySensor for Samples {
        async fn is_occupied(&mut self) -> bool {
            self.0.pop_front().unwrap_or(false)
        }
    }

    #[tokio::test]
    async fn should_emit_one_event_per_edge() {
        let mut sensor = Samples([false, true, true, true, false, false, true, false].into());
        let (tx, mut rx) = mpsc::channel(8);

        let monitor = monitor_occupancy(&mut sensor, tx, Duration::from_millis(1));
        let collect = async {
            let mut events = Vec::new();
            for _ in 0..4 {
                events.push(rx.recv().await.unwrap());
            }
            drop(rx);
            events
        };
        let ((), events) = tokio::join!(monitor, collect);

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
