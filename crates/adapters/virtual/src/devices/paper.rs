//! Simulated paper-usage sensor firmware.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use bentech_app::ports::InboundSession;
use bentech_app::server::{CommandHandler, Exchange};
use bentech_domain::opcode::PaperCommand;

/// Counts a fixed number of rolls per observation window and notifies the
/// count, as 4 big-endian bytes, once observation stops.
#[derive(Debug, Default)]
pub struct PaperFirmware {
    settle: Duration,
    rolls_per_visit: u32,
    observing: AtomicBool,
    visits: AtomicU32,
}

impl PaperFirmware {
    #[must_use]
    pub fn new(settle: Duration, rolls_per_visit: u32) -> Self {
        Self {
            settle,
            rolls_per_visit,
            observing: AtomicBool::new(false),
            visits: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.observing.load(Ordering::SeqCst)
    }

    /// Observation windows completed so far.
    #[must_use]
    pub fn visits(&self) -> u32 {
        self.visits.load(Ordering::SeqCst)
    }
}

impl CommandHandler for PaperFirmware {
    type Command = PaperCommand;

    async fn handle<S: InboundSession>(
        &self,
        command: PaperCommand,
        exchange: &mut Exchange<'_, S>,
    ) {
        match command {
            PaperCommand::Start => {
                self.observing.store(true, Ordering::SeqCst);
                tracing::info!("paper observation started");
            }
            PaperCommand::Stop => {
                tokio::time::sleep(self.settle).await;
                let rolls = if self.observing.swap(false, Ordering::SeqCst) {
                    self.visits.fetch_add(1, Ordering::SeqCst);
                    self.rolls_per_visit
                } else {
                    0
                };
                tracing::info!(rolls, "paper observation stopped");
                if let Err(err) = exchange.respond(&rolls.to_be_bytes()).await {
                    tracing::warn!(%err, "roll count not delivered");
                }
            }
        }
    }
}
