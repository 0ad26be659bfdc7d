//! Simulated control-only actuators: the flusher and the deodorizer.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use bentech_app::ports::InboundSession;
use bentech_app::server::{CommandHandler, Exchange};
use bentech_domain::opcode::{DeodorizerCommand, FlushCommand};

/// Runs flush cycles and counts them.
#[derive(Debug, Default)]
pub struct FlusherFirmware {
    actuation: Duration,
    cycles: AtomicU32,
}

impl FlusherFirmware {
    #[must_use]
    pub fn new(actuation: Duration) -> Self {
        Self {
            actuation,
            cycles: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl CommandHandler for FlusherFirmware {
    type Command = FlushCommand;

    async fn handle<S: InboundSession>(&self, command: FlushCommand, _: &mut Exchange<'_, S>) {
        match command {
            FlushCommand::Flush => {
                tokio::time::sleep(self.actuation).await;
                let cycles = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(cycles, "flushed");
            }
        }
    }
}

/// Runs spray cycles and counts them.
#[derive(Debug, Default)]
pub struct DeodorizerFirmware {
    actuation: Duration,
    cycles: AtomicU32,
}

impl DeodorizerFirmware {
    #[must_use]
    pub fn new(actuation: Duration) -> Self {
        Self {
            actuation,
            cycles: AtomicU32::new(0),
        }
    }

    #[must_use]
    pub fn cycles(&self) -> u32 {
        self.cycles.load(Ordering::SeqCst)
    }
}

impl CommandHandler for DeodorizerFirmware {
    type Command = DeodorizerCommand;

    async fn handle<S: InboundSession>(&self, command: DeodorizerCommand, _: &mut Exchange<'_, S>) {
        match command {
            DeodorizerCommand::Spray => {
                tokio::time::sleep(self.actuation).await;
                let cycles = self.cycles.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(cycles, "sprayed");
            }
        }
    }
}
