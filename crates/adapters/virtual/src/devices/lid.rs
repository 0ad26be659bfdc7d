//! Simulated lid actuator firmware.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bentech_app::ports::InboundSession;
use bentech_app::server::{CommandHandler, Exchange};
use bentech_domain::opcode::{LID_CLOSE_COMPLETE, LidCommand};

/// Opens and closes a lid that takes `actuation` to travel; a finished close
/// is notified on the response attribute.
#[derive(Debug, Default)]
pub struct LidFirmware {
    actuation: Duration,
    open: AtomicBool,
}

impl LidFirmware {
    #[must_use]
    pub fn new(actuation: Duration) -> Self {
        Self {
            actuation,
            open: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }
}

impl CommandHandler for LidFirmware {
    type Command = LidCommand;

    async fn handle<S: InboundSession>(&self, command: LidCommand, exchange: &mut Exchange<'_, S>) {
        tokio::time::sleep(self.actuation).await;
        match command {
            LidCommand::Open => {
                self.open.store(true, Ordering::SeqCst);
                tracing::info!("lid opened");
            }
            LidCommand::Close => {
                self.open.store(false, Ordering::SeqCst);
                tracing::info!("lid closed");
                if let Err(err) = exchange.respond(&[LID_CLOSE_COMPLETE]).await {
                    tracing::warn!(%err, "close completion not delivered");
                }
            }
        }
    }
}
