//! Typed managers for the four downstream peripherals.

use std::sync::Arc;

use bentech_domain::error::LinkError;
use bentech_domain::opcode::{
    DeodorizerCommand, FlushCommand, LID_CLOSE_COMPLETE, LidCommand, PaperCommand,
};
use bentech_domain::profile::{AUTO_FLUSHER, DEODORIZER, LID_CONTROLLER, PAPER_OBSERVER};
use bentech_domain::usage::decode_roll_count;

use super::{ControllableManager, ResponsiveManager};
use crate::ports::CentralLink;

/// Lid actuator: opens on request, reports when a close has finished.
pub struct LidController<C: CentralLink> {
    manager: ResponsiveManager<C>,
}

impl<C: CentralLink> LidController<C> {
    pub fn new(central: Arc<C>) -> Self {
        Self {
            manager: ResponsiveManager::new(central, LID_CONTROLLER),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &ControllableManager<C> {
        &self.manager
    }

    /// # Errors
    ///
    /// Returns the link error of the underlying write.
    pub async fn try_open(&self) -> Result<(), LinkError> {
        self.manager.try_send(LidCommand::Open).await
    }

    pub async fn open(&self) {
        self.manager.send(LidCommand::Open).await;
    }

    /// Close the lid and wait until the actuator reports completion.
    ///
    /// Returns whether the reply was the close-complete marker.
    ///
    /// # Errors
    ///
    /// Returns the link error of the exchange.
    pub async fn try_close(&self) -> Result<bool, LinkError> {
        let complete = self
            .manager
            .try_send_and_await(LidCommand::Close, |payload| {
                payload.first() == Some(&LID_CLOSE_COMPLETE)
            })
            .await?;
        if !complete {
            tracing::warn!(device = self.manager.name(), "unexpected close reply");
        }
        Ok(complete)
    }
}

/// Paper-usage sensor: counts rolls between start and stop.
pub struct PaperObserver<C: CentralLink> {
    manager: ResponsiveManager<C>,
}

impl<C: CentralLink> PaperObserver<C> {
    pub fn new(central: Arc<C>) -> Self {
        Self {
            manager: ResponsiveManager::new(central, PAPER_OBSERVER),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &ControllableManager<C> {
        &self.manager
    }

    /// # Errors
    ///
    /// Returns the link error of the underlying write.
    pub async fn try_start(&self) -> Result<(), LinkError> {
        self.manager.try_send(PaperCommand::Start).await
    }

    /// Stop observing and return the roll count.
    ///
    /// The count is `None` when the reply could not be decoded.
    ///
    /// # Errors
    ///
    /// Returns the link error of the exchange.
    pub async fn try_stop(&self) -> Result<Option<u32>, LinkError> {
        let rolls = self
            .manager
            .try_send_and_await(PaperCommand::Stop, |payload| decode_roll_count(&payload))
            .await?;
        if rolls.is_none() {
            tracing::warn!(device = self.manager.name(), "undecodable roll count");
        }
        Ok(rolls)
    }
}

/// Flush actuator.
pub struct AutoFlusher<C: CentralLink> {
    manager: ControllableManager<C>,
}

impl<C: CentralLink> AutoFlusher<C> {
    pub fn new(central: Arc<C>) -> Self {
        Self {
            manager: ControllableManager::new(central, AUTO_FLUSHER),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &ControllableManager<C> {
        &self.manager
    }

    /// # Errors
    ///
    /// Returns the link error of the underlying write.
    pub async fn try_flush(&self) -> Result<(), LinkError> {
        self.manager.try_send(FlushCommand::Flush).await
    }
}

/// Deodorizer.
pub struct Deodorizer<C: CentralLink> {
    manager: ControllableManager<C>,
}

impl<C: CentralLink> Deodorizer<C> {
    pub fn new(central: Arc<C>) -> Self {
        Self {
            manager: ControllableManager::new(central, DEODORIZER),
        }
    }

    #[must_use]
    pub fn manager(&self) -> &ControllableManager<C> {
        &self.manager
    }

    /// # Errors
    ///
    /// Returns the link error of the underlying write.
    pub async fn try_spray(&self) -> Result<(), LinkError> {
        self.manager.try_send(DeodorizerCommand::Spray).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::ports::Advertisement;
    use crate::testing::{FakeCentral, Journal};

    async fn bind_and_connect(manager: &ControllableManager<FakeCentral>, handle: u32) {
        manager
            .scan_match(&Advertisement {
                name: Some(manager.name().to_string()),
                handle,
                rssi: None,
            })
            .await;
        manager.connect().await;
    }

    #[tokio::test]
    async fn should_confirm_lid_close() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let connection = central.add(&LID_CONTROLLER);
        let response = LID_CONTROLLER.response.unwrap();
        let delay = Duration::from_millis(5);
        connection.reply(LID_CONTROLLER.control, 0x02, response, &[0x01], delay);
        let lid = LidController::new(Arc::clone(&central));
        bind_and_connect(lid.manager(), 0).await;

        lid.open().await;
        assert!(lid.try_close().await.unwrap());

        assert_eq!(
            connection.writes(),
            vec![
                (LID_CONTROLLER.control, vec![0x01]),
                (LID_CONTROLLER.control, vec![0x02]),
            ]
        );
    }

    #[tokio::test]
    async fn should_flag_unexpected_close_reply() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let connection = central.add(&LID_CONTROLLER);
        let response = LID_CONTROLLER.response.unwrap();
        let delay = Duration::ZERO;
        connection.reply(LID_CONTROLLER.control, 0x02, response, &[0x07], delay);
        let lid = LidController::new(Arc::clone(&central));
        bind_and_connect(lid.manager(), 0).await;

        assert!(!lid.try_close().await.unwrap());
    }

    #[tokio::test]
    async fn should_decode_roll_count_on_stop() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let connection = central.add(&PAPER_OBSERVER);
        let response = PAPER_OBSERVER.response.unwrap();
        let delay = Duration::from_millis(5);
        connection.reply(PAPER_OBSERVER.control, 0x02, response, &[4], delay);
        let paper = PaperObserver::new(Arc::clone(&central));
        bind_and_connect(paper.manager(), 0).await;

        paper.try_start().await.unwrap();
        assert_eq!(paper.try_stop().await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn should_write_single_opcode_for_flush_and_spray() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let flusher_link = central.add(&AUTO_FLUSHER);
        let deodorizer_link = central.add(&DEODORIZER);
        let flusher = AutoFlusher::new(Arc::clone(&central));
        let deodorizer = Deodorizer::new(Arc::clone(&central));
        bind_and_connect(flusher.manager(), 0).await;
        bind_and_connect(deodorizer.manager(), 1).await;

        flusher.try_flush().await.unwrap();
        deodorizer.try_spray().await.unwrap();

        assert_eq!(
            flusher_link.writes(),
            vec![(AUTO_FLUSHER.control, vec![0x01])]
        );
        assert_eq!(
            deodorizer_link.writes(),
            vec![(DEODORIZER.control, vec![0x01])]
        );
    }
}
