//! Responsive device manager — write an opcode, await the correlated reply.

use std::ops::Deref;
use std::sync::Arc;

use bentech_domain::error::LinkError;
use bentech_domain::profile::ServiceProfile;

use super::ControllableManager;
use crate::ports::{CentralLink, GattConnection};

/// A [`ControllableManager`] whose device answers on a response attribute.
///
/// A reply is correlated to the write that triggered it by ordering only,
/// so exchanges are serialized by the inner manager's exchange lock.
pub struct ResponsiveManager<C: CentralLink> {
    inner: ControllableManager<C>,
}

impl<C: CentralLink> Deref for ResponsiveManager<C> {
    type Target = ControllableManager<C>;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl<C: CentralLink> ResponsiveManager<C> {
    /// Create an unbound manager for `profile`.
    pub fn new(central: Arc<C>, profile: ServiceProfile) -> Self {
        Self {
            inner: ControllableManager::new(central, profile),
        }
    }

    /// Write `opcode` and return the decoded next notification.
    ///
    /// The response attribute is resolved and subscribed before the write is
    /// issued; if it cannot be resolved nothing is written. There is no
    /// internal timeout.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::AttributeNotFound`] when the response or control
    /// attribute is missing, [`LinkError::NotConnected`] without a connection
    /// or when the link drops before the reply, or the link error raised by
    /// the write.
    #[tracing::instrument(
        skip(self, opcode, decode),
        fields(device = self.name(), opcode = tracing::field::Empty)
    )]
    pub async fn try_send_and_await<T>(
        &self,
        opcode: impl Into<u8>,
        decode: impl FnOnce(Vec<u8>) -> T + Send,
    ) -> Result<T, LinkError> {
        let opcode = opcode.into();
        tracing::Span::current().record("opcode", opcode);

        let profile = *self.profile();
        let response = profile.response.ok_or(LinkError::AttributeNotFound {
            service: profile.service,
            attribute: uuid::Uuid::nil(),
        })?;

        let _exchange = self.exclusive().await;
        let peer = self.peer().await?;
        let response = self.resolve(&peer, response).await?;
        let control = self.resolve(&peer, profile.control).await?;

        let connection = peer.connection();
        let mut notifications = match connection.subscribe(&response).await {
            Ok(notifications) => notifications,
            Err(err) => return self.settle(&peer, Err(err)).await,
        };

        let reply = async { notifications.next().await.ok_or(LinkError::NotConnected) };
        let request = [opcode];
        let result = tokio::try_join!(connection.write(&control, &request), reply);
        let ((), payload) = self.settle(&peer, result).await?;
        tracing::debug!(len = payload.len(), "reply received");
        Ok(decode(payload))
    }

    /// Write `opcode` and await the reply, logging failures.
    ///
    /// Returns `None` when the exchange could not complete.
    pub async fn send_and_await<T>(
        &self,
        opcode: impl Into<u8>,
        decode: impl FnOnce(Vec<u8>) -> T + Send,
    ) -> Option<T> {
        let opcode = opcode.into();
        match self.try_send_and_await(opcode, decode).await {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(device = self.name(), opcode, error = %err, "exchange failed");
                None
            }
        }
    }
}
