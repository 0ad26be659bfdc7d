//! Controllable device manager — bind, connect and fire-and-forget writes.

use std::sync::Arc;

use tokio::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use bentech_domain::error::LinkError;
use bentech_domain::profile::ServiceProfile;

use crate::ports::{Advertisement, CentralLink, GattConnection};
use crate::reference::{DeviceReference, Peer};

/// Central-role manager of one downstream peripheral.
///
/// Exchanges on one manager are serialized: a second `send` waits until the
/// first has completed. The reference lock is only held for bookkeeping,
/// never across remote I/O.
pub struct ControllableManager<C: CentralLink> {
    profile: ServiceProfile,
    central: Arc<C>,
    reference: Mutex<DeviceReference<C>>,
    exchange: Mutex<()>,
}

impl<C: CentralLink> ControllableManager<C> {
    /// Create an unbound manager for `profile`.
    pub fn new(central: Arc<C>, profile: ServiceProfile) -> Self {
        Self {
            profile,
            central,
            reference: Mutex::new(DeviceReference::new(profile.name)),
            exchange: Mutex::new(()),
        }
    }

    /// The advertised name this manager binds to.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.profile.name
    }

    #[must_use]
    pub fn profile(&self) -> &ServiceProfile {
        &self.profile
    }

    /// Bind the reference to `advertisement` on the first exact name match.
    ///
    /// Returns `true` only for the advertisement that performed the binding.
    pub async fn scan_match(&self, advertisement: &Advertisement<C::Handle>) -> bool {
        let bound = self.reference.lock().await.bind(advertisement);
        if bound {
            tracing::info!(
                device = self.name(),
                handle = ?advertisement.handle,
                "peripheral discovered"
            );
        }
        bound
    }

    /// Whether discovery has bound a handle.
    pub async fn is_bound(&self) -> bool {
        self.reference.lock().await.is_bound()
    }

    /// Whether a live connection is held.
    ///
    /// A connection the link reports as dead is dropped, so the next rescan
    /// reconnects it.
    pub async fn is_connected(&self) -> bool {
        let Some(peer) = self.reference.lock().await.peer() else {
            return false;
        };
        if peer.connection().is_connected().await {
            return true;
        }
        self.forget(peer.generation()).await;
        false
    }

    /// Open a connection to the bound peripheral.
    ///
    /// Returns `Ok(false)` without touching the link when nothing is bound,
    /// and `Ok(true)` once a connection is held, including when one already
    /// was.
    ///
    /// # Errors
    ///
    /// Returns the link error raised while connecting.
    #[tracing::instrument(skip(self), fields(device = self.name()))]
    pub async fn try_connect(&self) -> Result<bool, LinkError> {
        let _exchange = self.exchange.lock().await;

        let handle = {
            let reference = self.reference.lock().await;
            let Some(handle) = reference.handle().cloned() else {
                return Ok(false);
            };
            handle
        };
        if self.is_connected().await {
            return Ok(true);
        }

        let connection = self.central.connect(&handle).await?;
        self.reference.lock().await.attach(connection);
        tracing::info!("peripheral connected");
        Ok(true)
    }

    /// Connect, logging instead of returning failures.
    pub async fn connect(&self) {
        match self.try_connect().await {
            Ok(true) => {}
            Ok(false) => tracing::info!(
                device = self.name(),
                "peripheral not discovered, skipping connect"
            ),
            Err(err) => tracing::warn!(device = self.name(), error = %err, "unable to connect"),
        }
    }

    /// Write `opcode` to the control attribute.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::NotConnected`] without a connection,
    /// [`LinkError::AttributeNotFound`] when the control attribute is
    /// missing, or the link error raised by the write.
    #[tracing::instrument(
        skip(self, opcode),
        fields(device = self.name(), opcode = tracing::field::Empty)
    )]
    pub async fn try_send(&self, opcode: impl Into<u8>) -> Result<(), LinkError> {
        let opcode = opcode.into();
        tracing::Span::current().record("opcode", opcode);

        let _exchange = self.exclusive().await;
        let peer = self.peer().await?;
        let control = self.resolve(&peer, self.profile.control).await?;
        let result = peer.connection().write(&control, &[opcode]).await;
        self.settle(&peer, result).await
    }

    /// Best-effort write of `opcode`; failures are logged and dropped.
    pub async fn send(&self, opcode: impl Into<u8>) {
        let opcode = opcode.into();
        if let Err(err) = self.try_send(opcode).await {
            tracing::warn!(device = self.name(), opcode, error = %err, "command not delivered");
        }
    }

    /// Close the connection, if any. The binding is kept.
    pub async fn disconnect(&self) {
        let connection = self.reference.lock().await.detach();
        if let Some(connection) = connection {
            if let Err(err) = connection.disconnect().await {
                tracing::warn!(device = self.name(), error = %err, "unable to disconnect cleanly");
            }
            tracing::info!(device = self.name(), "peripheral disconnected");
        }
    }

    /// Hold the exchange lock for a full write/await cycle.
    pub(crate) async fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.exchange.lock().await
    }

    /// The current connection, or [`LinkError::NotConnected`].
    pub(crate) async fn peer(&self) -> Result<Peer<C::Connection>, LinkError> {
        self.reference
            .lock()
            .await
            .peer()
            .ok_or(LinkError::NotConnected)
    }

    /// Resolve `attribute` in this device's service.
    pub(crate) async fn resolve(
        &self,
        peer: &Peer<C::Connection>,
        attribute: Uuid,
    ) -> Result<<C::Connection as GattConnection>::Attribute, LinkError> {
        let result = peer.resolve(self.profile.service, attribute).await;
        self.settle(peer, result).await
    }

    /// Drop the connection when `result` shows it is gone.
    pub(crate) async fn settle<T>(
        &self,
        peer: &Peer<C::Connection>,
        result: Result<T, LinkError>,
    ) -> Result<T, LinkError> {
        if matches!(result, Err(LinkError::NotConnected)) {
            self.forget(peer.generation()).await;
        }
        result
    }

    async fn forget(&self, generation: u64) {
        if self.reference.lock().await.detach_if(generation).is_some() {
            tracing::info!(device = self.name(), "peripheral connection lost");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeCentral, Journal};
    use bentech_domain::opcode::FlushCommand;
    use bentech_domain::profile::{AUTO_FLUSHER, DEODORIZER};

    async fn discovered(
        central: &Arc<FakeCentral>,
        profile: ServiceProfile,
    ) -> ControllableManager<FakeCentral> {
        let manager = ControllableManager::new(Arc::clone(central), profile);
        let mut scan = central.start_scan().await.unwrap();
        while let Ok(advertisement) = scan.try_recv() {
            manager.scan_match(&advertisement).await;
        }
        manager
    }

    #[tokio::test]
    async fn should_ignore_send_when_unresolved() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let connection = central.add(&AUTO_FLUSHER);
        let manager = ControllableManager::new(Arc::clone(&central), AUTO_FLUSHER);

        manager.send(FlushCommand::Flush).await;

        assert!(!manager.is_bound().await);
        assert!(!manager.is_connected().await);
        assert!(connection.writes().is_empty());
        assert!(matches!(
            manager.try_send(FlushCommand::Flush).await,
            Err(LinkError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn should_skip_connect_when_not_discovered() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let manager = ControllableManager::new(Arc::clone(&central), DEODORIZER);

        assert!(!manager.try_connect().await.unwrap());
        manager.connect().await;

        assert!(central.journal().entries().is_empty());
    }

    #[tokio::test]
    async fn should_write_opcode_to_control_attribute() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let connection = central.add(&AUTO_FLUSHER);
        let manager = discovered(&central, AUTO_FLUSHER).await;

        manager.connect().await;
        manager.send(FlushCommand::Flush).await;

        assert!(manager.is_connected().await);
        assert_eq!(
            connection.writes(),
            vec![(AUTO_FLUSHER.control, vec![0x01])]
        );
    }

    #[tokio::test]
    async fn should_not_reconnect_live_connection() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        central.add(&AUTO_FLUSHER);
        let manager = discovered(&central, AUTO_FLUSHER).await;

        manager.connect().await;
        manager.connect().await;

        let connects = central
            .journal()
            .entries()
            .into_iter()
            .filter(|entry| entry.starts_with("connect-start"))
            .count();
        assert_eq!(connects, 1);
    }

    #[tokio::test]
    async fn should_report_missing_control_attribute() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let connection = central.add(&AUTO_FLUSHER);
        connection.hide(AUTO_FLUSHER.control);
        let manager = discovered(&central, AUTO_FLUSHER).await;
        manager.connect().await;

        let err = manager.try_send(FlushCommand::Flush).await.unwrap_err();

        assert!(matches!(err, LinkError::AttributeNotFound { .. }));
        assert!(connection.writes().is_empty());
        assert!(manager.is_connected().await);
    }

    #[tokio::test]
    async fn should_clear_connection_once_link_drops() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        let connection = central.add(&AUTO_FLUSHER);
        let manager = discovered(&central, AUTO_FLUSHER).await;
        manager.connect().await;

        connection.drop_link();

        let err = manager.try_send(FlushCommand::Flush).await.unwrap_err();
        assert!(err.is_recoverable_by_rescan());
        assert!(!manager.is_connected().await);
        assert!(manager.is_bound().await);

        manager.connect().await;
        manager.send(FlushCommand::Flush).await;
        assert_eq!(connection.writes().len(), 1);
    }

    #[tokio::test]
    async fn should_keep_binding_after_disconnect() {
        let central = Arc::new(FakeCentral::new(Journal::default()));
        central.add(&DEODORIZER);
        let manager = discovered(&central, DEODORIZER).await;
        manager.connect().await;

        manager.disconnect().await;

        assert!(manager.is_bound().await);
        assert!(!manager.is_connected().await);
        assert_eq!(
            central.journal().entries().last().map(String::as_str),
            Some("disconnect:BT-deodorant")
        );
    }
}
