//! One established virtual connection and its two ends.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use bentech_app::ports::{GattConnection, InboundSession, Notifications};
use bentech_domain::error::LinkError;
use bentech_domain::profile::ServiceProfile;

/// Notified values buffered per attribute before slow subscribers lag.
const NOTIFY_BUFFER: usize = 256;

type Inbox = Arc<tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>;

struct Channels {
    writes: HashMap<Uuid, (mpsc::UnboundedSender<Vec<u8>>, Inbox)>,
    notifications: HashMap<Uuid, broadcast::Sender<Vec<u8>>>,
}

/// Shared state of one connection. Dropping the channels is what ends the
/// link for both sides: pending reads see a closed inbox and notification
/// streams end.
pub(crate) struct VirtualLink {
    profile: ServiceProfile,
    channels: Mutex<Option<Channels>>,
}

impl VirtualLink {
    pub(crate) fn new(profile: ServiceProfile) -> Self {
        let writes = profile
            .writable()
            .map(|attribute| {
                let (tx, rx) = mpsc::unbounded_channel();
                (attribute, (tx, Arc::new(tokio::sync::Mutex::new(rx))))
            })
            .collect();
        let notifications = profile
            .notifiable()
            .map(|attribute| (attribute, broadcast::channel(NOTIFY_BUFFER).0))
            .collect();
        Self {
            profile,
            channels: Mutex::new(Some(Channels {
                writes,
                notifications,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<Channels>> {
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_found(&self, attribute: Uuid) -> LinkError {
        LinkError::AttributeNotFound {
            service: self.profile.service,
            attribute,
        }
    }

    fn is_connected(&self) -> bool {
        self.lock().is_some()
    }

    fn disconnect(&self) {
        if self.lock().take().is_some() {
            tracing::debug!(name = self.profile.name, "virtual link closed");
        }
    }

    fn write(&self, attribute: Uuid, value: &[u8]) -> Result<(), LinkError> {
        let guard = self.lock();
        let channels = guard.as_ref().ok_or(LinkError::NotConnected)?;
        let (tx, _) = channels
            .writes
            .get(&attribute)
            .ok_or_else(|| self.not_found(attribute))?;
        tx.send(value.to_vec()).map_err(|_| LinkError::NotConnected)
    }

    fn subscribe(&self, attribute: Uuid) -> Result<broadcast::Receiver<Vec<u8>>, LinkError> {
        let guard = self.lock();
        let channels = guard.as_ref().ok_or(LinkError::NotConnected)?;
        channels
            .notifications
            .get(&attribute)
            .map(broadcast::Sender::subscribe)
            .ok_or_else(|| self.not_found(attribute))
    }

    fn inbox(&self, attribute: Uuid) -> Result<Inbox, LinkError> {
        let guard = self.lock();
        let channels = guard.as_ref().ok_or(LinkError::NotConnected)?;
        channels
            .writes
            .get(&attribute)
            .map(|(_, inbox)| Arc::clone(inbox))
            .ok_or_else(|| self.not_found(attribute))
    }

    fn notify(&self, attribute: Uuid, value: &[u8]) -> Result<(), LinkError> {
        let guard = self.lock();
        let channels = guard.as_ref().ok_or(LinkError::NotConnected)?;
        let tx = channels
            .notifications
            .get(&attribute)
            .ok_or_else(|| self.not_found(attribute))?;
        // Nobody subscribed: the value is lost, as on a real radio.
        let _ = tx.send(value.to_vec());
        Ok(())
    }
}

/// Central end of a virtual connection.
#[derive(Clone)]
pub struct VirtualConnection {
    link: Arc<VirtualLink>,
}

impl VirtualConnection {
    pub(crate) fn new(link: Arc<VirtualLink>) -> Self {
        Self { link }
    }

    /// Name of the peripheral on the other end.
    #[must_use]
    pub fn peer_name(&self) -> &'static str {
        self.link.profile.name
    }
}

impl std::fmt::Debug for VirtualConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualConnection")
            .field("peer", &self.peer_name())
            .field("connected", &self.link.is_connected())
            .finish()
    }
}

impl GattConnection for VirtualConnection {
    type Service = Uuid;
    type Attribute = Uuid;

    async fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    async fn service(&self, id: Uuid) -> Result<Option<Uuid>, LinkError> {
        if !self.link.is_connected() {
            return Err(LinkError::NotConnected);
        }
        Ok((id == self.link.profile.service).then_some(id))
    }

    async fn attribute(&self, service: &Uuid, id: Uuid) -> Result<Option<Uuid>, LinkError> {
        if !self.link.is_connected() {
            return Err(LinkError::NotConnected);
        }
        let profile = &self.link.profile;
        let resolved = *service == profile.service && profile.has_attribute(id);
        Ok(resolved.then_some(id))
    }

    async fn write(&self, attribute: &Uuid, value: &[u8]) -> Result<(), LinkError> {
        self.link.write(*attribute, value)
    }

    async fn subscribe(&self, attribute: &Uuid) -> Result<Notifications, LinkError> {
        let rx = self.link.subscribe(*attribute)?;
        Ok(Notifications::new(
            BroadcastStream::new(rx).filter_map(Result::ok),
        ))
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.link.disconnect();
        Ok(())
    }
}

/// Peripheral end of a virtual connection.
pub struct VirtualSession {
    link: Arc<VirtualLink>,
}

impl VirtualSession {
    pub(crate) fn new(link: Arc<VirtualLink>) -> Self {
        Self { link }
    }

    /// Drop the central, as a peripheral losing power would.
    pub fn disconnect(&self) {
        self.link.disconnect();
    }
}

impl InboundSession for VirtualSession {
    fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    async fn written(&self, attribute: Uuid, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let inbox = self.link.inbox(attribute)?;
        let mut inbox = inbox.lock().await;
        match tokio::time::timeout(timeout, inbox.recv()).await {
            Ok(Some(value)) => Ok(value),
            Ok(None) => Err(LinkError::NotConnected),
            Err(_) => Err(LinkError::Timeout),
        }
    }

    async fn notify(&self, attribute: Uuid, value: &[u8]) -> Result<(), LinkError> {
        self.link.notify(attribute, value)
    }
}
