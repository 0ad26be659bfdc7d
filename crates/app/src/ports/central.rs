//! Central-role link port — scanning, connecting and attribute I/O.
//!
//! The hub acts as a central towards its four peripherals. Adapters provide
//! the concrete radio (`btleplug` on real hardware, an in-process simulated
//! radio for tests and demos).

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio_stream::{Stream, StreamExt as _};
use uuid::Uuid;

use bentech_domain::error::LinkError;

/// One advertisement observed while scanning.
#[derive(Debug, Clone)]
pub struct Advertisement<H> {
    /// Advertised local name, if the packet carried one.
    pub name: Option<String>,
    /// Opaque handle used to connect to the advertiser.
    pub handle: H,
    /// Received signal strength, when the radio reports it.
    pub rssi: Option<i16>,
}

/// Advertisements delivered by an ongoing scan.
pub type Advertisements<H> = mpsc::Receiver<Advertisement<H>>;

/// Values notified on one attribute, in arrival order.
///
/// The stream ends when the connection drops.
pub struct Notifications {
    // Only ever polled through `&mut self`; the mutex makes the handle `Sync`
    // without requiring it of adapter streams.
    inner: Mutex<Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>>,
}

impl Notifications {
    /// Wrap an adapter-specific notification stream.
    pub fn new(stream: impl Stream<Item = Vec<u8>> + Send + 'static) -> Self {
        Self {
            inner: Mutex::new(Box::pin(stream)),
        }
    }

    /// Wait for the next notified value; `None` once the link is gone.
    pub async fn next(&mut self) -> Option<Vec<u8>> {
        self.inner
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .next()
            .await
    }
}

impl fmt::Debug for Notifications {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifications").finish_non_exhaustive()
    }
}

/// A radio able to scan for and connect to peripherals.
pub trait CentralLink: Send + Sync {
    /// Handle identifying a discovered peripheral.
    type Handle: Clone + fmt::Debug + Send + Sync + 'static;
    /// An established connection.
    type Connection: GattConnection;

    /// Start scanning; advertisements are delivered on the returned channel
    /// until [`stop_scan`](Self::stop_scan) is called.
    fn start_scan(
        &self,
    ) -> impl Future<Output = Result<Advertisements<Self::Handle>, LinkError>> + Send;

    /// Stop an ongoing scan.
    fn stop_scan(&self) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Open a connection to a discovered peripheral.
    fn connect(
        &self,
        handle: &Self::Handle,
    ) -> impl Future<Output = Result<Self::Connection, LinkError>> + Send;
}

/// Attribute-level operations on one established connection.
///
/// Connections are cheap handles; clones refer to the same link.
pub trait GattConnection: Clone + Send + Sync + 'static {
    /// A resolved remote service.
    type Service: Clone + Send + Sync + 'static;
    /// A resolved remote attribute.
    type Attribute: Clone + Send + Sync + 'static;

    /// Whether the link is still up.
    fn is_connected(&self) -> impl Future<Output = bool> + Send;

    /// Look up a remote service; `None` if the peripheral does not expose it.
    fn service(
        &self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Self::Service>, LinkError>> + Send;

    /// Look up an attribute within a resolved service.
    fn attribute(
        &self,
        service: &Self::Service,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Self::Attribute>, LinkError>> + Send;

    /// Write a value and wait for the link to accept it.
    fn write(
        &self,
        attribute: &Self::Attribute,
        value: &[u8],
    ) -> impl Future<Output = Result<(), LinkError>> + Send;

    /// Arm notifications on an attribute.
    ///
    /// Values notified after this returns are delivered on the stream;
    /// anything notified before is lost.
    fn subscribe(
        &self,
        attribute: &Self::Attribute,
    ) -> impl Future<Output = Result<Notifications, LinkError>> + Send;

    /// Close the link.
    fn disconnect(&self) -> impl Future<Output = Result<(), LinkError>> + Send;
}
