//! Peripheral device reference — identity plus discovery and connection state.

use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use bentech_domain::error::LinkError;

use crate::attribute::AttributeCache;
use crate::ports::{Advertisement, CentralLink, GattConnection};

/// An established connection together with its attribute cache.
///
/// Cloning is cheap; every clone shares the same cache.
pub struct Peer<G: GattConnection> {
    connection: G,
    cache: Arc<Mutex<AttributeCache<G>>>,
    generation: u64,
}

impl<G: GattConnection> Clone for Peer<G> {
    fn clone(&self) -> Self {
        Self {
            connection: self.connection.clone(),
            cache: Arc::clone(&self.cache),
            generation: self.generation,
        }
    }
}

impl<G: GattConnection> Peer<G> {
    fn new(connection: G, generation: u64) -> Self {
        Self {
            connection,
            cache: Arc::new(Mutex::new(AttributeCache::default())),
            generation,
        }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &G {
        &self.connection
    }

    /// Counter distinguishing successive connections of one reference.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Resolve an attribute on this connection, memoized.
    ///
    /// # Errors
    ///
    /// See [`AttributeCache::resolve`].
    pub async fn resolve(&self, service: Uuid, attribute: Uuid) -> Result<G::Attribute, LinkError> {
        self.cache
            .lock()
            .await
            .resolve(&self.connection, service, attribute)
            .await
    }
}

/// Discovery and connection state of one remote device.
///
/// The handle is bound once by the first advertisement carrying the exact
/// identity; later matches are ignored. The connection cycles between
/// present and absent, the reference itself lives as long as its manager.
pub struct DeviceReference<C: CentralLink> {
    identity: &'static str,
    handle: Option<C::Handle>,
    peer: Option<Peer<C::Connection>>,
    generation: u64,
}

impl<C: CentralLink> DeviceReference<C> {
    #[must_use]
    pub fn new(identity: &'static str) -> Self {
        Self {
            identity,
            handle: None,
            peer: None,
            generation: 0,
        }
    }

    #[must_use]
    pub fn identity(&self) -> &'static str {
        self.identity
    }

    /// Whether an advertisement has been matched.
    #[must_use]
    pub fn is_bound(&self) -> bool {
        self.handle.is_some()
    }

    #[must_use]
    pub fn handle(&self) -> Option<&C::Handle> {
        self.handle.as_ref()
    }

    /// Bind the handle carried by `advertisement` if its name is this
    /// identity and nothing is bound yet. Returns whether it bound.
    pub fn bind(&mut self, advertisement: &Advertisement<C::Handle>) -> bool {
        if self.handle.is_some() || advertisement.name.as_deref() != Some(self.identity) {
            return false;
        }
        self.handle = Some(advertisement.handle.clone());
        true
    }

    /// The current connection, if any.
    #[must_use]
    pub fn peer(&self) -> Option<Peer<C::Connection>> {
        self.peer.clone()
    }

    /// Store a freshly opened connection with an empty attribute cache.
    pub fn attach(&mut self, connection: C::Connection) -> Peer<C::Connection> {
        self.generation += 1;
        let peer = Peer::new(connection, self.generation);
        self.peer = Some(peer.clone());
        peer
    }

    /// Drop the current connection and its cache.
    pub fn detach(&mut self) -> Option<C::Connection> {
        self.peer.take().map(|peer| peer.connection)
    }

    /// Drop the connection only if it is still the one identified by
    /// `generation`.
    pub fn detach_if(&mut self, generation: u64) -> Option<C::Connection> {
        let current = self.peer.as_ref().map(|peer| peer.generation);
        if current == Some(generation) {
            self.detach()
        } else {
            None
        }
    }
}
