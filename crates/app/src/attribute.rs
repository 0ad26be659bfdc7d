//! Attribute accessor — lazy, per-connection lookup of remote attributes.
//!
//! The first resolution of a `(service, attribute)` pair performs a remote
//! service lookup followed by an attribute lookup; later resolutions on the
//! same connection are served from the cache. Misses are never cached, so a
//! lookup can be retried after reconnecting. The cache is owned by the
//! connection it was built on and is dropped with it.

use std::collections::HashMap;

use uuid::Uuid;

use bentech_domain::error::LinkError;

use crate::ports::GattConnection;

/// Memoized service and attribute handles for one connection.
pub struct AttributeCache<G: GattConnection> {
    services: HashMap<Uuid, G::Service>,
    attributes: HashMap<(Uuid, Uuid), G::Attribute>,
}

impl<G: GattConnection> Default for AttributeCache<G> {
    fn default() -> Self {
        Self {
            services: HashMap::new(),
            attributes: HashMap::new(),
        }
    }
}

impl<G: GattConnection> AttributeCache<G> {
    /// Resolve `attribute` inside `service` on `connection`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::AttributeNotFound`] when either the service or
    /// the attribute is absent, or the link error raised by the lookup.
    pub async fn resolve(
        &mut self,
        connection: &G,
        service: Uuid,
        attribute: Uuid,
    ) -> Result<G::Attribute, LinkError> {
        if let Some(found) = self.attributes.get(&(service, attribute)) {
            return Ok(found.clone());
        }

        let not_found = || LinkError::AttributeNotFound { service, attribute };

        let remote_service = match self.services.get(&service) {
            Some(cached) => cached.clone(),
            None => {
                let resolved = connection.service(service).await?.ok_or_else(not_found)?;
                self.services.insert(service, resolved.clone());
                resolved
            }
        };

        let resolved = connection
            .attribute(&remote_service, attribute)
            .await?
            .ok_or_else(not_found)?;
        self.attributes
            .insert((service, attribute), resolved.clone());
        Ok(resolved)
    }

    /// Number of attributes resolved so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether nothing has been resolved yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}
