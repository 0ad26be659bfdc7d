//! Peripheral-role link port — advertising and serving one inbound connection.

use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use bentech_domain::error::LinkError;
use bentech_domain::profile::ServiceProfile;

/// A radio able to advertise a service and accept a central.
pub trait PeripheralLink: Send + Sync {
    /// The inbound connection produced by a successful advertisement.
    type Session: InboundSession;

    /// Advertise `profile` until a central connects or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Timeout`] when nobody connected in time, or a
    /// transport error when advertising could not start.
    fn advertise(
        &self,
        profile: &ServiceProfile,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Session, LinkError>> + Send;
}

/// One inbound connection from a central.
///
/// Reads on different attributes may run concurrently from separate loops.
pub trait InboundSession: Send + Sync + 'static {
    /// Whether the central is still connected.
    fn is_connected(&self) -> bool;

    /// Wait for the next value the central writes to `attribute`.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::Timeout`] when nothing was written within
    /// `timeout` (normal idle behaviour) and [`LinkError::NotConnected`] once
    /// the central has gone.
    fn written(
        &self,
        attribute: Uuid,
        timeout: Duration,
    ) -> impl Future<Output = Result<Vec<u8>, LinkError>> + Send;

    /// Notify `value` on `attribute`.
    fn notify(
        &self,
        attribute: Uuid,
        value: &[u8],
    ) -> impl Future<Output = Result<(), LinkError>> + Send;
}
