//! Wi-Fi port — network association, an external collaborator.

use std::future::Future;

use bentech_domain::error::CollaboratorError;
use bentech_domain::session::{WifiCredentials, WifiStatus};

/// Associates the hub with a Wi-Fi network.
pub trait WifiNetwork: Send + Sync {
    /// Join the network described by `credentials`.
    ///
    /// A rejected join is reported through the returned status, not as an
    /// error; errors mean the radio could not be driven at all.
    fn connect(
        &self,
        credentials: &WifiCredentials,
    ) -> impl Future<Output = Result<WifiStatus, CollaboratorError>> + Send;

    /// Leave the current network, if any.
    fn disconnect(&self) -> impl Future<Output = Result<(), CollaboratorError>> + Send;
}

impl<T: WifiNetwork> WifiNetwork for std::sync::Arc<T> {
    fn connect(
        &self,
        credentials: &WifiCredentials,
    ) -> impl Future<Output = Result<WifiStatus, CollaboratorError>> + Send {
        (**self).connect(credentials)
    }

    fn disconnect(&self) -> impl Future<Output = Result<(), CollaboratorError>> + Send {
        (**self).disconnect()
    }
}
