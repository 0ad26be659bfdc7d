//! Simulated Wi-Fi radio with a single known network.

use std::sync::{Mutex, MutexGuard, PoisonError};

use bentech_app::ports::WifiNetwork;
use bentech_domain::error::CollaboratorError;
use bentech_domain::session::{WifiCredentials, WifiStatus};

/// Joins its configured network when given matching credentials.
#[derive(Debug, Default)]
pub struct VirtualWifi {
    network: Option<WifiCredentials>,
    joined: Mutex<Option<String>>,
}

impl VirtualWifi {
    /// A radio in range of `network`.
    #[must_use]
    pub fn new(network: WifiCredentials) -> Self {
        Self {
            network: Some(network),
            joined: Mutex::default(),
        }
    }

    /// SSID of the joined network, if any.
    #[must_use]
    pub fn joined(&self) -> Option<String> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<String>> {
        self.joined.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WifiNetwork for VirtualWifi {
    async fn connect(
        &self,
        credentials: &WifiCredentials,
    ) -> Result<WifiStatus, CollaboratorError> {
        let status = match &self.network {
            Some(network) if network.ssid != credentials.ssid => WifiStatus::LINK_NONET,
            Some(network) if network.password != credentials.password => WifiStatus::LINK_BADAUTH,
            Some(network) => {
                *self.lock() = Some(network.ssid.clone());
                WifiStatus::LINK_UP
            }
            None => WifiStatus::LINK_NONET,
        };
        tracing::info!(ssid = %credentials.ssid, status = status.0, "virtual wifi join");
        Ok(status)
    }

    async fn disconnect(&self) -> Result<(), CollaboratorError> {
        if let Some(ssid) = self.lock().take() {
            tracing::info!(%ssid, "virtual wifi left");
        }
        Ok(())
    }
}
