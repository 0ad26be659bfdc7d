//! BLE adapter error types.

use bentech_domain::error::LinkError;

/// Errors specific to the BLE adapter.
#[derive(Debug, thiserror::Error)]
pub enum BleError {
    /// No BLE adapter found on the host.
    #[error("no BLE adapter available")]
    NotAvailable,

    /// A btleplug operation failed.
    #[error("BLE operation failed")]
    Btleplug(#[from] btleplug::Error),

    /// The peripheral did not accept the connection in time.
    #[error("BLE connect timed out")]
    ConnectTimeout,
}

impl BleError {
    /// Convert into a [`LinkError`] for propagation across port boundaries.
    #[must_use]
    pub fn into_link(self) -> LinkError {
        match self {
            Self::Btleplug(btleplug::Error::NotConnected) => LinkError::NotConnected,
            Self::Btleplug(btleplug::Error::TimedOut(_)) | Self::ConnectTimeout => {
                LinkError::Timeout
            }
            other => LinkError::transport(other),
        }
    }
}

impl From<BleError> for LinkError {
    fn from(err: BleError) -> Self {
        err.into_link()
    }
}
