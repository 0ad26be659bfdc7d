use std::time::Duration;

use bentech_app::ports::PeripheralLink;
use bentech_domain::error::LinkError;
use bentech_domain::profile::ServiceProfile;

use super::{VirtualAddress, VirtualAir, VirtualSession};

/// Peripheral radio on a [`VirtualAir`].
#[derive(Clone)]
pub struct VirtualPeripheral {
    air: VirtualAir,
    address: VirtualAddress,
}

/// Withdraws the advertisement when advertising ends for any reason,
/// including the advertising future being dropped.
struct Advertising<'a> {
    air: &'a VirtualAir,
    address: VirtualAddress,
    token: u64,
}

impl Drop for Advertising<'_> {
    fn drop(&mut self) {
        self.air.withdraw(self.address, self.token);
    }
}

impl VirtualPeripheral {
    pub(super) fn new(air: VirtualAir, address: VirtualAddress) -> Self {
        Self { air, address }
    }

    #[must_use]
    pub fn address(&self) -> VirtualAddress {
        self.address
    }
}

impl PeripheralLink for VirtualPeripheral {
    type Session = VirtualSession;

    async fn advertise(
        &self,
        profile: &ServiceProfile,
        timeout: Duration,
    ) -> Result<VirtualSession, LinkError> {
        let (token, accepted) = self.air.advertise(self.address, *profile);
        let _advertising = Advertising {
            air: &self.air,
            address: self.address,
            token,
        };
        match tokio::time::timeout(timeout, accepted).await {
            Ok(Ok(link)) => Ok(VirtualSession::new(link)),
            Ok(Err(_)) => Err(LinkError::transport("advertisement replaced")),
            Err(_) => Err(LinkError::Timeout),
        }
    }
}
