use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bentech_app::ports::{Advertisements, CentralLink};
use bentech_domain::error::LinkError;

use super::{VirtualAddress, VirtualAir, VirtualConnection};

/// Central radio on a [`VirtualAir`].
#[derive(Clone)]
pub struct VirtualCentral {
    air: VirtualAir,
    id: u64,
    scans: Arc<Mutex<Vec<u64>>>,
}

impl VirtualCentral {
    pub(super) fn new(air: VirtualAir, id: u64) -> Self {
        Self {
            air,
            id,
            scans: Arc::default(),
        }
    }

    fn scans(&self) -> MutexGuard<'_, Vec<u64>> {
        self.scans.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CentralLink for VirtualCentral {
    type Handle = VirtualAddress;
    type Connection = VirtualConnection;

    async fn start_scan(&self) -> Result<Advertisements<VirtualAddress>, LinkError> {
        let (scan, advertisements) = self.air.scan();
        self.scans().push(scan);
        tracing::debug!(central = self.id, scan, "virtual scan started");
        Ok(advertisements)
    }

    /// Close every scan this central opened.
    async fn stop_scan(&self) -> Result<(), LinkError> {
        let scans = std::mem::take(&mut *self.scans());
        for scan in scans {
            self.air.stop_scan(scan);
        }
        Ok(())
    }

    async fn connect(&self, handle: &VirtualAddress) -> Result<VirtualConnection, LinkError> {
        let connection = self.air.connect(*handle)?;
        tracing::debug!(
            central = self.id,
            peer = connection.peer_name(),
            "virtual link opened"
        );
        Ok(connection)
    }
}
