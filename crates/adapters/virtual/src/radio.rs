//! Simulated radio medium shared by every virtual central and peripheral.
//!
//! Peripherals register an advertisement on the [`VirtualAir`]; centrals
//! scanning the air see it, and a connect hands both ends a fresh
//! [`link::VirtualLink`]. Everything lives in-process, so tests and the demo
//! fleet exercise the real protocol code without hardware.

mod central;
mod link;
mod peripheral;

pub use central::VirtualCentral;
pub use link::{VirtualConnection, VirtualSession};
pub use peripheral::VirtualPeripheral;

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{mpsc, oneshot};

use bentech_app::ports::{Advertisement, Advertisements};
use bentech_domain::error::LinkError;
use bentech_domain::profile::ServiceProfile;

use link::VirtualLink;

/// Advertisements buffered per open scan.
const SCAN_BUFFER: usize = 64;

/// Signal strength reported for every virtual advertisement.
const VIRTUAL_RSSI: i16 = -42;

/// Stable address of a virtual radio node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VirtualAddress(u64);

impl fmt::Display for VirtualAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "virtual:{:04x}", self.0)
    }
}

struct Advertiser {
    token: u64,
    profile: ServiceProfile,
    accept: oneshot::Sender<Arc<VirtualLink>>,
}

#[derive(Default)]
struct AirState {
    next_id: u64,
    advertisers: HashMap<VirtualAddress, Advertiser>,
    scanners: HashMap<u64, mpsc::Sender<Advertisement<VirtualAddress>>>,
}

impl AirState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// The shared medium. Cheap to clone; clones share the same air.
#[derive(Clone, Default)]
pub struct VirtualAir {
    state: Arc<Mutex<AirState>>,
}

impl VirtualAir {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, AirState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A new central radio on this air.
    #[must_use]
    pub fn central(&self) -> VirtualCentral {
        let id = self.lock().allocate();
        VirtualCentral::new(self.clone(), id)
    }

    /// A new peripheral radio on this air, with its own stable address.
    #[must_use]
    pub fn peripheral(&self) -> VirtualPeripheral {
        let address = VirtualAddress(self.lock().allocate());
        VirtualPeripheral::new(self.clone(), address)
    }

    /// Names currently advertised, sorted.
    #[must_use]
    pub fn advertised(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .lock()
            .advertisers
            .values()
            .map(|advertiser| advertiser.profile.name)
            .collect();
        names.sort_unstable();
        names
    }

    fn advertise(
        &self,
        address: VirtualAddress,
        profile: ServiceProfile,
    ) -> (u64, oneshot::Receiver<Arc<VirtualLink>>) {
        let (accept, accepted) = oneshot::channel();
        let mut state = self.lock();
        let token = state.allocate();
        state.advertisers.insert(
            address,
            Advertiser {
                token,
                profile,
                accept,
            },
        );
        let advertisement = Advertisement {
            name: Some(profile.name.to_string()),
            handle: address,
            rssi: Some(VIRTUAL_RSSI),
        };
        state
            .scanners
            .retain(|_, scanner| match scanner.try_send(advertisement.clone()) {
                Ok(()) | Err(mpsc::error::TrySendError::Full(_)) => true,
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        (token, accepted)
    }

    /// Remove the advertisement `token` of `address`, unless a newer one
    /// has replaced it.
    fn withdraw(&self, address: VirtualAddress, token: u64) {
        let mut state = self.lock();
        if state
            .advertisers
            .get(&address)
            .is_some_and(|advertiser| advertiser.token == token)
        {
            state.advertisers.remove(&address);
        }
    }

    /// Open a scan fed with every current and future advertisement. The
    /// returned id closes it again, so scans of one central never replace
    /// each other.
    fn scan(&self) -> (u64, Advertisements<VirtualAddress>) {
        let (tx, rx) = mpsc::channel(SCAN_BUFFER);
        let mut state = self.lock();
        let scan = state.allocate();
        for (address, advertiser) in &state.advertisers {
            let _ = tx.try_send(Advertisement {
                name: Some(advertiser.profile.name.to_string()),
                handle: *address,
                rssi: Some(VIRTUAL_RSSI),
            });
        }
        state.scanners.insert(scan, tx);
        (scan, rx)
    }

    fn stop_scan(&self, scan: u64) {
        self.lock().scanners.remove(&scan);
    }

    fn connect(&self, address: VirtualAddress) -> Result<VirtualConnection, LinkError> {
        let Some(advertiser) = self.lock().advertisers.remove(&address) else {
            let reason = format!("{address} is not advertising");
            return Err(LinkError::transport(reason));
        };

        let link = Arc::new(VirtualLink::new(advertiser.profile));
        if advertiser.accept.send(Arc::clone(&link)).is_err() {
            let reason = format!("{address} stopped advertising");
            return Err(LinkError::transport(reason));
        }
        Ok(VirtualConnection::new(link))
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use bentech_app::ports::{CentralLink, GattConnection, InboundSession, PeripheralLink};
    use bentech_domain::profile::{AUTO_FLUSHER, LID_CONTROLLER};

    use super::*;

    #[tokio::test]
    async fn should_report_existing_and_new_advertisers_to_scanner() {
        let air = VirtualAir::new();
        let lid = air.peripheral();
        let flusher = air.peripheral();
        let central = air.central();

        let wait = Duration::from_millis(200);
        let lid_adv = tokio::spawn(async move { lid.advertise(&LID_CONTROLLER, wait).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let mut scan = central.start_scan().await.unwrap();
        let flusher_adv = tokio::spawn(async move { flusher.advertise(&AUTO_FLUSHER, wait).await });

        let first = scan.recv().await.unwrap();
        let second = scan.recv().await.unwrap();
        assert_eq!(first.name.as_deref(), Some("BT-lid-controller"));
        assert_eq!(second.name.as_deref(), Some("BT-auto-flusher"));

        central.stop_scan().await.unwrap();
        let lid_result = lid_adv.await.unwrap();
        let flusher_result = flusher_adv.await.unwrap();
        assert!(matches!(lid_result, Err(LinkError::Timeout)));
        assert!(matches!(flusher_result, Err(LinkError::Timeout)));
        assert!(air.advertised().is_empty());
    }

    #[tokio::test]
    async fn should_feed_overlapping_scans_of_one_central() {
        let air = VirtualAir::new();
        let lid = air.peripheral();
        let central = air.central();

        let mut first = central.start_scan().await.unwrap();
        let mut second = central.start_scan().await.unwrap();
        let wait = Duration::from_millis(200);
        let lid_adv = tokio::spawn(async move { lid.advertise(&LID_CONTROLLER, wait).await });

        let seen = first.recv().await.unwrap();
        assert_eq!(seen.name.as_deref(), Some("BT-lid-controller"));
        let seen = second.recv().await.unwrap();
        assert_eq!(seen.name.as_deref(), Some("BT-lid-controller"));

        central.stop_scan().await.unwrap();
        assert!(first.recv().await.is_none());
        assert!(second.recv().await.is_none());
        let advertised = lid_adv.await.unwrap();
        assert!(matches!(advertised, Err(LinkError::Timeout)));
    }

    #[tokio::test]
    async fn should_hand_both_ends_the_same_link() {
        let air = VirtualAir::new();
        let lid = air.peripheral();
        let central = air.central();

        let wait = Duration::from_secs(1);
        let accept = tokio::spawn(async move { lid.advertise(&LID_CONTROLLER, wait).await });
        let mut scan = central.start_scan().await.unwrap();
        let advertisement = scan.recv().await.unwrap();
        let connection = central.connect(&advertisement.handle).await.unwrap();
        let session = accept.await.unwrap().unwrap();

        assert!(connection.is_connected().await);
        assert!(session.is_connected());
        assert!(air.advertised().is_empty());

        connection.disconnect().await.unwrap();
        assert!(!session.is_connected());
    }

    #[tokio::test]
    async fn should_refuse_connect_to_silent_address() {
        let air = VirtualAir::new();
        let central = air.central();
        let address = air.peripheral().address();

        let result = central.connect(&address).await;
        assert!(matches!(result, Err(LinkError::Transport(_))));
    }
}
