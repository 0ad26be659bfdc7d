//! BLE central — scanning and connecting through btleplug.

use btleplug::api::{Central as _, CentralEvent, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_stream::StreamExt as _;

use bentech_app::ports::{Advertisement, CentralLink};
use bentech_domain::error::LinkError;
use bentech_domain::profile::DOWNSTREAM;

use crate::config::BleConfig;
use crate::error::BleError;
use crate::gatt::BtleplugConnection;

/// Advertisements buffered between the event task and the hub.
const SCAN_BUFFER: usize = 32;

/// The host's BLE adapter acting as a central.
pub struct BtleplugCentral {
    adapter: Adapter,
    config: BleConfig,
    scan_task: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugCentral {
    /// Open the configured host adapter.
    ///
    /// # Errors
    ///
    /// Returns [`BleError::NotAvailable`] when the host has no such adapter,
    /// or the btleplug error raised while listing adapters.
    pub async fn new(config: BleConfig) -> Result<Self, BleError> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .nth(config.adapter_index)
            .ok_or(BleError::NotAvailable)?;
        if let Ok(info) = adapter.adapter_info().await {
            tracing::info!(adapter = %info, "BLE adapter ready");
        }
        Ok(Self {
            adapter,
            config,
            scan_task: Mutex::new(None),
        })
    }

    fn scan_filter(&self) -> ScanFilter {
        if self.config.filter_services {
            ScanFilter {
                services: DOWNSTREAM.iter().map(|profile| profile.service).collect(),
            }
        } else {
            ScanFilter::default()
        }
    }
}

/// Forward discovery events as advertisements until the receiver is gone.
async fn forward_advertisements(
    adapter: Adapter,
    mut events: std::pin::Pin<Box<dyn tokio_stream::Stream<Item = CentralEvent> + Send>>,
    tx: mpsc::Sender<Advertisement<PeripheralId>>,
) {
    while let Some(event) = events.next().await {
        let id = match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
            _ => continue,
        };
        let Ok(peripheral) = adapter.peripheral(&id).await else {
            continue;
        };
        let Ok(Some(props)) = peripheral.properties().await else {
            continue;
        };
        tracing::trace!(address = %props.address, name = ?props.local_name, "BLE device detected");
        let advertisement = Advertisement {
            name: props.local_name,
            handle: id,
            rssi: props.rssi,
        };
        if tx.send(advertisement).await.is_err() {
            break;
        }
    }
}

impl CentralLink for BtleplugCentral {
    type Handle = PeripheralId;
    type Connection = BtleplugConnection;

    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement<PeripheralId>>, LinkError> {
        let events = self.adapter.events().await.map_err(BleError::from)?;
        self.adapter
            .start_scan(self.scan_filter())
            .await
            .map_err(BleError::from)?;

        let (tx, rx) = mpsc::channel(SCAN_BUFFER);
        let task = tokio::spawn(forward_advertisements(self.adapter.clone(), events, tx));
        if let Some(previous) = self.scan_task.lock().await.replace(task) {
            previous.abort();
        }
        tracing::debug!("BLE scan started");
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), LinkError> {
        if let Some(task) = self.scan_task.lock().await.take() {
            task.abort();
        }
        self.adapter.stop_scan().await.map_err(BleError::from)?;
        tracing::debug!("BLE scan stopped");
        Ok(())
    }

    async fn connect(&self, handle: &PeripheralId) -> Result<BtleplugConnection, LinkError> {
        let peripheral = self
            .adapter
            .peripheral(handle)
            .await
            .map_err(BleError::from)?;

        tokio::time::timeout(self.config.connect_timeout(), peripheral.connect())
            .await
            .map_err(|_| BleError::ConnectTimeout)?
            .map_err(BleError::from)?;
        peripheral
            .discover_services()
            .await
            .map_err(BleError::from)?;

        Ok(BtleplugConnection::new(peripheral))
    }
}
