//! Hub orchestrator — composes the four device managers, the occupancy
//! monitor and the companion-facing device server.
//!
//! The hub owns every manager; its loops borrow them. After an initial
//! discovery and sequential connect phase, [`Hub::run`] drives three loops
//! concurrently: device control (reacting to occupancy edges), the companion
//! application server, and the occupancy monitor.
//!
//! Link failures surface to the hub as [`LinkError`]s. Failures that indicate
//! a lost peripheral trigger a rescan; everything else is logged and ignored.

mod companion;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use bentech_domain::error::LinkError;
use bentech_domain::occupancy::OccupancyEvent;
use bentech_domain::profile::HUB;
use bentech_domain::session::{HubInfo, HubSession, WifiCredentials, WifiStatus};
use bentech_domain::usage::{self, Timestamp, UsageReport};

use crate::managers::{AutoFlusher, ControllableManager, Deodorizer, LidController, PaperObserver};
use crate::occupancy::monitor_occupancy;
use crate::ports::{CentralLink, OccupancySensor, PeripheralLink, UsageReporter, WifiNetwork};
use crate::server::{DeviceServer, ServerConfig};

pub use companion::Companion;

/// Occupancy events buffered between the monitor and the control loop.
const EVENT_BUFFER: usize = 16;

/// Timing of the hub loops.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Upper bound of one discovery pass.
    pub scan_window: Duration,
    /// Optional bound on awaited exchanges (lid close, roll count).
    pub exchange_timeout: Option<Duration>,
    /// Occupancy sensor sampling period.
    pub occupancy_poll: Duration,
    /// Companion-facing device server timing.
    pub server: ServerConfig,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            scan_window: Duration::from_secs(10),
            exchange_timeout: None,
            occupancy_poll: Duration::from_millis(100),
            server: ServerConfig::default(),
        }
    }
}

/// The hub node.
pub struct Hub<C: CentralLink, W, R> {
    central: Arc<C>,
    lid: LidController<C>,
    paper: PaperObserver<C>,
    flusher: AutoFlusher<C>,
    deodorizer: Deodorizer<C>,
    wifi: W,
    reporter: R,
    session: Mutex<HubSession>,
    discovery: Mutex<()>,
    config: HubConfig,
}

impl<C, W, R> Hub<C, W, R>
where
    C: CentralLink,
    W: WifiNetwork,
    R: UsageReporter,
{
    pub fn new(central: C, wifi: W, reporter: R, config: HubConfig) -> Self {
        let central = Arc::new(central);
        Self {
            lid: LidController::new(Arc::clone(&central)),
            paper: PaperObserver::new(Arc::clone(&central)),
            flusher: AutoFlusher::new(Arc::clone(&central)),
            deodorizer: Deodorizer::new(Arc::clone(&central)),
            central,
            wifi,
            reporter,
            session: Mutex::new(HubSession::default()),
            discovery: Mutex::new(()),
            config,
        }
    }

    /// The downstream managers, in connect order.
    pub fn managers(&self) -> [&ControllableManager<C>; 4] {
        [
            self.lid.manager(),
            self.paper.manager(),
            self.flusher.manager(),
            self.deodorizer.manager(),
        ]
    }

    #[must_use]
    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    async fn all_bound(&self) -> bool {
        for manager in self.managers() {
            if !manager.is_bound().await {
                return false;
            }
        }
        true
    }

    /// Scan once, bounded by the scan window, binding every manager whose
    /// identity is advertised. Stops early once all four are bound; does
    /// not scan at all when they already are.
    ///
    /// Concurrent calls run one after the other, so a rescan never overlaps
    /// a scan already in progress.
    #[tracing::instrument(skip(self))]
    pub async fn discover(&self) {
        let _scanning = self.discovery.lock().await;
        if self.all_bound().await {
            tracing::debug!("every peripheral already discovered");
            return;
        }

        let mut advertisements = match self.central.start_scan().await {
            Ok(advertisements) => advertisements,
            Err(err) => {
                tracing::warn!(%err, "unable to start scan");
                return;
            }
        };

        let deadline = tokio::time::Instant::now() + self.config.scan_window;
        while tokio::time::Instant::now() < deadline {
            let remaining = deadline - tokio::time::Instant::now();
            match tokio::time::timeout(remaining, advertisements.recv()).await {
                Ok(Some(advertisement)) => {
                    tracing::trace!(
                        name = ?advertisement.name,
                        rssi = ?advertisement.rssi,
                        "advertisement"
                    );
                    for manager in self.managers() {
                        if manager.scan_match(&advertisement).await {
                            break;
                        }
                    }
                    if self.all_bound().await {
                        tracing::info!("every peripheral discovered");
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            }
        }

        if let Err(err) = self.central.stop_scan().await {
            tracing::warn!(%err, "unable to stop scan");
        }
    }

    /// Connect every discovered peripheral, one after the other.
    ///
    /// Each connect completes before the next starts; undiscovered or
    /// already connected peripherals are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn connect_all(&self) {
        for manager in self.managers() {
            manager.connect().await;
        }
    }

    /// Initial discovery followed by sequential connects.
    pub async fn start(&self) {
        self.discover().await;
        self.connect_all().await;
    }

    /// Rediscover unbound peripherals and reconnect every dropped one.
    #[tracing::instrument(skip(self))]
    pub async fn rescan(&self) {
        tracing::info!("rescanning peripherals");
        self.start().await;
    }

    /// Run the initial phase, then the three hub loops until the future is
    /// dropped.
    ///
    /// Without a peripheral radio the companion application loop is
    /// disabled.
    pub async fn run<P, S>(&self, peripheral: Option<P>, mut sensor: S)
    where
        P: PeripheralLink,
        S: OccupancySensor,
    {
        self.start().await;

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let companion = async {
            match peripheral {
                Some(link) => {
                    let server = DeviceServer::new(
                        link,
                        HUB,
                        Companion::new(self),
                        self.config.server.clone(),
                    );
                    server.run().await;
                }
                None => {
                    tracing::warn!("no peripheral radio, companion application disabled");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::join!(
            self.control_loop(events_rx),
            companion,
            monitor_occupancy(&mut sensor, events_tx, self.config.occupancy_poll),
        );
    }

    async fn control_loop(&self, mut events: mpsc::Receiver<OccupancyEvent>) {
        let mut visit_started = None;
        while let Some(event) = events.recv().await {
            match event {
                OccupancyEvent::Started => {
                    visit_started = Some(usage::now());
                    self.on_motion_start().await;
                }
                OccupancyEvent::Ended => {
                    let started_at = visit_started.take().unwrap_or_else(usage::now);
                    self.on_motion_end(started_at).await;
                }
            }
        }
    }

    /// Open the lid and start observing paper usage, together.
    #[tracing::instrument(skip(self))]
    pub async fn on_motion_start(&self) {
        let (opened, started) = tokio::join!(self.lid.try_open(), self.paper.try_start());

        let mut lost = false;
        check(self.lid.manager(), opened, &mut lost);
        check(self.paper.manager(), started, &mut lost);
        if lost {
            self.rescan().await;
        }
    }

    /// Close the lid and collect the roll count together, then flush and
    /// spray together, then report the visit.
    #[tracing::instrument(skip(self))]
    pub async fn on_motion_end(&self, started_at: Timestamp) {
        let (closed, rolls) = tokio::join!(
            self.bounded(self.lid.try_close()),
            self.bounded(self.paper.try_stop()),
        );

        let mut lost = false;
        check(self.lid.manager(), closed, &mut lost);
        let rolls = check(self.paper.manager(), rolls, &mut lost).flatten();

        let (flushed, sprayed) =
            tokio::join!(self.flusher.try_flush(), self.deodorizer.try_spray());
        check(self.flusher.manager(), flushed, &mut lost);
        check(self.deodorizer.manager(), sprayed, &mut lost);

        let report = UsageReport {
            started_at,
            ended_at: usage::now(),
            rolls,
            subscription: self.session.lock().await.subscription().cloned(),
        };
        tracing::info!(
            duration_secs = report.duration().as_secs(),
            rolls = ?report.rolls,
            "visit complete"
        );
        if let Err(err) = self.reporter.report(report).await {
            tracing::warn!(%err, "unable to report usage");
        }

        if lost {
            self.rescan().await;
        }
    }

    /// Apply the configured exchange timeout, if any.
    async fn bounded<T>(
        &self,
        exchange: impl Future<Output = Result<T, LinkError>>,
    ) -> Result<T, LinkError> {
        match self.config.exchange_timeout {
            Some(limit) => tokio::time::timeout(limit, exchange)
                .await
                .map_err(|_| LinkError::Timeout)?,
            None => exchange.await,
        }
    }

    /// Snapshot of the session and of downstream connectivity.
    pub async fn info(&self) -> HubInfo {
        let mut connected = Vec::new();
        for manager in self.managers() {
            if manager.is_connected().await {
                connected.push(manager.name().to_string());
            }
        }
        self.session.lock().await.info(connected)
    }

    /// Join a Wi-Fi network and record the outcome.
    #[tracing::instrument(skip(self, credentials), fields(ssid = %credentials.ssid))]
    pub async fn connect_wifi(&self, credentials: &WifiCredentials) -> WifiStatus {
        let status = match self.wifi.connect(credentials).await {
            Ok(status) => status,
            Err(err) => {
                tracing::warn!(%err, "wifi unavailable");
                WifiStatus::LINK_FAIL
            }
        };
        tracing::info!(status = status.0, "wifi connect finished");
        self.session.lock().await.record_wifi(status);
        status
    }

    /// Leave the Wi-Fi network.
    pub async fn disconnect_wifi(&self) {
        if let Err(err) = self.wifi.disconnect().await {
            tracing::warn!(%err, "unable to disconnect wifi");
        }
        self.session.lock().await.record_wifi_disconnected();
        tracing::info!("wifi disconnected");
    }

    /// Replace the push subscription; `null` clears it.
    pub async fn set_subscription(&self, token: serde_json::Value) {
        self.session.lock().await.set_subscription(token);
        tracing::info!("subscription updated");
    }

    /// Close every downstream connection.
    pub async fn shutdown(&self) {
        for manager in self.managers() {
            manager.disconnect().await;
        }
    }
}

/// Log a failed exchange and note whether the peripheral looks lost.
fn check<C: CentralLink, T>(
    manager: &ControllableManager<C>,
    result: Result<T, LinkError>,
    lost: &mut bool,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            tracing::warn!(device = manager.name(), %err, "exchange failed");
            *lost |= err.is_recoverable_by_rescan();
            None
        }
    }
}
