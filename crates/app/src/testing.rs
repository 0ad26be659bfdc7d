//! In-memory fakes for the link ports, shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio_stream::StreamExt as _;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use bentech_domain::error::LinkError;
use bentech_domain::profile::ServiceProfile;

use crate::ports::{
    Advertisement, CentralLink, GattConnection, InboundSession, Notifications, PeripheralLink,
};

/// Ordered record of link activity across every fake.
#[derive(Clone, Debug, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<String>>>);

impl Journal {
    pub(crate) fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

#[derive(Clone, Debug)]
struct Reply {
    attribute: Uuid,
    payload: Vec<u8>,
    delay: Duration,
}

#[derive(Debug)]
struct FakeInner {
    label: String,
    service: Uuid,
    attributes: Mutex<HashSet<Uuid>>,
    connected: AtomicBool,
    service_lookups: AtomicUsize,
    attribute_lookups: AtomicUsize,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    replies: Mutex<HashMap<(Uuid, u8), Reply>>,
    notifier: Mutex<Option<broadcast::Sender<(Uuid, Vec<u8>)>>>,
    journal: Journal,
}

/// A scripted connection: records writes and answers opcodes with
/// configured notifications.
#[derive(Clone, Debug)]
pub(crate) struct FakeConnection {
    inner: Arc<FakeInner>,
}

impl FakeConnection {
    pub(crate) fn new(service: Uuid, attributes: &[Uuid]) -> Self {
        Self::labelled("fake", service, attributes, Journal::default())
    }

    pub(crate) fn for_profile(profile: &ServiceProfile, journal: Journal) -> Self {
        let attributes: Vec<Uuid> = profile.attributes().collect();
        Self::labelled(profile.name, profile.service, &attributes, journal)
    }

    fn labelled(label: &str, service: Uuid, attributes: &[Uuid], journal: Journal) -> Self {
        let (notifier, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(FakeInner {
                label: label.to_string(),
                service,
                attributes: Mutex::new(attributes.iter().copied().collect()),
                connected: AtomicBool::new(true),
                service_lookups: AtomicUsize::new(0),
                attribute_lookups: AtomicUsize::new(0),
                writes: Mutex::new(Vec::new()),
                replies: Mutex::new(HashMap::new()),
                notifier: Mutex::new(Some(notifier)),
                journal,
            }),
        }
    }

    pub(crate) fn expose(&self, attribute: Uuid) {
        self.inner.attributes.lock().unwrap().insert(attribute);
    }

    pub(crate) fn hide(&self, attribute: Uuid) {
        self.inner.attributes.lock().unwrap().remove(&attribute);
    }

    /// Notify `payload` on `attribute` after `delay` whenever `opcode` is
    /// written to `control`.
    pub(crate) fn reply(
        &self,
        control: Uuid,
        opcode: u8,
        attribute: Uuid,
        payload: &[u8],
        delay: Duration,
    ) {
        self.inner.replies.lock().unwrap().insert(
            (control, opcode),
            Reply {
                attribute,
                payload: payload.to_vec(),
                delay,
            },
        );
    }

    pub(crate) fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.inner.writes.lock().unwrap().clone()
    }

    pub(crate) fn service_lookups(&self) -> usize {
        self.inner.service_lookups.load(Ordering::SeqCst)
    }

    pub(crate) fn attribute_lookups(&self) -> usize {
        self.inner.attribute_lookups.load(Ordering::SeqCst)
    }

    /// Simulate the peripheral vanishing: writes fail and open
    /// notification streams end.
    pub(crate) fn drop_link(&self) {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.notifier.lock().unwrap().take();
    }

    fn restore_link(&self) {
        let (notifier, _) = broadcast::channel(16);
        *self.inner.notifier.lock().unwrap() = Some(notifier);
        self.inner.connected.store(true, Ordering::SeqCst);
    }

    fn emit(&self, attribute: Uuid, payload: Vec<u8>) {
        let sender = self.inner.notifier.lock().unwrap().clone();
        if let Some(sender) = sender {
            self.inner
                .journal
                .push(format!("notify:{}:{:?}", self.inner.label, payload));
            let _ = sender.send((attribute, payload));
        }
    }
}

impl GattConnection for FakeConnection {
    type Service = Uuid;
    type Attribute = Uuid;

    async fn is_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn service(&self, id: Uuid) -> Result<Option<Uuid>, LinkError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        self.inner.service_lookups.fetch_add(1, Ordering::SeqCst);
        Ok((id == self.inner.service).then_some(id))
    }

    async fn attribute(&self, _service: &Uuid, id: Uuid) -> Result<Option<Uuid>, LinkError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        self.inner.attribute_lookups.fetch_add(1, Ordering::SeqCst);
        let known = self.inner.attributes.lock().unwrap().contains(&id);
        Ok(known.then_some(id))
    }

    async fn write(&self, attribute: &Uuid, value: &[u8]) -> Result<(), LinkError> {
        if !self.inner.connected.load(Ordering::SeqCst) {
            return Err(LinkError::NotConnected);
        }
        self.inner
            .journal
            .push(format!("write:{}:{:?}", self.inner.label, value));
        self.inner
            .writes
            .lock()
            .unwrap()
            .push((*attribute, value.to_vec()));

        let reply = value.first().and_then(|opcode| {
            self.inner
                .replies
                .lock()
                .unwrap()
                .get(&(*attribute, *opcode))
                .cloned()
        });
        if let Some(reply) = reply {
            if reply.delay.is_zero() {
                self.emit(reply.attribute, reply.payload);
            } else {
                let this = self.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(reply.delay).await;
                    this.emit(reply.attribute, reply.payload);
                });
            }
        }
        Ok(())
    }

    async fn subscribe(&self, attribute: &Uuid) -> Result<Notifications, LinkError> {
        let receiver = self
            .inner
            .notifier
            .lock()
            .unwrap()
            .as_ref()
            .map(broadcast::Sender::subscribe)
            .ok_or(LinkError::NotConnected)?;
        let attribute = *attribute;
        let stream = BroadcastStream::new(receiver).filter_map(move |item| match item {
            Ok((target, value)) if target == attribute => Some(value),
            _ => None,
        });
        Ok(Notifications::new(stream))
    }

    async fn disconnect(&self) -> Result<(), LinkError> {
        self.inner
            .journal
            .push(format!("disconnect:{}", self.inner.label));
        self.drop_link();
        Ok(())
    }
}

/// A scripted central: advertises a fixed set of peripherals.
#[derive(Debug, Default)]
pub(crate) struct FakeCentral {
    advertisements: Mutex<Vec<Advertisement<u32>>>,
    peers: Mutex<HashMap<u32, FakeConnection>>,
    connect_delay: Duration,
    scans: AtomicUsize,
    journal: Journal,
}

impl FakeCentral {
    pub(crate) fn new(journal: Journal) -> Self {
        Self {
            journal,
            ..Self::default()
        }
    }

    pub(crate) fn with_connect_delay(mut self, delay: Duration) -> Self {
        self.connect_delay = delay;
        self
    }

    pub(crate) fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Add an advertising peripheral exposing every attribute of `profile`.
    pub(crate) fn add(&self, profile: &ServiceProfile) -> FakeConnection {
        let connection = FakeConnection::for_profile(profile, self.journal.clone());
        let mut peers = self.peers.lock().unwrap();
        let handle = u32::try_from(peers.len()).unwrap();
        peers.insert(handle, connection.clone());
        self.advertisements.lock().unwrap().push(Advertisement {
            name: Some(profile.name.to_string()),
            handle,
            rssi: Some(-50),
        });
        connection
    }

    /// Add an advertisement that does not answer connects.
    pub(crate) fn add_stranger(&self, name: &str) {
        let handle = 1000 + u32::try_from(self.advertisements.lock().unwrap().len()).unwrap();
        self.advertisements.lock().unwrap().push(Advertisement {
            name: Some(name.to_string()),
            handle,
            rssi: None,
        });
    }

    pub(crate) fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl CentralLink for FakeCentral {
    type Handle = u32;
    type Connection = FakeConnection;

    async fn start_scan(&self) -> Result<mpsc::Receiver<Advertisement<u32>>, LinkError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        // Starting a scan is never instantaneous on a real radio.
        tokio::task::yield_now().await;
        let advertisements = self.advertisements.lock().unwrap().clone();
        let (tx, rx) = mpsc::channel(advertisements.len().max(1));
        for advertisement in advertisements {
            let _ = tx.try_send(advertisement);
        }
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), LinkError> {
        Ok(())
    }

    async fn connect(&self, handle: &u32) -> Result<FakeConnection, LinkError> {
        self.journal.push(format!("connect-start:{handle}"));
        if !self.connect_delay.is_zero() {
            tokio::time::sleep(self.connect_delay).await;
        }
        let connection = self.peers.lock().unwrap().get(handle).cloned();
        self.journal.push(format!("connect-end:{handle}"));
        let connection = connection.ok_or_else(|| LinkError::transport("peer refused"))?;
        connection.restore_link();
        Ok(connection)
    }
}

/// A peripheral radio handing out pre-arranged inbound sessions.
#[derive(Debug)]
pub(crate) struct FakePeripheral {
    offered: mpsc::UnboundedSender<FakeSession>,
    pending: tokio::sync::Mutex<mpsc::UnboundedReceiver<FakeSession>>,
    advertisements: Arc<AtomicUsize>,
}

impl Default for FakePeripheral {
    fn default() -> Self {
        let (offered, pending) = mpsc::unbounded_channel();
        Self {
            offered,
            pending: tokio::sync::Mutex::new(pending),
            advertisements: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl FakePeripheral {
    /// Queue a central that connects on the next advertisement.
    pub(crate) fn offer(&self, profile: &ServiceProfile) -> FakeRemote {
        let (connected_tx, connected_rx) = watch::channel(true);
        let (notified_tx, notified_rx) = mpsc::unbounded_channel();
        let mut writers = HashMap::new();
        let mut inbound = HashMap::new();
        for attribute in profile.writable() {
            let (tx, rx) = mpsc::unbounded_channel();
            writers.insert(attribute, tx);
            inbound.insert(attribute, tokio::sync::Mutex::new(rx));
        }
        let _ = self.offered.send(FakeSession {
            inbound,
            connected: connected_rx,
            notified: notified_tx,
        });
        FakeRemote {
            writers,
            connected: connected_tx,
            notified: notified_rx,
        }
    }

    pub(crate) fn advertisements(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.advertisements)
    }
}

impl PeripheralLink for FakePeripheral {
    type Session = FakeSession;

    async fn advertise(
        &self,
        _profile: &ServiceProfile,
        timeout: Duration,
    ) -> Result<FakeSession, LinkError> {
        self.advertisements.fetch_add(1, Ordering::SeqCst);
        let mut pending = self.pending.lock().await;
        match tokio::time::timeout(timeout, pending.recv()).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(LinkError::transport("radio closed")),
            Err(_) => Err(LinkError::Timeout),
        }
    }
}

/// Peripheral end of a fake inbound connection.
#[derive(Debug)]
pub(crate) struct FakeSession {
    inbound: HashMap<Uuid, tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
    connected: watch::Receiver<bool>,
    notified: mpsc::UnboundedSender<(Uuid, Vec<u8>)>,
}

impl InboundSession for FakeSession {
    fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    async fn written(&self, attribute: Uuid, timeout: Duration) -> Result<Vec<u8>, LinkError> {
        let Some(inbound) = self.inbound.get(&attribute) else {
            return Err(LinkError::AttributeNotFound {
                service: Uuid::nil(),
                attribute,
            });
        };
        let mut inbound = inbound.lock().await;
        let mut connected = self.connected.clone();
        tokio::select! {
            value = inbound.recv() => value.ok_or(LinkError::NotConnected),
            _ = connected.wait_for(|up| !*up) => Err(LinkError::NotConnected),
            () = tokio::time::sleep(timeout) => Err(LinkError::Timeout),
        }
    }

    async fn notify(&self, attribute: Uuid, value: &[u8]) -> Result<(), LinkError> {
        if !self.is_connected() {
            return Err(LinkError::NotConnected);
        }
        self.notified
            .send((attribute, value.to_vec()))
            .map_err(|_| LinkError::NotConnected)
    }
}

/// Central end of a fake inbound connection, driven by the test.
#[derive(Debug)]
pub(crate) struct FakeRemote {
    writers: HashMap<Uuid, mpsc::UnboundedSender<Vec<u8>>>,
    connected: watch::Sender<bool>,
    notified: mpsc::UnboundedReceiver<(Uuid, Vec<u8>)>,
}

impl FakeRemote {
    pub(crate) fn write(&self, attribute: Uuid, value: &[u8]) {
        self.writers[&attribute].send(value.to_vec()).unwrap();
    }

    pub(crate) async fn notified(&mut self) -> Option<(Uuid, Vec<u8>)> {
        tokio::time::timeout(Duration::from_secs(1), self.notified.recv())
            .await
            .ok()
            .flatten()
    }

    pub(crate) fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    pub(crate) fn disconnect(&self) {
        self.connected.send_replace(false);
    }
}
