//! Streaming extension — payloads larger than one attribute write.
//!
//! A message is delivered as a 4-byte big-endian fragment count followed by
//! that many fragments of at most 20 bytes. Delivery relies on the link's
//! in-order guarantee; there is no per-fragment acknowledgement.
//!
//! The same framing runs over both roles: a peripheral notifies fragments and
//! reads the central's writes, a central writes fragments and reads
//! notifications.

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc;
use uuid::Uuid;

use bentech_domain::error::{LinkError, StreamError};
use bentech_domain::stream::{StreamAssembler, StreamFrames};

use crate::ports::{GattConnection, InboundSession, Notifications};

/// Something frames can be delivered to.
pub trait FrameSink: Send + Sync {
    fn deliver(&self, frame: &[u8]) -> impl Future<Output = Result<(), LinkError>> + Send;
}

/// Something frames arrive from, in order.
pub trait FrameSource: Send {
    /// Wait for the next frame. Fails with [`LinkError::NotConnected`] once
    /// the underlying link is gone.
    fn next_frame(&mut self) -> impl Future<Output = Result<Vec<u8>, LinkError>> + Send;
}

/// Send `text` as a framed stream message.
///
/// # Errors
///
/// Returns the link error of the first failed delivery.
pub async fn send_stream<S: FrameSink>(sink: &S, text: &str) -> Result<(), StreamError> {
    let frames = StreamFrames::encode(text);
    tracing::debug!(
        bytes = text.len(),
        fragments = frames.len(),
        "sending stream"
    );
    sink.deliver(&frames.header()).await?;
    for fragment in frames.fragments() {
        sink.deliver(fragment).await?;
    }
    Ok(())
}

/// Receive one framed stream message.
///
/// Without `fragment_timeout` this waits forever for missing fragments.
///
/// # Errors
///
/// Returns [`StreamError::ShortHeader`] for a header under 4 bytes,
/// [`StreamError::OversizedFragment`] for a fragment over 20 bytes,
/// [`StreamError::InvalidUtf8`] when the payload is not text, or a link
/// error, including [`LinkError::Timeout`] when a fragment did not arrive
/// within `fragment_timeout`.
pub async fn receive_stream<S: FrameSource>(
    source: &mut S,
    fragment_timeout: Option<Duration>,
) -> Result<String, StreamError> {
    let header = next_frame(source, fragment_timeout).await?;
    let mut assembler = StreamAssembler::from_header(&header)?;
    tracing::debug!(fragments = assembler.expected(), "receiving stream");
    while !assembler.is_complete() {
        let fragment = next_frame(source, fragment_timeout).await?;
        assembler.push(&fragment)?;
    }
    assembler.finish()
}

async fn next_frame<S: FrameSource>(
    source: &mut S,
    timeout: Option<Duration>,
) -> Result<Vec<u8>, LinkError> {
    match timeout {
        Some(timeout) => tokio::time::timeout(timeout, source.next_frame())
            .await
            .map_err(|_| LinkError::Timeout)?,
        None => source.next_frame().await,
    }
}

impl FrameSource for mpsc::Receiver<Vec<u8>> {
    async fn next_frame(&mut self) -> Result<Vec<u8>, LinkError> {
        self.recv().await.ok_or(LinkError::NotConnected)
    }
}

/// Peripheral side: frames are notified on the stream attribute.
pub struct NotifySink<'a, S> {
    session: &'a S,
    attribute: Uuid,
}

impl<'a, S: InboundSession> NotifySink<'a, S> {
    pub fn new(session: &'a S, attribute: Uuid) -> Self {
        Self { session, attribute }
    }
}

impl<S: InboundSession> FrameSink for NotifySink<'_, S> {
    async fn deliver(&self, frame: &[u8]) -> Result<(), LinkError> {
        self.session.notify(self.attribute, frame).await
    }
}

/// Central side: frames are written to the stream attribute and read back
/// from its notifications.
pub struct CentralStream<G: GattConnection> {
    connection: G,
    attribute: G::Attribute,
    notifications: Notifications,
}

impl<G: GattConnection> CentralStream<G> {
    /// Subscribe to the stream attribute of `connection`.
    ///
    /// # Errors
    ///
    /// Returns the link error raised while subscribing.
    pub async fn open(connection: G, attribute: G::Attribute) -> Result<Self, LinkError> {
        let notifications = connection.subscribe(&attribute).await?;
        Ok(Self {
            connection,
            attribute,
            notifications,
        })
    }
}

impl<G: GattConnection> FrameSink for CentralStream<G> {
    async fn deliver(&self, frame: &[u8]) -> Result<(), LinkError> {
        self.connection.write(&self.attribute, frame).await
    }
}

impl<G: GattConnection> FrameSource for CentralStream<G> {
    async fn next_frame(&mut self) -> Result<Vec<u8>, LinkError> {
        self.notifications
            .next()
            .await
            .ok_or(LinkError::NotConnected)
    }
}
