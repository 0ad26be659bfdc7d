//! Device server — the peripheral role.
//!
//! Every peripheral (and the hub, towards the companion application) runs
//! the same state machine:
//!
//! ```text
//!   ┌─────────────┐  central connects   ┌───────────┐
//!   │ Advertising │ ──────────────────▶ │ Listening │
//!   └─────────────┘ ◀────────────────── └───────────┘
//!          ▲  │        disconnect
//!          └──┘ advertise timeout / transport error
//! ```
//!
//! While listening, each control write is decoded through the device's
//! opcode enum and dispatched to its [`CommandHandler`]; the loop waits for
//! the handler before reading the next opcode. Profiles with a stream
//! attribute run a second read loop feeding inbound stream frames to the
//! handler.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use bentech_domain::error::{LinkError, StreamError};
use bentech_domain::profile::ServiceProfile;

use crate::ports::{InboundSession, PeripheralLink};
use crate::streaming::{NotifySink, receive_stream, send_stream};

/// Inbound stream frames buffered between the stream loop and a handler.
const STREAM_BUFFER: usize = 64;

/// Observable state of a [`DeviceServer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    /// Waiting for a central to connect.
    Advertising,
    /// A central is connected and control writes are being served.
    Listening,
}

/// Timing of the server loops.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// How long one advertisement runs before it is restarted.
    pub advertise_timeout: Duration,
    /// Idle read timeout of the control and stream loops.
    pub read_timeout: Duration,
    /// Pause after a transport error before advertising again.
    pub retry_delay: Duration,
    /// Optional guard on each fragment of an inbound stream message.
    pub stream_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            advertise_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(1),
            retry_delay: Duration::from_secs(1),
            stream_timeout: None,
        }
    }
}

/// Per-device command dispatch.
pub trait CommandHandler: Send + Sync {
    /// The device's opcode table.
    type Command: TryFrom<u8, Error = LinkError> + fmt::Debug + Copy + Send;

    /// Execute one command. The server reads the next opcode only once this
    /// returns.
    fn handle<S: InboundSession>(
        &self,
        command: Self::Command,
        exchange: &mut Exchange<'_, S>,
    ) -> impl Future<Output = ()> + Send;
}

/// What a handler may do with the connected central.
pub struct Exchange<'a, S> {
    session: &'a S,
    profile: ServiceProfile,
    frames: Option<mpsc::Receiver<Vec<u8>>>,
    stream_timeout: Option<Duration>,
}

impl<'a, S: InboundSession> Exchange<'a, S> {
    fn new(
        session: &'a S,
        profile: ServiceProfile,
        frames: Option<mpsc::Receiver<Vec<u8>>>,
        stream_timeout: Option<Duration>,
    ) -> Self {
        Self {
            session,
            profile,
            frames,
            stream_timeout,
        }
    }

    #[must_use]
    pub fn session(&self) -> &S {
        self.session
    }

    /// Notify `value` on the response attribute.
    ///
    /// # Errors
    ///
    /// Returns [`LinkError::AttributeNotFound`] when the profile has no
    /// response attribute, or the link error of the notification.
    pub async fn respond(&self, value: &[u8]) -> Result<(), LinkError> {
        let attribute = self.optional_attribute(self.profile.response)?;
        self.session.notify(attribute, value).await
    }

    /// Send `text` as a stream message on the stream attribute.
    ///
    /// # Errors
    ///
    /// Returns a link error when the profile has no stream attribute or a
    /// notification fails.
    pub async fn send_stream(&self, text: &str) -> Result<(), StreamError> {
        let attribute = self.optional_attribute(self.profile.stream)?;
        send_stream(&NotifySink::new(self.session, attribute), text).await
    }

    /// Wait for the next stream message written by the central.
    ///
    /// After a failed message, frames already buffered behind it are
    /// discarded so the next message starts on a header.
    ///
    /// # Errors
    ///
    /// Returns a link error when the profile has no stream attribute or the
    /// central disconnects, or the decoding error of the message.
    pub async fn receive_stream(&mut self) -> Result<String, StreamError> {
        let missing = self.missing_attribute();
        let Some(frames) = self.frames.as_mut() else {
            return Err(missing.into());
        };
        let result = receive_stream(frames, self.stream_timeout).await;
        if result.is_err() {
            let mut dropped = 0_usize;
            while frames.try_recv().is_ok() {
                dropped += 1;
            }
            if dropped > 0 {
                tracing::debug!(dropped, "discarded stale stream frames");
            }
        }
        result
    }

    fn optional_attribute(&self, attribute: Option<Uuid>) -> Result<Uuid, LinkError> {
        attribute.ok_or_else(|| self.missing_attribute())
    }

    fn missing_attribute(&self) -> LinkError {
        LinkError::AttributeNotFound {
            service: self.profile.service,
            attribute: Uuid::nil(),
        }
    }
}

/// Peripheral-role server for one service profile.
pub struct DeviceServer<P, H> {
    link: P,
    profile: ServiceProfile,
    handler: H,
    config: ServerConfig,
    state: watch::Sender<ServerState>,
}

impl<P: PeripheralLink, H: CommandHandler> DeviceServer<P, H> {
    pub fn new(link: P, profile: ServiceProfile, handler: H, config: ServerConfig) -> Self {
        let (state, _) = watch::channel(ServerState::Advertising);
        Self {
            link,
            profile,
            handler,
            config,
            state,
        }
    }

    /// Subscribe to state transitions.
    #[must_use]
    pub fn state(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Serve forever: advertise, serve one central, advertise again.
    ///
    /// Nothing in this loop is fatal; drop the future to stop it.
    #[tracing::instrument(skip(self), fields(device = self.profile.name))]
    pub async fn run(&self) {
        loop {
            self.state.send_replace(ServerState::Advertising);
            let session = match self
                .link
                .advertise(&self.profile, self.config.advertise_timeout)
                .await
            {
                Ok(session) => session,
                Err(LinkError::Timeout) => {
                    tracing::debug!("no central connected, advertising again");
                    continue;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "unable to advertise");
                    tokio::time::sleep(self.config.retry_delay).await;
                    continue;
                }
            };

            tracing::info!("central connected");
            self.state.send_replace(ServerState::Listening);
            self.serve(&session).await;
            tracing::info!("central disconnected");
        }
    }

    async fn serve(&self, session: &P::Session) {
        match self.profile.stream {
            Some(stream) => {
                let (frames_tx, frames_rx) = mpsc::channel(STREAM_BUFFER);
                let exchange = Exchange::new(
                    session,
                    self.profile,
                    Some(frames_rx),
                    self.config.stream_timeout,
                );
                tokio::join!(
                    self.control_loop(session, exchange),
                    self.stream_loop(session, stream, frames_tx),
                );
            }
            None => {
                let exchange = Exchange::new(session, self.profile, None, None);
                self.control_loop(session, exchange).await;
            }
        }
    }

    async fn control_loop(&self, session: &P::Session, mut exchange: Exchange<'_, P::Session>) {
        loop {
            let value = match session
                .written(self.profile.control, self.config.read_timeout)
                .await
            {
                Ok(value) => value,
                Err(LinkError::Timeout) => continue,
                Err(LinkError::NotConnected) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "control read failed");
                    if session.is_connected() {
                        continue;
                    }
                    break;
                }
            };

            let Some(&opcode) = value.first() else {
                tracing::debug!("empty control write");
                continue;
            };
            match H::Command::try_from(opcode) {
                Ok(command) => {
                    tracing::info!(?command, "dispatching command");
                    self.handler.handle(command, &mut exchange).await;
                }
                Err(err) => tracing::warn!(error = %err, "unknown opcode"),
            }
        }
    }

    async fn stream_loop(&self, session: &P::Session, stream: Uuid, frames: mpsc::Sender<Vec<u8>>) {
        loop {
            match session.written(stream, self.config.read_timeout).await {
                Ok(frame) => {
                    if frames.send(frame).await.is_err() {
                        break;
                    }
                }
                Err(LinkError::Timeout) => continue,
                Err(LinkError::NotConnected) => break,
                Err(err) => {
                    tracing::warn!(error = %err, "stream read failed");
                    if !session.is_connected() {
                        break;
                    }
                }
            }
        }
    }
}
