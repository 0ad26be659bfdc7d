//! Scripted companion application: the central that provisions and queries
//! the hub over its control, response and stream attributes.

use std::time::Duration;

use uuid::Uuid;

use bentech_app::attribute::AttributeCache;
use bentech_app::ports::{CentralLink, GattConnection, Notifications};
use bentech_app::streaming::{CentralStream, receive_stream, send_stream};
use bentech_domain::error::{LinkError, StreamError};
use bentech_domain::opcode::HubCommand;
use bentech_domain::profile::HUB;
use bentech_domain::session::{HubInfo, WifiCredentials, WifiStatus};

/// Failures of a scripted companion session.
#[derive(Debug, thiserror::Error)]
pub enum CompanionError {
    /// No hub advertisement was seen within the scan window.
    #[error("hub not found")]
    HubNotFound,

    #[error("hub link error")]
    Link(#[from] LinkError),

    #[error("hub stream error")]
    Stream(#[from] StreamError),

    /// The hub streamed something that is not the expected JSON document.
    #[error("malformed hub payload")]
    Payload(#[from] serde_json::Error),

    /// The Wi-Fi status notification did not carry exactly 4 bytes.
    #[error("wifi status must be 4 bytes, got {0}")]
    BadStatus(usize),
}

/// A connected companion application.
pub struct CompanionClient<G: GattConnection> {
    connection: G,
    control: G::Attribute,
    responses: Notifications,
    stream: CentralStream<G>,
    reply_timeout: Duration,
}

fn hub_attribute(attribute: Option<Uuid>) -> Result<Uuid, LinkError> {
    attribute.ok_or(LinkError::AttributeNotFound {
        service: HUB.service,
        attribute: Uuid::nil(),
    })
}

async fn find_hub<C: CentralLink>(
    central: &C,
    scan_window: Duration,
) -> Result<C::Handle, CompanionError> {
    let mut advertisements = central.start_scan().await?;
    let deadline = tokio::time::Instant::now() + scan_window;
    let mut found = None;
    while found.is_none() {
        match tokio::time::timeout_at(deadline, advertisements.recv()).await {
            Ok(Some(advertisement)) if advertisement.name.as_deref() == Some(HUB.name) => {
                found = Some(advertisement.handle);
            }
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    central.stop_scan().await?;
    found.ok_or(CompanionError::HubNotFound)
}

impl<G: GattConnection> CompanionClient<G> {
    /// Scan for the hub, connect, and arm notifications on the response and
    /// stream attributes.
    ///
    /// # Errors
    ///
    /// Returns [`CompanionError::HubNotFound`] when the hub did not advertise
    /// within `scan_window`, or the link error raised while connecting.
    pub async fn connect<C>(central: &C, scan_window: Duration) -> Result<Self, CompanionError>
    where
        C: CentralLink<Connection = G>,
    {
        let handle = find_hub(central, scan_window).await?;
        let connection = central.connect(&handle).await?;

        let mut cache = AttributeCache::default();
        let control = cache.resolve(&connection, HUB.service, HUB.control).await?;
        let response = cache
            .resolve(&connection, HUB.service, hub_attribute(HUB.response)?)
            .await?;
        let stream = cache
            .resolve(&connection, HUB.service, hub_attribute(HUB.stream)?)
            .await?;

        let responses = connection.subscribe(&response).await?;
        let stream = CentralStream::open(connection.clone(), stream).await?;
        tracing::info!("companion connected to hub");
        Ok(Self {
            connection,
            control,
            responses,
            stream,
            reply_timeout: Duration::from_secs(5),
        })
    }

    /// Bound every wait for a hub answer by `timeout`.
    #[must_use]
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    async fn command(&self, command: HubCommand) -> Result<(), LinkError> {
        tracing::debug!(%command, "companion command");
        self.connection
            .write(&self.control, &[command.byte()])
            .await
    }

    /// Send Wi-Fi credentials and wait for the hub's link status.
    ///
    /// # Errors
    ///
    /// Returns a link or stream error, [`LinkError::Timeout`] when the hub
    /// did not answer in time, or [`CompanionError::BadStatus`].
    pub async fn provision_wifi(
        &mut self,
        credentials: &WifiCredentials,
    ) -> Result<WifiStatus, CompanionError> {
        self.command(HubCommand::ConnectWifi).await?;
        send_stream(&self.stream, &serde_json::to_string(credentials)?).await?;

        let reply = tokio::time::timeout(self.reply_timeout, self.responses.next())
            .await
            .map_err(|_| LinkError::Timeout)?
            .ok_or(LinkError::NotConnected)?;
        let bytes: [u8; 4] = reply
            .as_slice()
            .try_into()
            .map_err(|_| CompanionError::BadStatus(reply.len()))?;
        Ok(WifiStatus::from_be_bytes(bytes))
    }

    /// Ask the hub for its status document.
    ///
    /// # Errors
    ///
    /// Returns a link or stream error, or [`CompanionError::Payload`] when
    /// the document does not parse.
    pub async fn request_info(&mut self) -> Result<HubInfo, CompanionError> {
        self.command(HubCommand::RequestInfo).await?;
        let text = receive_stream(&mut self.stream, Some(self.reply_timeout)).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Register (or clear, with `null`) the push subscription.
    ///
    /// # Errors
    ///
    /// Returns the link or stream error raised while sending.
    pub async fn set_subscription(&self, token: &serde_json::Value) -> Result<(), CompanionError> {
        self.command(HubCommand::SetSubscription).await?;
        send_stream(&self.stream, &token.to_string()).await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns the link error raised by the control write.
    pub async fn disconnect_wifi(&self) -> Result<(), CompanionError> {
        Ok(self.command(HubCommand::DisconnectWifi).await?)
    }

    /// # Errors
    ///
    /// Returns the link error raised by the control write.
    pub async fn rescan(&self) -> Result<(), CompanionError> {
        Ok(self.command(HubCommand::Rescan).await?)
    }

    /// Close the link to the hub.
    ///
    /// # Errors
    ///
    /// Returns the link error raised while disconnecting.
    pub async fn disconnect(self) -> Result<(), CompanionError> {
        Ok(self.connection.disconnect().await?)
    }
}
