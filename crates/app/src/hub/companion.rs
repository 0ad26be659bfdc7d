//! Companion application command handlers.

use bentech_domain::error::StreamError;
use bentech_domain::opcode::HubCommand;
use bentech_domain::session::{WifiCredentials, WifiStatus};

use super::Hub;
use crate::ports::{CentralLink, InboundSession, UsageReporter, WifiNetwork};
use crate::server::{CommandHandler, Exchange};

/// Serves [`HubCommand`]s on behalf of a [`Hub`].
pub struct Companion<'a, C: CentralLink, W, R> {
    hub: &'a Hub<C, W, R>,
}

impl<'a, C, W, R> Companion<'a, C, W, R>
where
    C: CentralLink,
    W: WifiNetwork,
    R: UsageReporter,
{
    pub fn new(hub: &'a Hub<C, W, R>) -> Self {
        Self { hub }
    }

    /// Read credentials from the stream, join the network, answer with the
    /// 4-byte status. Malformed credentials are answered with a failure.
    async fn connect_wifi<S: InboundSession>(&self, exchange: &mut Exchange<'_, S>) {
        let status = match exchange.receive_stream().await {
            Ok(text) => match serde_json::from_str::<WifiCredentials>(&text) {
                Ok(credentials) => self.hub.connect_wifi(&credentials).await,
                Err(err) => {
                    tracing::warn!(%err, "malformed wifi credentials");
                    WifiStatus::LINK_FAIL
                }
            },
            Err(StreamError::Link(err)) => {
                tracing::warn!(%err, "credentials not received");
                return;
            }
            Err(err) => {
                tracing::warn!(%err, "unreadable wifi credentials");
                WifiStatus::LINK_FAIL
            }
        };
        if let Err(err) = exchange.respond(&status.to_be_bytes()).await {
            tracing::warn!(%err, "unable to send wifi status");
        }
    }

    async fn send_info<S: InboundSession>(&self, exchange: &Exchange<'_, S>) {
        let info = self.hub.info().await;
        let text = match serde_json::to_string(&info) {
            Ok(text) => text,
            Err(err) => {
                tracing::error!(%err, "unable to encode hub info");
                return;
            }
        };
        if let Err(err) = exchange.send_stream(&text).await {
            tracing::warn!(%err, "unable to stream hub info");
        }
    }

    async fn set_subscription<S: InboundSession>(&self, exchange: &mut Exchange<'_, S>) {
        let text = match exchange.receive_stream().await {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(%err, "subscription not received");
                return;
            }
        };
        match serde_json::from_str(&text) {
            Ok(token) => self.hub.set_subscription(token).await,
            Err(err) => tracing::warn!(%err, "malformed subscription"),
        }
    }
}

impl<C, W, R> CommandHandler for Companion<'_, C, W, R>
where
    C: CentralLink,
    W: WifiNetwork,
    R: UsageReporter,
{
    type Command = HubCommand;

    async fn handle<S: InboundSession>(&self, command: HubCommand, exchange: &mut Exchange<'_, S>) {
        match command {
            HubCommand::ConnectWifi => self.connect_wifi(exchange).await,
            HubCommand::RequestInfo => self.send_info(exchange).await,
            HubCommand::DisconnectWifi => self.hub.disconnect_wifi().await,
            HubCommand::SetSubscription => self.set_subscription(exchange).await,
            HubCommand::Rescan => self.hub.rescan().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::hub::tests::{fleet, hub};
    use crate::server::{DeviceServer, ServerConfig};
    use crate::testing::{FakeCentral, FakePeripheral, FakeRemote, Journal};
    use bentech_domain::profile::HUB;
    use bentech_domain::session::HubInfo;
    use bentech_domain::stream::{StreamAssembler, StreamFrames};

    fn write_stream(remote: &FakeRemote, text: &str) {
        let frames = StreamFrames::encode(text);
        remote.write(HUB.stream.unwrap(), &frames.header());
        for fragment in frames.fragments() {
            remote.write(HUB.stream.unwrap(), fragment);
        }
    }

    async fn read_stream(remote: &mut FakeRemote) -> String {
        let (_, header) = remote.notified().await.unwrap();
        let mut assembler = StreamAssembler::from_header(&header).unwrap();
        while !assembler.is_complete() {
            let (_, fragment) = remote.notified().await.unwrap();
            assembler.push(&fragment).unwrap();
        }
        assembler.finish().unwrap()
    }

    fn config() -> ServerConfig {
        ServerConfig {
            advertise_timeout: Duration::from_millis(100),
            read_timeout: Duration::from_millis(20),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn should_answer_wifi_status_after_credentials() {
        let (hub, _) = hub(FakeCentral::new(Journal::default()));
        let peripheral = FakePeripheral::default();
        let mut remote = peripheral.offer(&HUB);
        let server = DeviceServer::new(peripheral, HUB, Companion::new(&hub), config());

        let exchange = async {
            remote.write(HUB.control, &[0x01]);
            write_stream(&remote, r#"{"ssid":"home","password":"hunter2"}"#);
            let (attribute, status) = remote.notified().await.unwrap();
            (attribute, status)
        };
        let (attribute, status) = tokio::select! {
            () = server.run() => unreachable!(),
            result = exchange => result,
        };

        assert_eq!(attribute, HUB.response.unwrap());
        assert_eq!(status, WifiStatus::LINK_UP.to_be_bytes().to_vec());
        assert!(hub.info().await.wifi_connected);
    }

    #[tokio::test]
    async fn should_answer_failure_for_malformed_credentials() {
        let (hub, _) = hub(FakeCentral::new(Journal::default()));
        let peripheral = FakePeripheral::default();
        let mut remote = peripheral.offer(&HUB);
        let server = DeviceServer::new(peripheral, HUB, Companion::new(&hub), config());

        let exchange = async {
            remote.write(HUB.control, &[0x01]);
            write_stream(&remote, "not json");
            remote.notified().await.unwrap()
        };
        let (_, status) = tokio::select! {
            () = server.run() => unreachable!(),
            result = exchange => result,
        };

        assert_eq!(status, WifiStatus::LINK_FAIL.to_be_bytes().to_vec());
        assert!(!hub.info().await.wifi_connected);
    }

    #[tokio::test]
    async fn should_stream_info_with_subscription_and_devices() {
        let central = FakeCentral::new(Journal::default());
        fleet(&central, Duration::ZERO, Duration::ZERO);
        let (hub, _) = hub(central);
        hub.start().await;
        hub.managers()[3].disconnect().await;
        let peripheral = FakePeripheral::default();
        let mut remote = peripheral.offer(&HUB);
        let server = DeviceServer::new(peripheral, HUB, Companion::new(&hub), config());

        let exchange = async {
            remote.write(HUB.control, &[0x04]);
            write_stream(&remote, r#"{"endpoint":"https://push.example/1"}"#);
            remote.write(HUB.control, &[0x02]);
            read_stream(&mut remote).await
        };
        let text = tokio::select! {
            () = server.run() => unreachable!(),
            result = exchange => result,
        };

        let info: HubInfo = serde_json::from_str(&text).unwrap();
        assert!(!info.wifi_connected);
        assert_eq!(
            info.subscription,
            Some(serde_json::json!({"endpoint": "https://push.example/1"}))
        );
        assert_eq!(
            info.connected_devices,
            vec!["BT-lid-controller", "BT-paper-observer", "BT-auto-flusher"]
        );
    }

    #[tokio::test]
    async fn should_reconnect_on_rescan_command() {
        let central = FakeCentral::new(Journal::default());
        let devices = fleet(&central, Duration::ZERO, Duration::ZERO);
        let (hub, _) = hub(central);
        hub.start().await;
        devices.paper.drop_link();
        assert!(!hub.managers()[1].is_connected().await);
        let peripheral = FakePeripheral::default();
        let remote = peripheral.offer(&HUB);
        let server = DeviceServer::new(peripheral, HUB, Companion::new(&hub), config());

        let check = async {
            remote.write(HUB.control, &[0x05]);
            for _ in 0..50 {
                if hub.managers()[1].is_connected().await {
                    return true;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
            false
        };
        let reconnected = tokio::select! {
            () = server.run() => unreachable!(),
            result = check => result,
        };

        assert!(reconnected);
    }
}
