//! Hub session state and the payloads exchanged with the companion application.

use serde::{Deserialize, Serialize};

/// Wi-Fi credentials provisioned by the companion application.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
}

impl std::fmt::Debug for WifiCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WifiCredentials")
            .field("ssid", &self.ssid)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Link status reported back after a Wi-Fi connect request.
///
/// Sent to the companion application as 4 bytes, big-endian, signed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WifiStatus(pub i32);

impl WifiStatus {
    /// Associated and addressed.
    pub const LINK_UP: Self = Self(3);
    /// Associated, no IP address yet.
    pub const LINK_NOIP: Self = Self(2);
    /// Association in progress.
    pub const LINK_JOIN: Self = Self(1);
    /// Not associated.
    pub const LINK_DOWN: Self = Self(0);
    /// Association failed.
    pub const LINK_FAIL: Self = Self(-1);
    /// No network with the requested SSID.
    pub const LINK_NONET: Self = Self(-2);
    /// Credentials rejected.
    pub const LINK_BADAUTH: Self = Self(-3);

    /// Whether the link is usable.
    #[must_use]
    pub fn is_up(self) -> bool {
        self == Self::LINK_UP
    }

    /// Wire representation.
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; 4] {
        self.0.to_be_bytes()
    }

    /// Decode from the wire representation.
    #[must_use]
    pub fn from_be_bytes(bytes: [u8; 4]) -> Self {
        Self(i32::from_be_bytes(bytes))
    }
}

/// Status document streamed in answer to an info request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubInfo {
    #[serde(rename = "WIFI_CONNECTED")]
    pub wifi_connected: bool,
    #[serde(rename = "SUBSCRIPTION")]
    pub subscription: Option<serde_json::Value>,
    #[serde(rename = "CONNECTED_DEVICES")]
    pub connected_devices: Vec<String>,
}

/// Mutable hub state owned by the companion-app command handlers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HubSession {
    wifi_connected: bool,
    subscription: Option<serde_json::Value>,
}

impl HubSession {
    /// Whether the last Wi-Fi connect succeeded and was not torn down since.
    #[must_use]
    pub fn wifi_connected(&self) -> bool {
        self.wifi_connected
    }

    /// The registered push subscription, if any.
    #[must_use]
    pub fn subscription(&self) -> Option<&serde_json::Value> {
        self.subscription.as_ref()
    }

    /// Record the outcome of a Wi-Fi connect request.
    pub fn record_wifi(&mut self, status: WifiStatus) {
        self.wifi_connected = status.is_up();
    }

    /// Record a Wi-Fi teardown.
    pub fn record_wifi_disconnected(&mut self) {
        self.wifi_connected = false;
    }

    /// Replace the push subscription. A JSON `null` clears it.
    pub fn set_subscription(&mut self, token: serde_json::Value) {
        self.subscription = (!token.is_null()).then_some(token);
    }

    /// Build the info document from this session and the connected devices.
    #[must_use]
    pub fn info(&self, connected_devices: Vec<String>) -> HubInfo {
        HubInfo {
            wifi_connected: self.wifi_connected,
            subscription: self.subscription.clone(),
            connected_devices,
        }
    }
}
