//! Configuration loading — TOML file with environment variable overrides.
//!
//! Looks for `bentech.toml` in the working directory. Every field has a
//! sensible default so the file is optional. Environment variables take
//! precedence over file values.

use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use bentech_adapter_btleplug::BleConfig;
use bentech_adapter_virtual::{FleetConfig, OccupancySchedule};
use bentech_app::hub::HubConfig;
use bentech_app::server::ServerConfig;
use bentech_domain::session::WifiCredentials;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Radio backend selection.
    pub transport: TransportConfig,
    /// Hub loop timing.
    pub hub: HubSection,
    /// Companion-facing server timing.
    pub server: ServerSection,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Virtual fleet and collaborator behaviour.
    pub simulation: SimulationConfig,
}

/// Which radio the hub drives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-process simulated radio and fleet.
    #[default]
    Virtual,
    /// Host Bluetooth adapter through `btleplug`.
    Btleplug,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "virtual" => Ok(Self::Virtual),
            "btleplug" => Ok(Self::Btleplug),
            other => {
                let reason = format!("unknown backend `{other}`");
                Err(ConfigError::Validation(reason))
            }
        }
    }
}

/// Radio transport configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub backend: Backend,
    /// Host adapter settings, used by the `btleplug` backend only.
    pub btleplug: BleConfig,
}

/// Hub loop configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct HubSection {
    /// Upper bound of one discovery pass, in seconds.
    pub scan_window_secs: u64,
    /// Bound on awaited exchanges, in milliseconds; unbounded when absent.
    pub exchange_timeout_ms: Option<u64>,
    /// Occupancy sampling period, in milliseconds.
    pub occupancy_poll_ms: u64,
}

/// Device server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub advertise_timeout_secs: u64,
    /// Idle read timeout of the control and stream loops.
    pub read_timeout_ms: u64,
    pub retry_delay_ms: u64,
    /// Per-fragment stream timeout; unbounded when absent.
    pub stream_timeout_ms: Option<u64>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Simulated fleet and collaborators.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Time every virtual actuator takes per command.
    pub actuation_ms: u64,
    pub rolls_per_visit: u32,
    /// Delay before the first simulated visit.
    pub first_visit_secs: u64,
    pub visit_secs: u64,
    /// Period between visit starts; a single visit when zero.
    pub visit_interval_secs: u64,
    /// Network the virtual Wi-Fi radio can join.
    pub wifi_ssid: String,
    pub wifi_password: String,
    /// Run a scripted companion session against the hub at startup.
    pub provision: bool,
}

impl Config {
    /// Load configuration from `bentech.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("bentech.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(val) = var("BENTECH_BACKEND") {
            self.transport.backend = val.parse()?;
        }
        if let Some(val) = var("BENTECH_SCAN_WINDOW_SECS") {
            self.hub.scan_window_secs = val.parse().map_err(|_| {
                let reason = format!("BENTECH_SCAN_WINDOW_SECS is not a number: `{val}`");
                ConfigError::Validation(reason)
            })?;
        }
        if let Some(val) = var("BENTECH_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = var("RUST_LOG") {
            self.logging.filter = val;
        }
        Ok(())
    }

    /// Reject zero periods; the loops waiting on them would spin.
    fn validate(&self) -> Result<(), ConfigError> {
        let periods = [
            ("scan window", self.hub.scan_window_secs),
            ("occupancy poll interval", self.hub.occupancy_poll_ms),
            ("advertise timeout", self.server.advertise_timeout_secs),
            ("read timeout", self.server.read_timeout_ms),
        ];
        for (name, value) in periods {
            if value == 0 {
                return Err(ConfigError::Validation(format!("{name} must be non-zero")));
            }
        }
        Ok(())
    }

    /// Timing of the hub loops and of its companion-facing server.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            scan_window: Duration::from_secs(self.hub.scan_window_secs),
            exchange_timeout: self.hub.exchange_timeout_ms.map(Duration::from_millis),
            occupancy_poll: Duration::from_millis(self.hub.occupancy_poll_ms),
            server: self.server_config(),
        }
    }

    #[must_use]
    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            advertise_timeout: Duration::from_secs(self.server.advertise_timeout_secs),
            read_timeout: Duration::from_millis(self.server.read_timeout_ms),
            retry_delay: Duration::from_millis(self.server.retry_delay_ms),
            stream_timeout: self.server.stream_timeout_ms.map(Duration::from_millis),
        }
    }

    #[must_use]
    pub fn fleet_config(&self) -> FleetConfig {
        FleetConfig {
            actuation: Duration::from_millis(self.simulation.actuation_ms),
            rolls_per_visit: self.simulation.rolls_per_visit,
            server: self.server_config(),
        }
    }

    #[must_use]
    pub fn visit_schedule(&self) -> OccupancySchedule {
        OccupancySchedule::new(
            Duration::from_secs(self.simulation.first_visit_secs),
            Duration::from_secs(self.simulation.visit_secs),
            Duration::from_secs(self.simulation.visit_interval_secs),
        )
    }

    #[must_use]
    pub fn wifi_network(&self) -> WifiCredentials {
        WifiCredentials {
            ssid: self.simulation.wifi_ssid.clone(),
            password: self.simulation.wifi_password.clone(),
        }
    }
}

impl Default for HubSection {
    fn default() -> Self {
        Self {
            scan_window_secs: 10,
            exchange_timeout_ms: None,
            occupancy_poll_ms: 100,
        }
    }
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            advertise_timeout_secs: 30,
            read_timeout_ms: 1000,
            retry_delay_ms: 1000,
            stream_timeout_ms: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: concat!(
                "bentechd=info,bentech_app=info,",
                "bentech_adapter_virtual=info,bentech_adapter_btleplug=info",
            )
            .to_string(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            actuation_ms: 200,
            rolls_per_visit: 2,
            first_visit_secs: 5,
            visit_secs: 3,
            visit_interval_secs: 30,
            wifi_ssid: "bentech-demo".to_string(),
            wifi_password: "changeme".to_string(),
            provision: true,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
