//! BLE central configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for the btleplug central.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// Index of the host adapter to use, in the order btleplug lists them.
    pub adapter_index: usize,
    /// Upper bound on one connection attempt, in seconds.
    pub connect_timeout_secs: u16,
    /// Only report advertisements carrying one of the fleet's service UUIDs.
    ///
    /// Some peripherals only advertise their name; leave this off for them.
    pub filter_services: bool,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            adapter_index: 0,
            connect_timeout_secs: 10,
            filter_services: false,
        }
    }
}

impl BleConfig {
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.connect_timeout_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_default_to_first_adapter() {
        let config = BleConfig::default();
        assert_eq!(config.adapter_index, 0);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(!config.filter_services);
    }

    #[test]
    fn should_parse_partial_toml() {
        let config: BleConfig = toml::from_str("filter_services = true").unwrap();
        assert!(config.filter_services);
        assert_eq!(config.connect_timeout_secs, 10);
    }
}
