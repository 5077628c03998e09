use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::{Error, ErrorKind, Result};

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub serial: SerialConfig,
    pub network: NetworkSettings,
    pub policy: Policy,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let contents = fs::read_to_string(path)
            .map_err(|e| config_error(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&contents)
            .map_err(|e| config_error(format!("failed to parse {}: {}", path.display(), e)))
    }

    pub fn from_toml(contents: &str) -> Result<Config> {
        toml::from_str(contents).map_err(|e| config_error(e.to_string()))
    }
}

fn config_error(message: String) -> Error {
    ErrorKind::Config(message).into()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub path: PathBuf,
    pub baud: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/dev/ttyACM0"),
            baud: 38400,
        }
    }
}

/// The network the coordinator should form. Unset values are left to the adapter.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct NetworkSettings {
    pub pan_id: Option<u16>,
    pub extended_pan_id: Option<u64>,
    pub channel_mask: u32,
    pub security_mode: u8,
    pub network_key: Option<[u8; 16]>,
}

impl Default for NetworkSettings {
    fn default() -> Self {
        Self {
            pan_id: None,
            extended_pan_id: None,
            // Channels 11, 15, 20 and 25.
            channel_mask: 0x0210_8800,
            security_mode: 3,
            network_key: None,
        }
    }
}

/// Timeouts (in milliseconds) and retry budgets.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub transaction_timeout_ms: u64,
    pub compound_timeout_ms: u64,
    pub ping_timeout_ms: u64,
    pub zdo_timeout_ms: u64,
    pub confirm_timeout_ms: u64,
    pub ping_attempts: u32,
    pub parameter_read_attempts: u32,
    pub poll_interval_ms: u64,
    pub reconnect_delay_ms: u64,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            transaction_timeout_ms: 500,
            compound_timeout_ms: 5000,
            ping_timeout_ms: 1000,
            zdo_timeout_ms: 15000,
            confirm_timeout_ms: 30000,
            ping_attempts: 10,
            parameter_read_attempts: 3,
            poll_interval_ms: 1000,
            reconnect_delay_ms: 2000,
        }
    }
}

impl Policy {
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    pub fn compound_timeout(&self) -> Duration {
        Duration::from_millis(self.compound_timeout_ms)
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn zdo_timeout(&self) -> Duration {
        Duration::from_millis(self.zdo_timeout_ms)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn timeout_for(&self, class: adapter::TimeoutClass) -> Duration {
        match class {
            adapter::TimeoutClass::Generic => self.transaction_timeout(),
            adapter::TimeoutClass::Compound => self.compound_timeout(),
            adapter::TimeoutClass::Ping => self.ping_timeout(),
        }
    }
}
