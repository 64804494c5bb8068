//! Daemon configuration.
//!
//! One YAML document, every key optional. Generator and receiver settings sit at
//! the top level next to the daemon's own keys:
//!
//! ```yaml
//! send_delay_ns: 100000000
//! warmup_samples: 32
//! assert_timeout_ms: 1500
//! roles: [generator, receiver]
//! chrony_socket: /run/chrony.fx3pps.sock
//! rt:
//!   high_priority: true
//!   cpu_affinity: 4
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use fx3pps_errors::ConfigError;
use fx3pps_pps::ReceiverConfig;
use fx3pps_scheduler::GeneratorConfig;
use fx3pps_transport::{DeviceRole, UsbIds};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Complete `fx3ppsd` configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Settings applied to every generator.
    #[serde(flatten)]
    pub generator: GeneratorConfig,

    /// Read timeouts applied to every receiver.
    #[serde(flatten)]
    pub receiver: ReceiverConfig,

    /// Bulk OUT timeout (ms).
    pub write_timeout_ms: u64,

    /// Roles to attach. Boards of other roles are ignored.
    pub roles: Vec<DeviceRole>,

    /// Identifiers used to recognise the boards.
    pub usb: UsbIds,

    /// Device discovery period (ms).
    pub scan_interval_ms: u64,

    /// Status log period (ms).
    pub status_interval_ms: u64,

    /// chronyd SOCK refclock socket. Receiver events are only logged when unset.
    pub chrony_socket: Option<PathBuf>,

    /// `tracing` filter used when neither `RUST_LOG` nor `-v` is given.
    pub log_filter: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorConfig::default(),
            receiver: ReceiverConfig::default(),
            write_timeout_ms: 100,
            roles: vec![DeviceRole::Generator, DeviceRole::Receiver],
            usb: UsbIds::default(),
            scan_interval_ms: 2_000,
            status_interval_ms: 60_000,
            chrony_socket: None,
            log_filter: "info".to_string(),
        }
    }
}

impl ServiceConfig {
    /// Read and parse a YAML configuration file.
    ///
    /// The result is not validated.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or is not valid YAML for this schema.
    pub async fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// # Errors
    ///
    /// Returns the YAML error for malformed input or mistyped keys.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// # Errors
    ///
    /// Fails only if a value cannot be represented in YAML.
    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Check every setting, including the generator and receiver blocks.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.generator.validate()?;
        self.receiver.validate()?;

        if !(1..=10_000).contains(&self.write_timeout_ms) {
            return Err(ConfigError::out_of_range(
                "write_timeout_ms",
                self.write_timeout_ms,
                1,
                10_000,
            ));
        }
        if !(100..=600_000).contains(&self.scan_interval_ms) {
            return Err(ConfigError::out_of_range(
                "scan_interval_ms",
                self.scan_interval_ms,
                100,
                600_000,
            ));
        }
        if !(1_000..=86_400_000).contains(&self.status_interval_ms) {
            return Err(ConfigError::out_of_range(
                "status_interval_ms",
                self.status_interval_ms,
                1_000,
                86_400_000,
            ));
        }
        if self.roles.is_empty() {
            return Err(ConfigError::invalid("roles must name at least one role"));
        }
        if self.usb.receiver_product_id == self.usb.generator_product_id {
            return Err(ConfigError::invalid(
                "receiver and generator product ids must differ",
            ));
        }
        if self.log_filter.trim().is_empty() {
            return Err(ConfigError::invalid("log_filter must not be empty"));
        }
        Ok(())
    }

    pub fn role_enabled(&self, role: DeviceRole) -> bool {
        self.roles.contains(&role)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_millis(self.status_interval_ms)
    }
}
