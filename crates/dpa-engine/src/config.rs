//! Engine configuration.
//!
//! ```yaml
//! rf_mode: STD
//! hw_revision: DCTR-7xD
//! confirmation_wait_ms: 2000
//! response_timeout_ms: 10000
//! initial_bonded_nodes: 12
//! transport:
//!   type: udp
//!   local: 0.0.0.0:55300
//!   remote: 192.168.1.20:55000
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use dpa_protocol::RESPONSE_MAX_LENGTH;
use dpa_timing::{HwRevision, InitialSettings, RfMode, TimingModel, DEFAULT_CONFIRMATION_WAIT};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::transport::TransportKind;

fn default_confirmation_wait_ms() -> u64 {
    DEFAULT_CONFIRMATION_WAIT.as_millis() as u64
}

fn default_recv_timeout_ms() -> u64 {
    100
}

fn default_max_packet_size() -> usize {
    512
}

/// Raw-frame UDP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpConfig {
    /// Local address to bind.
    pub local: SocketAddr,
    /// Address of the gateway that bridges frames into the mesh.
    pub remote: SocketAddr,
    /// Poll interval of the reader thread.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
    /// Receive buffer size.
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,
}

/// Transport selection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransportConfig {
    /// In-process channel connected to a loopback device.
    #[default]
    Channel,
    /// Raw frames over UDP.
    Udp(UdpConfig),
}

impl TransportConfig {
    /// Registry key of this transport.
    pub fn kind(&self) -> TransportKind {
        match self {
            TransportConfig::Channel => TransportKind::Channel,
            TransportConfig::Udp(_) => TransportKind::Udp,
        }
    }
}

/// Settings of a [`RequestEngine`](crate::RequestEngine).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// RF mode of the mesh.
    pub rf_mode: RfMode,
    /// Transceiver revision of the devices.
    pub hw_revision: HwRevision,
    /// Time to wait for a confirmation.
    pub confirmation_wait_ms: u64,
    /// Default response timeout for long-lasting operations. Absent means unlimited.
    pub response_timeout_ms: Option<u64>,
    /// Bonded node count known before any traffic.
    pub initial_bonded_nodes: Option<u16>,
    /// Transport to use.
    pub transport: TransportConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            rf_mode: RfMode::default(),
            hw_revision: HwRevision::default(),
            confirmation_wait_ms: default_confirmation_wait_ms(),
            response_timeout_ms: None,
            initial_bonded_nodes: None,
            transport: TransportConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.confirmation_wait_ms == 0 {
            return Err(ConfigError::Invalid(
                "confirmation_wait_ms must be greater than zero".to_string(),
            ));
        }

        if self.response_timeout_ms == Some(0) {
            return Err(ConfigError::Invalid(
                "response_timeout_ms must be greater than zero; omit it for no limit".to_string(),
            ));
        }

        if let TransportConfig::Udp(udp) = &self.transport {
            if udp.max_packet_size < RESPONSE_MAX_LENGTH {
                return Err(ConfigError::Invalid(format!(
                    "udp max_packet_size must be at least {} bytes",
                    RESPONSE_MAX_LENGTH
                )));
            }
            if udp.recv_timeout_ms == 0 {
                return Err(ConfigError::Invalid(
                    "udp recv_timeout_ms must be greater than zero".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Time to wait for a confirmation.
    pub fn confirmation_wait(&self) -> Duration {
        Duration::from_millis(self.confirmation_wait_ms)
    }

    /// Default timeout for long-lasting operations.
    pub fn response_timeout(&self) -> Option<Duration> {
        self.response_timeout_ms.map(Duration::from_millis)
    }

    /// Build the timing model described by this configuration.
    pub fn timing_model(&self) -> TimingModel {
        TimingModel::with_initial_settings(
            self.rf_mode,
            self.hw_revision,
            self.confirmation_wait(),
            InitialSettings {
                bonded_nodes: self.initial_bonded_nodes,
                rf_mode: None,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_yaml("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.rf_mode, RfMode::Std);
        assert_eq!(config.hw_revision, HwRevision::Dctr7xD);
        assert_eq!(config.confirmation_wait(), Duration::from_millis(2000));
        assert_eq!(config.response_timeout(), None);
        assert_eq!(config.transport, TransportConfig::Channel);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
rf_mode: LP
hw_revision: DCTR-5xD
confirmation_wait_ms: 1500
response_timeout_ms: 60000
initial_bonded_nodes: 7
transport:
  type: udp
  local: 127.0.0.1:55300
  remote: 127.0.0.1:55000
"#;
        let config = EngineConfig::from_yaml(yaml).unwrap();

        assert_eq!(config.rf_mode, RfMode::Lp);
        assert_eq!(config.hw_revision, HwRevision::Dctr5xD);
        assert_eq!(config.confirmation_wait(), Duration::from_millis(1500));
        assert_eq!(config.response_timeout(), Some(Duration::from_secs(60)));
        assert_eq!(config.transport.kind(), TransportKind::Udp);

        match &config.transport {
            TransportConfig::Udp(udp) => {
                assert_eq!(udp.remote, "127.0.0.1:55000".parse::<SocketAddr>().unwrap());
                assert_eq!(udp.recv_timeout_ms, 100);
                assert_eq!(udp.max_packet_size, 512);
            }
            other => panic!("unexpected transport: {:?}", other),
        }

        let model = config.timing_model();
        assert_eq!(model.bonded_nodes(), Some(7));
        assert_eq!(model.rf_mode(), RfMode::Lp);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            EngineConfig::from_yaml("confirmation_wait_ms: 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml("response_timeout_ms: 0"),
            Err(ConfigError::Invalid(_))
        ));

        let small_buffer = r#"
transport:
  type: udp
  local: 127.0.0.1:1
  remote: 127.0.0.1:2
  max_packet_size: 16
"#;
        assert!(matches!(
            EngineConfig::from_yaml(small_buffer),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            EngineConfig::from_yaml("rf_mode: FAST"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            EngineConfig::from_yaml("unknown_key: 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let err = EngineConfig::load(Path::new("/nonexistent/dpa.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
