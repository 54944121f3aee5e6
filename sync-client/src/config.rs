//! Configuration loading for spacesync clients.
//!
//! Configuration is loaded from a TOML file. Every section and field is
//! optional; missing values take the defaults below.

use serde::{Deserialize, Serialize};
use spacesync_types::ActorId;
use std::path::PathBuf;
use std::time::Duration;

use crate::api::ApiTimeouts;

/// Root configuration for a spacesync client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Space service endpoint.
    pub service: ServiceConfig,
    /// Identity of the local actor.
    pub identity: IdentityConfig,
    /// Per-call timeouts.
    pub timeouts: TimeoutsConfig,
    /// Space acquisition.
    pub acquisition: AcquisitionConfig,
    /// Peer discovery.
    pub discovery: DiscoveryConfig,
    /// Decision engine.
    pub decision: DecisionConfig,
    /// Delivery pipeline.
    pub delivery: DeliveryConfig,
}

/// Space service endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Base URL of the service (default: http://localhost:8080).
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Static API key sent with every request.
    #[serde(default)]
    pub api_key: String,
}

/// Identity of the local actor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Actor id (default: a random UUID).
    #[serde(default = "ActorId::random")]
    pub actor_id: ActorId,
    /// Name shown to other peers.
    #[serde(default = "default_display_name")]
    pub display_name: String,
}

/// Per-call timeouts, in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Ordinary calls (default: 30).
    #[serde(default = "default_timeout_secs")]
    pub default_secs: u64,
    /// Listing calls (default: 10).
    #[serde(default = "default_listing_secs")]
    pub listing_secs: u64,
    /// Simulation runs (default: 120).
    #[serde(default = "default_simulation_secs")]
    pub simulation_secs: u64,
}

/// Space acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Listing attempts before creating (default: 3).
    #[serde(default = "default_list_attempts")]
    pub list_attempts: u32,
    /// Delay between listing attempts in milliseconds (default: 1000).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

/// Peer discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Poll interval in seconds (default: 3).
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Context tags sent to the resonance service.
    #[serde(default)]
    pub context_tags: Vec<String>,
    /// Capacity of the discovery event channel (default: 64).
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

/// Decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionConfig {
    /// Consult the advisory service (default: true).
    #[serde(default = "default_true")]
    pub advisory: bool,
    /// Run a link simulation (default: true).
    #[serde(default = "default_true")]
    pub simulate: bool,
}

/// Delivery pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Entries kept in the local outbox (default: 256).
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
    /// Attempts to record the coordination delta (default: 3).
    #[serde(default = "default_coordination_attempts")]
    pub coordination_attempts: u32,
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_display_name() -> String {
    "spacesync client".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_listing_secs() -> u64 {
    10
}

fn default_simulation_secs() -> u64 {
    120
}

fn default_list_attempts() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    1000
}

fn default_interval_secs() -> u64 {
    3
}

fn default_event_capacity() -> usize {
    64
}

fn default_true() -> bool {
    true
}

fn default_outbox_capacity() -> usize {
    256
}

fn default_coordination_attempts() -> u32 {
    3
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key: String::new(),
        }
    }
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            actor_id: ActorId::random(),
            display_name: default_display_name(),
        }
    }
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            default_secs: default_timeout_secs(),
            listing_secs: default_listing_secs(),
            simulation_secs: default_simulation_secs(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            list_attempts: default_list_attempts(),
            retry_delay_ms: default_retry_delay_ms(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            context_tags: Vec::new(),
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            advisory: true,
            simulate: true,
        }
    }
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: default_outbox_capacity(),
            coordination_attempts: default_coordination_attempts(),
        }
    }
}

impl ClientConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Write configuration to a TOML file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Set the service endpoint.
    pub fn with_service(mut self, base_url: &str, api_key: &str) -> Self {
        self.service.base_url = base_url.to_string();
        self.service.api_key = api_key.to_string();
        self
    }

    /// Set the local identity.
    pub fn with_identity(mut self, actor_id: ActorId, display_name: &str) -> Self {
        self.identity.actor_id = actor_id;
        self.identity.display_name = display_name.to_string();
        self
    }

    /// Set the acquisition retry policy.
    pub fn with_acquisition(mut self, list_attempts: u32, retry_delay: Duration) -> Self {
        self.acquisition.list_attempts = list_attempts;
        self.acquisition.retry_delay_ms = retry_delay.as_millis() as u64;
        self
    }

    /// Per-call timeouts for [`crate::SpaceApi`].
    pub fn api_timeouts(&self) -> ApiTimeouts {
        ApiTimeouts {
            default: Duration::from_secs(self.timeouts.default_secs),
            listing: Duration::from_secs(self.timeouts.listing_secs),
            simulation: Duration::from_secs(self.timeouts.simulation_secs),
        }
    }

    /// Delay between acquisition listings.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.acquisition.retry_delay_ms)
    }

    /// Discovery poll interval. Never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.discovery.interval_secs.max(1))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// Failed to write configuration file.
    #[error("failed to write config file {path}: {message}")]
    WriteError {
        /// Path to the configuration file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },
}
