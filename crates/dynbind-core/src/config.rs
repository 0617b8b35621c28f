//! Configuration types for dynbind
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::transaction::{DEFAULT_RECORD_TTL, UpdateTarget};

/// Store root used when none is configured
pub const DEFAULT_STORE_PATH: &str = "/var/lib/dynbind";

/// Main dynbind configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DynbindConfig {
    /// Binding store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Authoritative server and zone
    pub dns: DnsConfig,

    /// DNS-update agent configuration
    #[serde(default)]
    pub agent: AgentConfig,

    /// Optional controller settings
    #[serde(default)]
    pub controller: ControllerConfig,
}

impl DynbindConfig {
    /// Create a configuration for `server` and `zone` with defaults elsewhere
    pub fn new(server: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            store: StoreConfig::default(),
            dns: DnsConfig {
                server: server.into(),
                zone: zone.into(),
                ttl: DEFAULT_RECORD_TTL,
            },
            agent: AgentConfig::default(),
            controller: ControllerConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.dns.validate()?;
        self.agent.validate()?;

        if self.controller.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }

        Ok(())
    }
}

/// Binding store configuration
///
/// Defaults to the file store under [`DEFAULT_STORE_PATH`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// One file per key under `path`
    File {
        /// Root directory of the store
        path: String,
    },

    /// In-memory store (not persistent)
    Memory,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig::File {
            path: DEFAULT_STORE_PATH.to_string(),
        }
    }
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::File { path } if path.is_empty() => {
                Err(crate::Error::config("File store path cannot be empty"))
            }
            _ => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &'static str {
        match self {
            StoreConfig::File { .. } => "file",
            StoreConfig::Memory => "memory",
        }
    }
}

/// Authoritative server and zone
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsConfig {
    /// Server the agent sends updates to
    pub server: String,

    /// Zone all hostnames are created under
    pub zone: String,

    /// TTL for added records, in seconds
    #[serde(default = "default_ttl")]
    pub ttl: u32,
}

impl DnsConfig {
    /// Validate the DNS configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.server.trim().is_empty() {
            return Err(crate::Error::config("DNS server cannot be empty"));
        }
        if self.zone.trim().is_empty() {
            return Err(crate::Error::config("DNS zone cannot be empty"));
        }
        // Both end up verbatim on a directive line
        if self.server.contains(char::is_whitespace) || self.zone.contains(char::is_whitespace) {
            return Err(crate::Error::config(
                "DNS server and zone cannot contain whitespace",
            ));
        }
        Ok(())
    }

    /// Transaction target for this configuration
    pub fn target(&self) -> UpdateTarget {
        UpdateTarget::new(&self.server, &self.zone).with_ttl(self.ttl)
    }
}

/// DNS-update agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Program to run
    #[serde(default = "default_agent_program")]
    pub program: String,

    /// Extra arguments, e.g. `["-k", "/etc/dynbind/update.key"]`
    #[serde(default)]
    pub args: Vec<String>,

    /// Maximum agent runtime in seconds
    ///
    /// Set to 0 to wait indefinitely (not recommended for production).
    #[serde(default = "default_agent_timeout_secs")]
    pub timeout_secs: u64,
}

impl AgentConfig {
    /// Validate the agent configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.program.is_empty() {
            return Err(crate::Error::config("Agent program cannot be empty"));
        }
        Ok(())
    }

    /// Timeout as a duration, `None` when disabled
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            program: default_agent_program(),
            args: Vec::new(),
            timeout_secs: default_agent_timeout_secs(),
        }
    }
}

/// Lifecycle controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Capacity of the lifecycle event channel
    ///
    /// When full, new events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_ttl() -> u32 {
    DEFAULT_RECORD_TTL
}

fn default_agent_program() -> String {
    "nsupdate".to_string()
}

fn default_agent_timeout_secs() -> u64 {
    30
}

fn default_event_channel_capacity() -> usize {
    1000
}
