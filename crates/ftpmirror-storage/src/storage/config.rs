//! Storage configuration, loaded from TOML.
//!
//! ```toml
//! connect_timeout_sec = 5
//! ignore_failing_connections = true
//! keep_empty_directories = false
//!
//! [[servers]]
//! host = "ftp1.example.com"
//! user = "user1"
//! password = "password1"
//! passive = true
//! ```

use crate::storage::endpoint::EndpointConfig;
use crate::storage::error::{StorageError, StorageResult};
use ftpmirror_client::FTP_PORT;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// One `[[servers]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub passive: bool,
}

fn default_port() -> u16 {
    FTP_PORT
}

impl ServerConfig {
    pub fn to_endpoint_config(&self, policy: &ConnectPolicy) -> EndpointConfig {
        let mut cfg = EndpointConfig::new(&self.host, &self.user, &self.password)
            .with_port(self.port)
            .with_passive(self.passive);
        policy.apply(&mut cfg);
        cfg
    }
}

/// Connect behaviour shared by every server of a storage instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub connect_timeout: Option<Duration>,
    pub ignore_connect_errors: bool,
}

impl ConnectPolicy {
    pub fn apply(&self, config: &mut EndpointConfig) {
        config.connect_timeout = self.connect_timeout;
        config.ignore_connect_errors = self.ignore_connect_errors;
    }
}

/// Per-storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Bound on connect + greeting per server, in seconds.
    pub connect_timeout_sec: Option<u64>,
    /// Skip unreachable servers instead of failing.
    pub ignore_failing_connections: bool,
    /// Leave emptied directories in place after deletes.
    pub keep_empty_directories: bool,
    /// Servers in failover order. Kept last so TOML output stays valid.
    pub servers: Vec<ServerConfig>,
}

impl StorageConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> StorageResult<Self> {
        let config: Self = toml::from_str(text).map_err(|e| StorageError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StorageError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> StorageResult<String> {
        toml::to_string_pretty(self).map_err(|e| StorageError::Config(e.to_string()))
    }

    /// Every server needs a host; an empty server list is allowed and only
    /// fails once a connection is needed.
    pub fn validate(&self) -> StorageResult<()> {
        for (i, server) in self.servers.iter().enumerate() {
            if server.host.trim().is_empty() {
                return Err(StorageError::Config(format!("servers[{}]: host must not be empty", i)));
            }
            if server.port == 0 {
                return Err(StorageError::Config(format!("servers[{}]: port must not be 0", i)));
            }
        }
        if self.connect_timeout_sec == Some(0) {
            return Err(StorageError::Config("connect_timeout_sec must be positive".into()));
        }
        Ok(())
    }

    pub fn policy(&self) -> ConnectPolicy {
        ConnectPolicy {
            connect_timeout: self.connect_timeout_sec.map(Duration::from_secs),
            ignore_connect_errors: self.ignore_failing_connections,
        }
    }

    /// Endpoint configurations in declaration order, policy applied.
    pub fn endpoint_configs(&self) -> Vec<EndpointConfig> {
        let policy = self.policy();
        self.servers
            .iter()
            .map(|s| s.to_endpoint_config(&policy))
            .collect()
    }
}
