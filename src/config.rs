use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_SOCKET_PATH: &str = "/tmp/prussd.sock";
pub const DEFAULT_MAX_REPLY_BYTES: usize = 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Unix socket the daemon listens on
    pub socket_path: PathBuf,
    /// Upper bound on a single blocking read from the daemon
    pub read_timeout_ms: u64,
    /// Replies longer than this are rejected rather than truncated
    pub max_reply_bytes: usize,
    /// How often a cancellable wait checks its token
    pub poll_interval_ms: u64,
    pub channel: ChannelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// rpmsg channel name, e.g. `rpmsg_pru` for `/dev/rpmsg_pru30`
    pub name: String,
    /// Port of PRU0's channel; PRU1 uses `base_port + 1`
    pub base_port: u32,
}

impl ClientConfig {
    /// Parse a YAML configuration file. Absent keys keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml::from_str(content)
            .map_err(|e| Error::Config(format!("cannot parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.socket_path = path.into();
        self
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values that would make every command fail.
    pub fn validate(&self) -> Result<()> {
        if self.max_reply_bytes == 0 {
            return Err(Error::Config("max_reply_bytes must be positive".to_string()));
        }
        if self.read_timeout_ms == 0 || self.poll_interval_ms == 0 {
            return Err(Error::Config("timeouts must be positive".to_string()));
        }
        if self.channel.name.is_empty() || self.channel.name.contains(char::is_whitespace) {
            return Err(Error::Config(format!(
                "invalid channel name {:?}",
                self.channel.name
            )));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            read_timeout_ms: 5_000,
            max_reply_bytes: DEFAULT_MAX_REPLY_BYTES,
            poll_interval_ms: 100,
            channel: ChannelConfig::default(),
        }
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "rpmsg_pru".to_string(),
            base_port: 30,
        }
    }
}
