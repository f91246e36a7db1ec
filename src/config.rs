use std::net::SocketAddr;
use std::path::PathBuf;

use crate::retry::ExponentialBackoff;

/// Default settings.
pub const DEFAULT_STATE_PATH: &str = "/var/lib/samqfs-console/state.json";
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:6789";
pub const DEFAULT_SERVER: &str = "localhost";
pub const DEFAULT_POLL_ATTEMPTS: u32 = 8;

/// Startup configuration, read once from the environment.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub state_path: PathBuf,
    pub listen_addr: SocketAddr,
    /// Managed server selected when a session starts.
    pub default_server: String,
    pub poll_attempts: u32,
}

impl ConsoleConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let state_path = lookup("SAMQFS_CONSOLE_STATE_PATH")
            .unwrap_or_else(|| DEFAULT_STATE_PATH.to_string());
        let listen_addr = lookup("SAMQFS_CONSOLE_LISTEN_ADDR")
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let default_server = lookup("SAMQFS_CONSOLE_SERVER")
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER.to_string());
        let poll_attempts = match lookup("SAMQFS_CONSOLE_POLL_ATTEMPTS") {
            Some(v) => v.trim().parse().map_err(|e| {
                anyhow::anyhow!("Invalid SAMQFS_CONSOLE_POLL_ATTEMPTS '{}': {}", v, e)
            })?,
            None => DEFAULT_POLL_ATTEMPTS,
        };

        Ok(Self {
            state_path: PathBuf::from(state_path),
            listen_addr: listen_addr.parse()?,
            default_server,
            poll_attempts: poll_attempts.max(1),
        })
    }

    pub fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.poll_attempts)
    }
}
