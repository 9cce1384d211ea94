use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Args;
use sb_client::{Executor, HostSpecifier, LocalExecutor, RemoteExecutor};

use crate::config::{ToolchainConfig, system_session};

/// Toolchain options for commands that build sketches on this machine
#[derive(Debug, Clone, Args)]
pub struct ToolchainArgs {
    /// Path to arduino-cli (default: $ARDUINO_CLI, then PATH)
    #[arg(long, env = "SB_TOOLCHAIN")]
    pub toolchain: Option<PathBuf>,

    /// Seconds a compile or upload may run before it is killed
    #[arg(long, default_value_t = 300)]
    pub toolchain_timeout: u64,
}

impl ToolchainArgs {
    pub fn config(&self) -> ToolchainConfig {
        ToolchainConfig {
            program: self.toolchain.clone(),
            timeout: Duration::from_secs(self.toolchain_timeout),
        }
    }
}

/// Where hardware commands run
#[derive(Debug, Clone, Args)]
pub struct TargetArgs {
    /// Relay address (ws://host:port or http://host:port); local when omitted
    #[arg(long, env = "SB_REMOTE")]
    pub remote: Option<String>,

    /// API token of the relay
    #[arg(long, env = "SB_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    #[command(flatten)]
    pub toolchain: ToolchainArgs,
}

impl TargetArgs {
    pub fn host(&self) -> Result<HostSpecifier> {
        Ok(HostSpecifier::parse_optional(self.remote.as_deref())?)
    }

    /// Executor for the selected host, chosen once for the whole command
    pub fn executor(&self) -> Result<Box<dyn Executor>> {
        match self.host()? {
            HostSpecifier::Local => {
                log::debug!("Running commands on local hardware");
                let session = system_session(&self.toolchain.config());
                Ok(Box::new(LocalExecutor::new(session)))
            }
            HostSpecifier::Remote { url } => {
                if url.starts_with("wss://") {
                    bail!("Secure relay connections (wss://) are not supported. Use ws://");
                }
                if self.token.is_none() {
                    log::warn!("No token given for {url}; the relay will reject every request");
                }
                log::debug!("Running commands on relay {url}");
                Ok(Box::new(RemoteExecutor::connect(&url, self.token.clone())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(remote: Option<&str>) -> TargetArgs {
        TargetArgs {
            remote: remote.map(str::to_string),
            token: Some("t".to_string()),
            toolchain: ToolchainArgs {
                toolchain: None,
                toolchain_timeout: 300,
            },
        }
    }

    #[test]
    fn test_host_selection() {
        assert_eq!(target(None).host().unwrap(), HostSpecifier::Local);
        assert_eq!(
            target(Some("http://pi.local:5000")).host().unwrap(),
            HostSpecifier::Remote {
                url: "ws://pi.local:5000".to_string()
            }
        );
    }

    #[test]
    fn test_rejects_secure_relay() {
        assert!(target(Some("https://relay.lan")).executor().is_err());
    }
}
