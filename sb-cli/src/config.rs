//! Wiring of the hardware session used by `serve` and local consoles

use std::path::PathBuf;
use std::time::Duration;

use sb_server::serial::SystemSerial;
use sb_server::toolchain::SystemRunner;
use sb_server::{Credential, SerialBridge, Session, ToolchainGateway};

/// Toolchain settings shared by every command that builds sketches
#[derive(Debug, Clone)]
pub struct ToolchainConfig {
    /// Explicit `arduino-cli` path; looked up when absent
    pub program: Option<PathBuf>,
    pub timeout: Duration,
}

impl ToolchainConfig {
    pub fn gateway(&self) -> ToolchainGateway {
        let gateway = ToolchainGateway::new(Box::new(SystemRunner::new())).with_timeout(self.timeout);
        match &self.program {
            Some(program) => gateway.with_program(program),
            None => gateway,
        }
    }
}

/// Session backed by the real serial ports and toolchain of this machine
pub fn system_session(toolchain: &ToolchainConfig) -> Session {
    Session::new(SerialBridge::new(Box::new(SystemSerial::new())), toolchain.gateway())
}

/// Use the configured token, or generate one when none was given
pub fn credential(token: Option<&str>) -> Credential {
    match token.map(str::trim).filter(|t| !t.is_empty()) {
        Some(token) => Credential::new(token),
        None => {
            log::info!("No token configured, generated a new one");
            Credential::generate()
        }
    }
}
