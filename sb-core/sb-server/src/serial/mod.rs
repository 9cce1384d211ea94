//! Serial Bridge
//!
//! Line-oriented access to the one serial device attached to the relay host.
//! Device access goes through [`SerialOpener`] and [`SerialIo`] so the bridge
//! can run against the `serialport` crate or against a scripted fake.

mod bridge;
pub mod fake;
#[cfg(feature = "serial")]
mod system;

pub use bridge::SerialBridge;
pub use fake::{FakeSerial, FakeSerialHandle};
#[cfg(feature = "serial")]
pub use system::SystemSerial;

use std::io;
use std::time::Duration;

use sb_model::{ErrorKind, RelayError};

/// Default time a `read` waits for new lines
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Open serial connection
pub trait SerialIo: Send {
    /// Read available bytes, waiting at most `timeout` for the first one
    ///
    /// Returns `Ok(0)` when nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize>;

    fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Drop input received but not yet read
    fn discard_input(&mut self) -> io::Result<()>;
}

/// Source of serial connections
pub trait SerialOpener: Send {
    fn open(&mut self, port: &str, baud: u32) -> io::Result<Box<dyn SerialIo>>;

    fn available_ports(&self) -> io::Result<Vec<String>>;
}

#[derive(Debug, thiserror::Error)]
pub enum SerialError {
    #[error("Serial port '{port}' is unavailable: {reason}")]
    Unavailable { port: String, reason: String },
    #[error("Serial connection is not open")]
    NotOpen,
    #[error("No serial port configured. Use configure-serial to set one")]
    NoPortConfigured,
    #[error("Failed to list serial ports: {0}")]
    Enumerate(String),
}

impl SerialError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SerialError::Unavailable { .. } | SerialError::Enumerate(_) => {
                ErrorKind::PortUnavailable
            }
            SerialError::NotOpen => ErrorKind::NotOpen,
            SerialError::NoPortConfigured => ErrorKind::NoPortConfigured,
        }
    }
}

impl From<SerialError> for RelayError {
    fn from(err: SerialError) -> Self {
        RelayError::new(err.kind(), err.to_string())
    }
}

/// Order port names so likely boards (USB and ACM devices) come first
pub fn rank_ports(mut ports: Vec<String>) -> Vec<String> {
    ports.sort_by_key(|name| {
        let lower = name.to_ascii_lowercase();
        !(lower.contains("usb") || lower.contains("acm"))
    });
    ports
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_ports_prefers_usb() {
        let ports = vec![
            "/dev/ttyS0".to_string(),
            "/dev/ttyACM0".to_string(),
            "COM1".to_string(),
            "/dev/cu.usbmodem2101".to_string(),
        ];
        assert_eq!(
            rank_ports(ports),
            ["/dev/ttyACM0", "/dev/cu.usbmodem2101", "/dev/ttyS0", "COM1"]
        );
    }
}
