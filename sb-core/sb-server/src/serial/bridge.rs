//! Line buffering on top of an open serial device
//!
//! [`SerialBridge`] owns at most one connection and splits incoming bytes
//! into lines, dropping the `\r` of `\r\n` endings.

use std::collections::VecDeque;
use std::io;
use std::time::{Duration, Instant};

use super::{DEFAULT_READ_TIMEOUT, SerialError, SerialIo, SerialOpener};

/// Upper bound on a single blocking read while waiting for a deadline
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Lower bound on a single read; a zero timeout means "block forever" to some drivers
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// Timeout for the next read when waiting until `deadline`
fn read_slice(deadline: Instant, now: Instant) -> Duration {
    deadline
        .saturating_duration_since(now)
        .clamp(MIN_READ_TIMEOUT, POLL_INTERVAL)
}

/// Serial connection state: closed, or open on one port and baud rate
pub struct SerialBridge {
    opener: Box<dyn SerialOpener>,
    conn: Option<Connection>,
    read_timeout: Duration,
}

struct Connection {
    port: String,
    baud: u32,
    io: Box<dyn SerialIo>,
    /// Bytes of a line that has not been terminated yet
    partial: Vec<u8>,
    lines: VecDeque<String>,
}

impl Connection {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.partial.extend_from_slice(bytes);
        while let Some(pos) = self.partial.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.partial.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            self.lines.push_back(String::from_utf8_lossy(&line).into_owned());
        }
    }

    /// Read until `deadline`, or earlier once `enough` holds for the queue
    fn fill(&mut self, deadline: Instant, enough: impl Fn(&VecDeque<String>) -> bool) -> io::Result<()> {
        let mut buf = [0u8; 256];
        loop {
            if enough(&self.lines) {
                return Ok(());
            }
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            let n = self.io.read(&mut buf, read_slice(deadline, now))?;
            self.push_bytes(&buf[..n]);
        }
    }
}

impl SerialBridge {
    pub fn new(opener: Box<dyn SerialOpener>) -> Self {
        Self {
            opener,
            conn: None,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    /// Port and baud rate of the open connection
    pub fn connection(&self) -> Option<(&str, u32)> {
        self.conn.as_ref().map(|c| (c.port.as_str(), c.baud))
    }

    /// Open `port`, reusing the connection when the parameters are unchanged
    pub fn open(&mut self, port: &str, baud: u32) -> Result<(), SerialError> {
        if self.connection() == Some((port, baud)) {
            return Ok(());
        }
        self.close();

        let io = self
            .opener
            .open(port, baud)
            .map_err(|e| SerialError::Unavailable {
                port: port.to_string(),
                reason: e.to_string(),
            })?;
        self.conn = Some(Connection {
            port: port.to_string(),
            baud,
            io,
            partial: Vec::new(),
            lines: VecDeque::new(),
        });
        Ok(())
    }

    pub fn close(&mut self) {
        if let Some(conn) = self.conn.take() {
            log::info!("Closed serial port {}", conn.port);
        }
    }

    /// Collect the lines that complete within `duration`
    ///
    /// Input received before the call is discarded. Only lines starting with
    /// `prefix` are returned when one is given.
    pub fn listen(&mut self, duration: Duration, prefix: Option<&str>) -> Result<Vec<String>, SerialError> {
        let lines = self.transfer(|conn| {
            conn.io.discard_input()?;
            conn.partial.clear();
            conn.lines.clear();
            conn.fill(Instant::now() + duration, |_| false)?;
            Ok(conn.lines.drain(..).collect::<Vec<_>>())
        })?;

        Ok(match prefix {
            Some(prefix) => lines.into_iter().filter(|l| l.starts_with(prefix)).collect(),
            None => lines,
        })
    }

    /// Return up to `max_lines` lines, waiting at most the read timeout
    ///
    /// A `max_lines` of zero is treated as one.
    pub fn read(&mut self, max_lines: usize) -> Result<Vec<String>, SerialError> {
        let wanted = max_lines.max(1);
        let deadline = Instant::now() + self.read_timeout;
        self.transfer(|conn| {
            conn.fill(deadline, |lines| lines.len() >= wanted)?;
            let n = wanted.min(conn.lines.len());
            Ok(conn.lines.drain(..n).collect())
        })
    }

    /// Send `text`, followed by a newline when `append_newline` is set
    pub fn write(&mut self, text: &str, append_newline: bool) -> Result<usize, SerialError> {
        let mut data = text.as_bytes().to_vec();
        if append_newline {
            data.push(b'\n');
        }
        self.transfer(|conn| conn.io.write_all(&data))?;
        Ok(data.len())
    }

    pub fn available_ports(&self) -> Result<Vec<String>, SerialError> {
        self.opener
            .available_ports()
            .map_err(|e| SerialError::Enumerate(e.to_string()))
    }

    /// Run an I/O step on the open connection, closing it if the step fails
    fn transfer<T>(&mut self, step: impl FnOnce(&mut Connection) -> io::Result<T>) -> Result<T, SerialError> {
        let conn = self.conn.as_mut().ok_or(SerialError::NotOpen)?;
        match step(conn) {
            Ok(value) => Ok(value),
            Err(e) => {
                let port = conn.port.clone();
                log::warn!("Serial I/O on {port} failed, closing: {e}");
                self.conn = None;
                Err(SerialError::Unavailable {
                    port,
                    reason: e.to_string(),
                })
            }
        }
    }
}

impl Drop for SerialBridge {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::FakeSerial;
    use sb_model::ErrorKind;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn bridge_with(fake: FakeSerial) -> SerialBridge {
        SerialBridge::new(Box::new(fake)).with_read_timeout(ms(300))
    }

    #[test]
    fn test_read_slice_is_never_zero() {
        let now = Instant::now();
        assert_eq!(read_slice(now + Duration::from_nanos(200), now), MIN_READ_TIMEOUT);
        assert_eq!(read_slice(now, now + ms(5)), MIN_READ_TIMEOUT);
        assert_eq!(read_slice(now + ms(20), now), ms(20));
        assert_eq!(read_slice(now + ms(900), now), POLL_INTERVAL);
    }

    #[test]
    fn test_tiny_listen_window_returns_promptly() {
        let fake = FakeSerial::new(["COM5"]).with_line(ms(500), "late");
        let mut bridge = bridge_with(fake);
        bridge.open("COM5", 9600).unwrap();

        let started = Instant::now();
        let lines = bridge.listen(Duration::from_micros(300), None).unwrap();
        assert!(lines.is_empty());
        assert!(started.elapsed() < ms(250));
    }

    #[test]
    fn test_listen_returns_lines_inside_window() {
        let fake = FakeSerial::new(["COM5"])
            .with_line(ms(0), "boot")
            .with_line(ms(300), "on")
            .with_line(ms(600), "off")
            .with_line(ms(900), "on")
            .with_line(ms(1600), "late");
        let mut bridge = bridge_with(fake);
        bridge.open("COM5", 9600).unwrap();
        std::thread::sleep(ms(50));

        let lines = bridge.listen(ms(1200), None).unwrap();
        assert_eq!(lines, ["on", "off", "on"]);
    }

    #[test]
    fn test_listen_prefix_filter() {
        let fake = FakeSerial::new(["COM5"])
            .with_line(ms(100), "T:21.5")
            .with_line(ms(150), "debug")
            .with_line(ms(200), "T:21.7");
        let mut bridge = bridge_with(fake);
        bridge.open("COM5", 9600).unwrap();

        let lines = bridge.listen(ms(500), Some("T:")).unwrap();
        assert_eq!(lines, ["T:21.5", "T:21.7"]);
    }

    #[test]
    fn test_partial_line_stays_buffered() {
        let fake = FakeSerial::new(["COM5"])
            .with_output(ms(50), "hel")
            .with_output(ms(400), "lo\n");
        let mut bridge = bridge_with(fake);
        bridge.open("COM5", 9600).unwrap();

        assert!(bridge.read(1).unwrap().is_empty());
        assert_eq!(bridge.read(1).unwrap(), ["hello"]);
    }

    #[test]
    fn test_read_zero_means_one() {
        let fake = FakeSerial::new(["COM5"])
            .with_line(ms(0), "a")
            .with_line(ms(0), "b");
        let mut bridge = bridge_with(fake);
        bridge.open("COM5", 9600).unwrap();

        assert_eq!(bridge.read(0).unwrap(), ["a"]);
        assert_eq!(bridge.read(5).unwrap(), ["b"]);
    }

    #[test]
    fn test_write_appends_newline() {
        let fake = FakeSerial::new(["COM5"]);
        let handle = fake.handle();
        let mut bridge = bridge_with(fake);

        assert!(matches!(bridge.write("on", true), Err(SerialError::NotOpen)));

        bridge.open("COM5", 9600).unwrap();
        assert_eq!(bridge.write("on", true).unwrap(), 3);
        assert_eq!(bridge.write("off", false).unwrap(), 3);
        assert_eq!(handle.written_text(), "on\noff");
    }

    #[test]
    fn test_open_is_idempotent_for_same_parameters() {
        let fake = FakeSerial::new(["COM5", "COM6"]);
        let handle = fake.handle();
        let mut bridge = bridge_with(fake);

        bridge.open("COM5", 9600).unwrap();
        bridge.open("COM5", 9600).unwrap();
        bridge.open("COM6", 9600).unwrap();
        assert_eq!(
            handle.opens(),
            [("COM5".to_string(), 9600), ("COM6".to_string(), 9600)]
        );
        assert_eq!(bridge.connection(), Some(("COM6", 9600)));
    }

    #[test]
    fn test_missing_device_is_unavailable() {
        let mut bridge = bridge_with(FakeSerial::new(["COM5"]));
        let err = bridge.open("COM9", 9600).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PortUnavailable);
        assert!(!bridge.is_open());
    }

    #[test]
    fn test_io_error_closes_connection() {
        let fake = FakeSerial::new(["COM5"]);
        let handle = fake.handle();
        let mut bridge = bridge_with(fake);
        bridge.open("COM5", 9600).unwrap();

        handle.set_fail_io(true);
        let err = bridge.write("on", true).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PortUnavailable);
        assert!(!bridge.is_open());
        assert!(!handle.is_open());
    }

    #[test]
    fn test_close_is_noop_when_closed() {
        let fake = FakeSerial::new(["COM5"]);
        let handle = fake.handle();
        let mut bridge = bridge_with(fake);
        bridge.close();

        bridge.open("COM5", 9600).unwrap();
        assert!(handle.is_open());
        bridge.close();
        bridge.close();
        assert!(!handle.is_open());
    }
}
