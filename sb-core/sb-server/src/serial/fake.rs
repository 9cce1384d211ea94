//! Fake serial device for testing and development
//!
//! Plays back a script of timed output, measured from the moment the port is
//! opened, and records everything written to it. Reopening the port restarts
//! the script.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::{SerialIo, SerialOpener};

#[derive(Debug, Default)]
struct FakeState {
    ports: Vec<String>,
    script: Vec<(Duration, Vec<u8>)>,
    written: Vec<u8>,
    opens: Vec<(String, u32)>,
    open_handles: usize,
    fail_io: bool,
}

/// Scripted serial device that also acts as its own opener
#[derive(Debug, Clone, Default)]
pub struct FakeSerial {
    state: Arc<Mutex<FakeState>>,
}

/// Inspection handle onto a [`FakeSerial`] that has been moved into a bridge
#[derive(Debug, Clone)]
pub struct FakeSerialHandle {
    state: Arc<Mutex<FakeState>>,
}

fn lock(state: &Mutex<FakeState>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

impl FakeSerial {
    /// Create a device reachable under the given port names
    pub fn new<I, S>(ports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fake = Self::default();
        lock(&fake.state).ports = ports.into_iter().map(Into::into).collect();
        fake
    }

    /// Emit raw bytes `at` after the port is opened
    pub fn with_output(self, at: Duration, bytes: impl AsRef<[u8]>) -> Self {
        {
            let mut state = lock(&self.state);
            state.script.push((at, bytes.as_ref().to_vec()));
            state.script.sort_by_key(|(at, _)| *at);
        }
        self
    }

    /// Emit `line` terminated by `\r\n`, as Arduino's `Serial.println` does
    pub fn with_line(self, at: Duration, line: &str) -> Self {
        self.with_output(at, format!("{line}\r\n"))
    }

    pub fn handle(&self) -> FakeSerialHandle {
        FakeSerialHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl FakeSerialHandle {
    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&lock(&self.state).written).into_owned()
    }

    /// Every `(port, baud)` the device was opened with, in order
    pub fn opens(&self) -> Vec<(String, u32)> {
        lock(&self.state).opens.clone()
    }

    pub fn is_open(&self) -> bool {
        lock(&self.state).open_handles > 0
    }

    /// Make every subsequent read or write fail, as an unplugged device would
    pub fn set_fail_io(&self, fail: bool) {
        lock(&self.state).fail_io = fail;
    }
}

impl SerialOpener for FakeSerial {
    fn open(&mut self, port: &str, baud: u32) -> io::Result<Box<dyn SerialIo>> {
        let mut state = lock(&self.state);
        if !state.ports.iter().any(|p| p == port) {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device: {port}"),
            ));
        }
        state.opens.push((port.to_string(), baud));
        state.open_handles += 1;
        Ok(Box::new(FakePort {
            state: Arc::clone(&self.state),
            opened_at: Instant::now(),
            cursor: 0,
            inbox: VecDeque::new(),
        }))
    }

    fn available_ports(&self) -> io::Result<Vec<String>> {
        Ok(lock(&self.state).ports.clone())
    }
}

struct FakePort {
    state: Arc<Mutex<FakeState>>,
    opened_at: Instant,
    cursor: usize,
    inbox: VecDeque<u8>,
}

impl FakePort {
    /// Move output that is due into the inbox; returns when the next is due
    fn collect_due(&mut self) -> io::Result<Option<Instant>> {
        let state = lock(&self.state);
        if state.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        let elapsed = self.opened_at.elapsed();
        while let Some((at, bytes)) = state.script.get(self.cursor) {
            if *at > elapsed {
                return Ok(Some(self.opened_at + *at));
            }
            self.inbox.extend(bytes.iter().copied());
            self.cursor += 1;
        }
        Ok(None)
    }
}

impl SerialIo for FakePort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        let deadline = Instant::now() + timeout;
        loop {
            let next_due = self.collect_due()?;
            if !self.inbox.is_empty() {
                let n = buf.len().min(self.inbox.len());
                for (slot, byte) in buf.iter_mut().zip(self.inbox.drain(..n)) {
                    *slot = byte;
                }
                return Ok(n);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(0);
            }
            let wake = next_due.map_or(deadline, |due| due.min(deadline));
            std::thread::sleep(wake.saturating_duration_since(now));
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        let mut state = lock(&self.state);
        if state.fail_io {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device disconnected"));
        }
        state.written.extend_from_slice(data);
        Ok(())
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.collect_due()?;
        self.inbox.clear();
        Ok(())
    }
}

impl Drop for FakePort {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.open_handles = state.open_handles.saturating_sub(1);
    }
}
