//! Serial devices through the `serialport` crate

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use super::{SerialIo, SerialOpener, rank_ports};

/// Opens real serial devices
#[derive(Debug, Default)]
pub struct SystemSerial;

impl SystemSerial {
    pub fn new() -> Self {
        Self
    }
}

impl SerialOpener for SystemSerial {
    fn open(&mut self, port: &str, baud: u32) -> io::Result<Box<dyn SerialIo>> {
        let handle = serialport::new(port, baud)
            .timeout(Duration::from_millis(100))
            .open()?;
        log::info!("Opened serial port {port} @ {baud} baud");
        Ok(Box::new(SystemPort { port: handle }))
    }

    fn available_ports(&self) -> io::Result<Vec<String>> {
        let ports = serialport::available_ports()?;
        Ok(rank_ports(ports.into_iter().map(|p| p.port_name).collect()))
    }
}

struct SystemPort {
    port: Box<dyn SerialPort>,
}

impl SerialIo for SystemPort {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> io::Result<usize> {
        self.port.set_timeout(timeout)?;
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.port.write_all(data)?;
        self.port.flush()
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
