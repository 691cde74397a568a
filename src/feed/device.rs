//! Serial device access behind a replaceable opener.

use std::{
    io::{self, Read},
    time::Duration,
};

/// Opens the byte stream the reader loop consumes.
///
/// Reads on the returned stream must give up after `timeout` with
/// [`io::ErrorKind::TimedOut`] or [`io::ErrorKind::WouldBlock`] so the loop can
/// observe its stop signal.
pub trait DeviceOpener: Send + Sync {
    fn open(&self, port: &str, baud: u32, timeout: Duration) -> io::Result<Box<dyn Read + Send>>;
}

/// Opens real serial ports through the `serialport` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SerialPortOpener;

impl DeviceOpener for SerialPortOpener {
    fn open(&self, port: &str, baud: u32, timeout: Duration) -> io::Result<Box<dyn Read + Send>> {
        let device = serialport::new(port, baud).timeout(timeout).open()?;
        Ok(Box::new(SerialDevice(device)))
    }
}

struct SerialDevice(Box<dyn serialport::SerialPort>);

impl Read for SerialDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}
