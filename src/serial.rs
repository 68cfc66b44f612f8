//! [`SerialLink`] over a host serial port, using the `serialport` crate.
//!
//! The port is opened lazily on first use. With
//! [`SerialConfig::close_after_call`] set, the OS handle is dropped after every Modbus
//! transaction and opened again for the next one.

use core::time::Duration;

use log::debug;
use serialport::SerialPort;

use crate::{config::SerialConfig, transport::SerialLink};

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl IoError {
    pub fn into_inner(self) -> std::io::Error {
        self.0
    }
}

impl From<std::io::Error> for IoError {
    fn from(value: std::io::Error) -> Self {
        IoError(value)
    }
}

impl From<serialport::Error> for IoError {
    fn from(value: serialport::Error) -> Self {
        IoError(value.into())
    }
}

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::ConnectionRefused => embedded_io::ErrorKind::ConnectionRefused,
            std::io::ErrorKind::ConnectionReset => embedded_io::ErrorKind::ConnectionReset,
            std::io::ErrorKind::ConnectionAborted => embedded_io::ErrorKind::ConnectionAborted,
            std::io::ErrorKind::NotConnected => embedded_io::ErrorKind::NotConnected,
            std::io::ErrorKind::AddrInUse => embedded_io::ErrorKind::AddrInUse,
            std::io::ErrorKind::AddrNotAvailable => embedded_io::ErrorKind::AddrNotAvailable,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::AlreadyExists => embedded_io::ErrorKind::AlreadyExists,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            std::io::ErrorKind::OutOfMemory => embedded_io::ErrorKind::OutOfMemory,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

/// A host serial port configured from a [`SerialConfig`].
///
/// 8 data bits, 1 stop bit, no parity.
pub struct SerialPortLink {
    config: SerialConfig,
    /// Current read timeout. Starts at [`SerialConfig::timeout`].
    timeout: Duration,
    port: Option<Box<dyn SerialPort>>,
}

impl SerialPortLink {
    /// Does not touch the port yet.
    pub fn new(config: SerialConfig) -> Self {
        Self {
            timeout: config.timeout,
            config,
            port: None,
        }
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>, IoError> {
        if self.port.is_none() {
            debug!(
                "Opening {} at {} baud",
                self.config.path, self.config.baud_rate
            );
            let port = serialport::new(&self.config.path, self.config.baud_rate)
                .timeout(self.timeout)
                .open()?;
            self.port = Some(port);
        }
        self.port
            .as_mut()
            .ok_or_else(|| IoError(std::io::ErrorKind::NotConnected.into()))
    }
}

impl embedded_io::ErrorType for SerialPortLink {
    type Error = IoError;
}

impl embedded_io::Read for SerialPortLink {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(self.port()?, buf).map_err(IoError)
    }
}

impl embedded_io::Write for SerialPortLink {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(self.port()?, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(self.port()?).map_err(IoError)
    }
}

impl SerialLink for SerialPortLink {
    fn open(&mut self) -> Result<(), Self::Error> {
        self.port().map(|_| ())
    }

    fn close(&mut self) -> Result<(), Self::Error> {
        if self.config.close_after_call && self.port.take().is_some() {
            debug!("Closed {}", self.config.path);
        }
        Ok(())
    }

    fn reconnect(&mut self) -> Result<(), Self::Error> {
        debug!("Reconnecting {}", self.config.path);
        self.port = None;
        self.port().map(|_| ())
    }

    fn set_timeout(&mut self, timeout: Duration) -> Result<(), Self::Error> {
        self.timeout = timeout;
        if let Some(port) = self.port.as_mut() {
            port.set_timeout(timeout)?;
        }
        Ok(())
    }
}
