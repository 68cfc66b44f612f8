//! Modbus RTU transport.
//!
//! [`ModbusMaster`] is the seam between the device model and the wire: three holding register
//! operations and nothing else. [`RtuMaster`] implements it over any serial link implementing
//! [`embedded_io::Read`] & [`embedded_io::Write`], using `rmodbus` for framing and CRC.

use core::time::Duration;

use log::trace;
use rmodbus::{ModbusProto, client::ModbusRequest};

use crate::error::{Error, Result};

/// Bulk register read and register write capabilities of a Modbus master.
pub trait ModbusMaster {
    type Error: embedded_io::Error;

    /// Function `0x03`, Read Holding Registers.
    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, Self::Error>;

    /// Function `0x06`, Write Single Register.
    fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), Self::Error>;

    /// Function `0x10`, Write Multiple Registers.
    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<(), Self::Error>;
}

/// A byte link to the PSU, with hooks around every transaction.
///
/// The defaults do nothing, which suits links that stay open for their whole life.
pub trait SerialLink: embedded_io::Read + embedded_io::Write {
    /// Called before a request is sent.
    fn open(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    /// Called once the reply has been received, or the attempt given up.
    fn close(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    /// Drop the connection and establish it again, e.g. after the device rebooted.
    fn reconnect(&mut self) -> core::result::Result<(), Self::Error> {
        Ok(())
    }

    /// Change how long a read may block before giving up.
    fn set_timeout(&mut self, _timeout: Duration) -> core::result::Result<(), Self::Error> {
        Ok(())
    }
}

impl<S: SerialLink + ?Sized> SerialLink for &mut S {
    fn open(&mut self) -> core::result::Result<(), Self::Error> {
        (**self).open()
    }

    fn close(&mut self) -> core::result::Result<(), Self::Error> {
        (**self).close()
    }

    fn reconnect(&mut self) -> core::result::Result<(), Self::Error> {
        (**self).reconnect()
    }

    fn set_timeout(&mut self, timeout: Duration) -> core::result::Result<(), Self::Error> {
        (**self).set_timeout(timeout)
    }
}

/// Read until `buf` is full or the link times out. Returns the number of bytes read, so a
/// timed-out read yields a short (possibly empty) result rather than an error.
pub fn read_until_full<S: embedded_io::Read + ?Sized>(
    link: &mut S,
    buf: &mut [u8],
) -> core::result::Result<usize, S::Error> {
    use embedded_io::Error as _;

    let mut filled = 0;
    while filled < buf.len() {
        match link.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(bytes_read) => filled += bytes_read,
            Err(e) if e.kind() == embedded_io::ErrorKind::TimedOut => break,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// RTU header: unit id, function and byte count or first address byte.
const RTU_HEADER_LEN: usize = 3;

/// Longest RTU frame.
const RTU_MAX_FRAME: usize = 256;

/// Modbus RTU master over a serial link.
pub struct RtuMaster<S: SerialLink> {
    link: S,
    /// Default for PSU is 0x01.
    unit_id: u8,
}

impl<S: SerialLink> RtuMaster<S> {
    /// Create a new master with the given link and unit ID
    pub fn new(link: S, unit_id: u8) -> Self {
        Self { link, unit_id }
    }

    pub fn link(&self) -> &S {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut S {
        &mut self.link
    }

    pub fn into_link(self) -> S {
        self.link
    }

    /// Send one request and collect one reply, running the link hooks around it.
    fn transact(&mut self, request: &[u8]) -> Result<Vec<u8>, S::Error> {
        self.link.open().map_err(Error::SerialError)?;
        let reply = self.exchange(request);
        let closed = self.link.close().map_err(Error::SerialError);
        let reply = reply?;
        closed?;
        Ok(reply)
    }

    fn exchange(&mut self, request: &[u8]) -> Result<Vec<u8>, S::Error> {
        trace!("TX {request:02X?}");
        self.link.write_all(request).map_err(Error::SerialError)?;
        self.link.flush().map_err(Error::SerialError)?;

        let mut frame = [0u8; RTU_MAX_FRAME];
        let header = read_until_full(&mut self.link, &mut frame[..RTU_HEADER_LEN])
            .map_err(Error::SerialError)?;
        match header {
            0 => return Err(Error::Timeout),
            RTU_HEADER_LEN => {}
            _ => return Err(Error::InvalidResponse),
        }

        let frame_len = rmodbus::guess_response_frame_len(&frame[..RTU_HEADER_LEN], ModbusProto::Rtu)
            .map_err(|_| Error::InvalidResponse)? as usize;
        if frame_len < RTU_HEADER_LEN || frame_len > RTU_MAX_FRAME {
            return Err(Error::InvalidResponse);
        }

        let rest = read_until_full(&mut self.link, &mut frame[RTU_HEADER_LEN..frame_len])
            .map_err(Error::SerialError)?;
        trace!("RX {:02X?}", &frame[..RTU_HEADER_LEN + rest]);
        if RTU_HEADER_LEN + rest != frame_len {
            return Err(Error::InvalidResponse);
        }
        Ok(frame[..frame_len].to_vec())
    }
}

impl<S: SerialLink> ModbusMaster for RtuMaster<S> {
    type Error = S::Error;

    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, S::Error> {
        let mut request = Vec::new();
        let mut req = ModbusRequest::new(self.unit_id, ModbusProto::Rtu);
        req.generate_get_holdings(address, count, &mut request)?;

        let reply = self.transact(&request)?;
        let mut words = Vec::new();
        req.parse_u16(&reply, &mut words)?;
        Ok(words)
    }

    fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), S::Error> {
        let mut request = Vec::new();
        let mut req = ModbusRequest::new(self.unit_id, ModbusProto::Rtu);
        req.generate_set_holding(address, value, &mut request)?;

        let reply = self.transact(&request)?;
        req.parse_ok(&reply)?;
        Ok(())
    }

    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<(), S::Error> {
        let mut request = Vec::new();
        let mut req = ModbusRequest::new(self.unit_id, ModbusProto::Rtu);
        req.generate_set_holdings_bulk(address, values, &mut request)?;

        let reply = self.transact(&request)?;
        req.parse_ok(&reply)?;
        Ok(())
    }
}
