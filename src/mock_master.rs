//! In-memory register bank standing in for a Modbus master in unit tests.

use std::collections::VecDeque;

use crate::error::{Error, Result};
use crate::mock_serial::MockSerialError;
use crate::transport::ModbusMaster;

/// Every request that reached the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Read { address: u16, count: u16 },
    Write { address: u16, value: u16 },
    WriteMultiple { address: u16, values: Vec<u16> },
}

pub struct MockMaster {
    registers: Vec<u16>,
    /// Errors handed out, in order, before requests are served again.
    failures: VecDeque<Error<MockSerialError>>,
    requests: Vec<Request>,
    /// Length the next read reply is cut down to.
    short_read: Option<usize>,
}

impl MockMaster {
    pub fn new() -> Self {
        Self {
            registers: vec![0; 0x200],
            failures: VecDeque::new(),
            requests: Vec::new(),
            short_read: None,
        }
    }

    /// Preload registers starting at `address`.
    pub fn with_registers(mut self, address: u16, values: &[u16]) -> Self {
        self.set(address, values);
        self
    }

    pub fn set(&mut self, address: u16, values: &[u16]) {
        let start = address as usize;
        self.registers[start..start + values.len()].copy_from_slice(values);
    }

    pub fn get(&self, address: u16) -> u16 {
        self.registers[address as usize]
    }

    /// Fail the next request with `error`.
    pub fn fail_next(&mut self, error: Error<MockSerialError>) {
        self.failures.push_back(error);
    }

    /// Answer the next read with only `len` words.
    pub fn shorten_next_read(&mut self, len: usize) {
        self.short_read = Some(len);
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn reads(&self) -> usize {
        self.requests
            .iter()
            .filter(|r| matches!(r, Request::Read { .. }))
            .count()
    }

    fn serve(&mut self, request: Request) -> Result<(), MockSerialError> {
        self.requests.push(request);
        match self.failures.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl ModbusMaster for MockMaster {
    type Error = MockSerialError;

    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>, MockSerialError> {
        self.serve(Request::Read { address, count })?;
        let start = address as usize;
        let len = self.short_read.take().unwrap_or(count as usize);
        Ok(self.registers[start..start + len].to_vec())
    }

    fn write_single_register(&mut self, address: u16, value: u16) -> Result<(), MockSerialError> {
        self.serve(Request::Write { address, value })?;
        self.registers[address as usize] = value;
        Ok(())
    }

    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<(), MockSerialError> {
        self.serve(Request::WriteMultiple {
            address,
            values: values.to_vec(),
        })?;
        self.set(address, values);
        Ok(())
    }
}
