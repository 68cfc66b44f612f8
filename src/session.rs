//! Register access for one attached PSU.
//!
//! A [`DeviceSession`] is the sole owner of the Modbus master. Every read and write goes
//! through it, and a garbled or missing reply is retried with a bounded policy before
//! [`Error::TransportExhausted`] is surfaced.
//!
//! A session is not safe for concurrent calls. Callers needing shared access must serialize
//! it themselves, e.g. with one mutex around the whole session.

use log::{debug, warn};
use retry::OperationResult;

use crate::{
    config::RetryPolicy,
    error::{Error, Result},
    register::{CALIBRATION, RidenRegister},
    transport::ModbusMaster,
};

/// Identity block of the PSU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Raw model identity, see [`ModelProfile`](crate::model::ModelProfile).
    pub id: u16,
    pub serial_number: u32,
    /// Firmware version. `128` => `v1.28`.
    pub firmware: u16,
}

impl DeviceInfo {
    /// Serial number as printed on the device.
    pub fn serial(&self) -> String {
        format!("{:08}", self.serial_number)
    }
}

pub struct DeviceSession<M: ModbusMaster> {
    master: M,
    retry: RetryPolicy,
}

impl<M: ModbusMaster> DeviceSession<M> {
    /// Create a session using the default [`RetryPolicy`].
    pub fn new(master: M) -> Self {
        Self::with_retry(master, RetryPolicy::default())
    }

    pub fn with_retry(master: M, retry: RetryPolicy) -> Self {
        Self { master, retry }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn master_mut(&mut self) -> &mut M {
        &mut self.master
    }

    pub fn into_master(self) -> M {
        self.master
    }

    /// Read `count` consecutive holding registers.
    pub fn read_registers(
        &mut self,
        register: impl Into<u16>,
        count: u16,
    ) -> Result<Vec<u16>, M::Error> {
        let register = register.into();
        let words = self.retrying(register, |master| {
            master.read_holding_registers(register, count)
        })?;
        if words.len() != count as usize {
            return Err(Error::UnexpectedLength {
                register,
                expected: count as usize,
                actual: words.len(),
            });
        }
        debug!("Read {count} registers at {register}: {words:?}");
        Ok(words)
    }

    /// Read `N` consecutive holding registers into an array.
    pub fn read_band<const N: usize>(
        &mut self,
        register: impl Into<u16>,
    ) -> Result<[u16; N], M::Error> {
        let register = register.into();
        let words = self.read_registers(register, N as u16)?;
        let actual = words.len();
        words.try_into().map_err(|_| Error::UnexpectedLength {
            register,
            expected: N,
            actual,
        })
    }

    /// Read a single holding register.
    pub fn read_register(&mut self, register: impl Into<u16>) -> Result<u16, M::Error> {
        let [word] = self.read_band::<1>(register)?;
        Ok(word)
    }

    /// Write a single holding register. Calibration registers are refused, see
    /// [`Self::write_calibration_register`].
    pub fn write_register(&mut self, register: impl Into<u16>, value: u16) -> Result<(), M::Error> {
        let register = register.into();
        check_writable::<M::Error>(register, 1)?;
        debug!("Write {value} to register {register}");
        self.retrying(register, |master| {
            master.write_single_register(register, value)
        })
    }

    /// Write consecutive holding registers in one request.
    pub fn write_registers(
        &mut self,
        register: impl Into<u16>,
        values: &[u16],
    ) -> Result<(), M::Error> {
        let register = register.into();
        check_writable::<M::Error>(register, values.len())?;
        debug!("Write {values:?} to registers at {register}");
        self.retrying(register, |master| {
            master.write_multiple_registers(register, values)
        })
    }

    /// Overwrite a factory calibration register.
    ///
    /// __Note:__ A wrong value here skews every reading and set-point of the PSU. Only call
    /// this on explicit operator request.
    pub fn write_calibration_register(
        &mut self,
        register: RidenRegister,
        value: u16,
    ) -> Result<(), M::Error> {
        if !register.is_calibration() {
            return Err(Error::InvalidRange);
        }
        let address = register as u16;
        warn!("Overwriting calibration register {register:?} with {value}");
        self.retrying(address, |master| {
            master.write_single_register(address, value)
        })
    }

    /// Write a register the device does not answer, e.g. a reboot command. A missing or
    /// garbled reply counts as success, and nothing is retried.
    pub fn write_register_unacknowledged(
        &mut self,
        register: impl Into<u16>,
        value: u16,
    ) -> Result<(), M::Error> {
        let register = register.into();
        check_writable::<M::Error>(register, 1)?;
        match self.master.write_single_register(register, value) {
            Ok(()) => Ok(()),
            Err(err) if err.is_transient() => {
                debug!("Register {register}: no acknowledgement ({err})");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Read the identity block in one request.
    pub fn read_identity(&mut self) -> Result<DeviceInfo, M::Error> {
        let [id, sn_high, sn_low, firmware] = self.read_band::<4>(RidenRegister::Id)?;
        Ok(DeviceInfo {
            id,
            serial_number: ((sn_high as u32) << 16) | sn_low as u32,
            firmware,
        })
    }

    fn retrying<T>(
        &mut self,
        register: u16,
        mut request: impl FnMut(&mut M) -> Result<T, M::Error>,
    ) -> Result<T, M::Error> {
        let master = &mut self.master;
        let outcome = retry::retry_with_index(self.retry.delays(), |attempt| {
            match request(&mut *master) {
                Ok(value) => OperationResult::Ok(value),
                Err(err) if err.is_transient() => {
                    warn!("Register {register}: attempt {attempt} failed: {err}");
                    OperationResult::Retry(err)
                }
                Err(err) => OperationResult::Err(err),
            }
        });

        match outcome {
            Ok(value) => Ok(value),
            Err(retry::Error::Operation { error, tries, .. }) if error.is_transient() => {
                Err(Error::TransportExhausted {
                    register,
                    attempts: tries,
                })
            }
            Err(retry::Error::Operation { error, .. }) => Err(error),
            Err(retry::Error::Internal(reason)) => {
                warn!("Register {register}: retry aborted: {reason}");
                Err(Error::TransportExhausted {
                    register,
                    attempts: self.retry.max_attempts as u64,
                })
            }
        }
    }
}

fn check_writable<I: embedded_io::Error>(register: u16, count: usize) -> Result<(), I> {
    let start = register as usize;
    match (start..start + count).find(|address| CALIBRATION.contains(&(*address as u16))) {
        Some(address) => Err(Error::ProtectedRegister(address as u16)),
        None => Ok(()),
    }
}
