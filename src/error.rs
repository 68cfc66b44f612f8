//! Our error types for the Riden PSUs.

use thiserror::Error;

pub type Result<T, I> = core::result::Result<T, Error<I>>;

/// Custom error type for Riden PSU communications.
///
/// Generic over the I/O error of the serial link the PSU is attached to.
#[derive(Error, Debug)]
pub enum Error<I: embedded_io::Error> {
    #[error("Serial communication error")]
    SerialError(I),
    #[error("Modbus protocol error: {0}")]
    ModbusError(rmodbus::ErrorKind),
    #[error("Communication timeout")]
    Timeout,
    #[error("Invalid range")]
    InvalidRange,
    #[error("Invalid response received")]
    InvalidResponse,
    #[error("Response buffer overflow")]
    BufferError,
    #[error("Register {register}: expected {expected} words, got {actual}")]
    UnexpectedLength {
        register: u16,
        expected: usize,
        actual: usize,
    },
    #[error("Register {register}: transport still failing after {attempts} attempts")]
    TransportExhausted { register: u16, attempts: u64 },
    #[error("Register {0} is a calibration register and is not written implicitly")]
    ProtectedRegister(u16),
    #[error("Unknown model identity {0}")]
    UnknownModel(u16),
    #[error("Device clock does not hold a valid date and time")]
    InvalidTimestamp,
    #[error("Device did not enter bootloader mode")]
    BootloaderEntryFailed,
    #[error("Bootloader client is not ready ({0:?})")]
    BootloaderNotReady(crate::bootloader::BootloaderState),
    #[error("Invalid response from bootloader")]
    InvalidBootloaderResponse,
    #[error("Bootloader refused to enter flash mode")]
    FlashModeRejected,
    #[error("Firmware chunk {chunk} at byte offset {offset} was rejected")]
    ChunkRejected { chunk: usize, offset: usize },
}

impl<I: embedded_io::Error> Error<I> {
    /// Whether the failure came from a garbled or missing reply, in which case the identical
    /// request may simply be sent again.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Timeout | Error::InvalidResponse => true,
            Error::ModbusError(kind) => matches!(
                kind,
                rmodbus::ErrorKind::FrameBroken
                    | rmodbus::ErrorKind::FrameCRCError
                    | rmodbus::ErrorKind::CommunicationError
            ),
            Error::SerialError(err) => err.kind() == embedded_io::ErrorKind::TimedOut,
            _ => false,
        }
    }
}

impl<I: embedded_io::Error> From<rmodbus::ErrorKind> for Error<I> {
    fn from(err: rmodbus::ErrorKind) -> Self {
        Error::ModbusError(err)
    }
}

impl<I: embedded_io::Error> From<crate::model::UnknownModel> for Error<I> {
    fn from(err: crate::model::UnknownModel) -> Self {
        Error::UnknownModel(err.0)
    }
}
