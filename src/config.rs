//! Connection settings.
//!
//! Every value has a default matching the PSU's factory configuration; override with the
//! `with_*` setters.

use core::time::Duration;

/// Default PSU baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Settings for the serial port and the Modbus unit behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// The port name, usually the device path.
    pub path: String,
    pub baud_rate: u32,
    /// Modbus unit address of the PSU.
    pub unit_id: u8,
    /// How long a read may block during normal operation.
    pub timeout: Duration,
    /// Close the port after every transaction and reopen it before the next one.
    ///
    /// Some host serial drivers cannot share a handle across rapid calls. This costs most
    /// of the throughput, so it is opt-in.
    pub close_after_call: bool,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            path: String::from("/dev/ttyUSB0"),
            baud_rate: DEFAULT_BAUD_RATE,
            unit_id: 1,
            timeout: Duration::from_millis(500),
            close_after_call: false,
        }
    }
}

impl SerialConfig {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_unit_id(mut self, unit_id: u8) -> Self {
        self.unit_id = unit_id;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_close_after_call(mut self, close_after_call: bool) -> Self {
        self.close_after_call = close_after_call;
        self
    }
}

/// How often a register request is repeated when the reply is garbled or missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than one.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(50),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    /// Delays before each retry.
    pub(crate) fn delays(&self) -> impl Iterator<Item = Duration> + use<> {
        let retries = self.max_attempts.max(1) - 1;
        retry::delay::Fixed::from_millis(self.backoff.as_millis() as u64).take(retries as usize)
    }
}

/// Settings for the bootloader handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootloaderConfig {
    /// Read timeout for every bootloader reply.
    pub timeout: Duration,
    /// Time the device needs to reboot into the bootloader.
    pub settle_delay: Duration,
}

impl Default for BootloaderConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            settle_delay: Duration::from_secs(5),
        }
    }
}

impl BootloaderConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }
}
