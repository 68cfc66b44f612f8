//! This crate provides an interface for communicating with and controlling the Riden RD60xx
//! series of programmable power supplies, and for flashing their firmware.
//!
//! Supported PSU models:
//! * RD6006
//! * RD6006P
//! * RD6012
//! * RD6012P
//! * RD6018
//! * RD6024
//!
//! It uses Modbus RTU under the hood and talks to the PSU over its USB serial port or the TTL
//! header. Firmware is uploaded through the bootloader's own ASCII protocol on the same port,
//! see [`bootloader`].
//!
//! The serial port used for PSU comms should be configured like so:
//! * Default baud rate: 115200
//! * Data bits: 8
//! * Stop bits: 1
//! * Parity: None
//!
//! ```no_run
//! use riden_psu::{config::SerialConfig, psu::RidenPsu, serial::SerialPortLink, transport::RtuMaster};
//!
//! let config = SerialConfig::new("/dev/ttyUSB0");
//! let unit_id = config.unit_id;
//! let master = RtuMaster::new(SerialPortLink::new(config), unit_id);
//! let mut psu = RidenPsu::connect(master)?;
//! psu.set_voltage(5.0)?;
//! psu.set_output(true)?;
//! println!("{:.3} V", psu.refresh()?.voltage_out);
//! # Ok::<(), riden_psu::error::Error<riden_psu::serial::IoError>>(())
//! ```
//!
//! The library logs through the [`log`] facade and never installs a logger itself.

pub mod bootloader;
pub mod config;
pub mod error;
pub mod model;
pub mod preset;
pub mod psu;
pub mod register;
pub mod scaling;
pub mod serial;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock_master;
#[cfg(test)]
mod mock_serial;
