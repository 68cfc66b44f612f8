//! This module contains small types decoded from single PSU registers.

use strum_macros::EnumIter;

/// "Protection status register".
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
pub enum ProtectionStatus {
    /// 0: No protection tripped.
    None,
    /// 1: OVP overvoltage protection.
    OverVoltage,
    /// 2: OCP overcurrent protection.
    OverCurrent,
    /// Any other raw value.
    Unknown,
}

impl From<u16> for ProtectionStatus {
    fn from(value: u16) -> Self {
        match value {
            0 => ProtectionStatus::None,
            1 => ProtectionStatus::OverVoltage,
            2 => ProtectionStatus::OverCurrent,
            _ => ProtectionStatus::Unknown,
        }
    }
}

/// Represents the power supply regulation modes.
#[derive(Debug, EnumIter, PartialEq, Eq, Clone, Copy)]
pub enum ControlMode {
    /// Constant voltage regulation mode.
    ConstantVoltage,
    /// Constant current regulation mode.
    ConstantCurrent,
    /// Any other raw value.
    Unknown,
}

impl From<u16> for ControlMode {
    fn from(value: u16) -> Self {
        match value {
            0 => ControlMode::ConstantVoltage,
            1 => ControlMode::ConstantCurrent,
            _ => ControlMode::Unknown,
        }
    }
}

/// Backlight brightness level.
///
/// Range = 0-5. 0 is darkest, and 5 is the brightest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct BacklightLevel(u16);

impl BacklightLevel {
    pub const MAX: u16 = 5;
}

impl TryFrom<u16> for BacklightLevel {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Self::MAX {
            Ok(BacklightLevel(value))
        } else {
            Err(())
        }
    }
}

impl From<BacklightLevel> for u16 {
    fn from(value: BacklightLevel) -> Self {
        value.0
    }
}
