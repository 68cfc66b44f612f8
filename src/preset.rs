use strum::EnumCount;
use strum_macros::{EnumCount as EnumCountMacro, EnumIter};

use crate::{register::RidenRegister, scaling::ScalingFactors};

/// The base address of the first preset registers.
///
/// Base address of preset = PRESET_OFFSET + {group number} * PRESET_STRIDE.
///
/// There are 10 groups: M0 - M9.
pub const PRESET_OFFSET: u16 = RidenRegister::M0V as u16;

/// Registers per preset group.
pub const PRESET_STRIDE: u16 = PresetOffset::COUNT as u16;

/// These are the offsets from the base address of each preset group.
///
/// See [`PRESET_OFFSET`] for calculating the base address of any group.
#[derive(Debug, Copy, Clone, EnumCountMacro, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u16)]
pub enum PresetOffset {
    /// __R/W__ - Voltage setting.
    VSet = 0x00,
    /// __R/W__ - Current setting.
    ISet = 0x01,
    /// __R/W__ - Over voltage protection.
    SOvp = 0x02,
    /// __R/W__ - Over current protection.
    SOcp = 0x03,
}

impl PresetOffset {
    /// Return the address of this register provided the group number (0 - 9).
    pub fn address_in_group(&self, group: PresetGroup) -> u16 {
        PRESET_OFFSET + (group as u16 * PRESET_STRIDE) + *self as u16
    }
}

/// This enum represents all possible preset groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
#[repr(u16)]
pub enum PresetGroup {
    M0 = 0x00,
    M1 = 0x01,
    M2 = 0x02,
    M3 = 0x03,
    M4 = 0x04,
    M5 = 0x05,
    M6 = 0x06,
    M7 = 0x07,
    M8 = 0x08,
    M9 = 0x09,
}

impl TryFrom<u16> for PresetGroup {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        use PresetGroup as PG;
        match value {
            0 => Ok(PG::M0),
            1 => Ok(PG::M1),
            2 => Ok(PG::M2),
            3 => Ok(PG::M3),
            4 => Ok(PG::M4),
            5 => Ok(PG::M5),
            6 => Ok(PG::M6),
            7 => Ok(PG::M7),
            8 => Ok(PG::M8),
            9 => Ok(PG::M9),
            _ => Err(()),
        }
    }
}

impl From<PresetGroup> for u16 {
    fn from(value: PresetGroup) -> Self {
        value as u16
    }
}

/// Contents of one preset memory slot, in volts and amps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Preset {
    /// Output voltage value.
    pub voltage: f64,
    /// Output current limit value.
    pub current: f64,
    /// Over-voltage protection level.
    pub over_voltage: f64,
    /// Over-current protection level.
    pub over_current: f64,
}

impl Preset {
    pub fn decode(words: &[u16; PresetOffset::COUNT], scaling: &ScalingFactors) -> Self {
        use PresetOffset as PO;

        Self {
            voltage: scaling.raw_to_voltage(words[PO::VSet as usize]),
            current: scaling.raw_to_current(words[PO::ISet as usize]),
            over_voltage: scaling.raw_to_voltage(words[PO::SOvp as usize]),
            over_current: scaling.raw_to_current(words[PO::SOcp as usize]),
        }
    }

    /// Raw register values of this preset. `None` if any value does not fit a register.
    pub fn encode(&self, scaling: &ScalingFactors) -> Option<[u16; PresetOffset::COUNT]> {
        use PresetOffset as PO;

        let mut write_buffer = [0x00u16; PO::COUNT];
        write_buffer[PO::VSet as usize] = scaling.voltage_to_raw(self.voltage)?;
        write_buffer[PO::ISet as usize] = scaling.current_to_raw(self.current)?;
        write_buffer[PO::SOvp as usize] = scaling.voltage_to_raw(self.over_voltage)?;
        write_buffer[PO::SOcp as usize] = scaling.current_to_raw(self.over_current)?;
        Some(write_buffer)
    }
}
