//! This module is used to define the holding registers on the Riden PSUs.
//!
//! Every model shares this layout. Addresses are grouped into fixed bands, and the
//! bands never move between hardware revisions.

use core::ops::RangeInclusive;

/// Identity block: model id, serial number and firmware version.
pub const IDENTITY: RangeInclusive<u16> = 0..=3;
/// Live telemetry, read on every refresh.
pub const LIVE: RangeInclusive<u16> = 4..=20;
/// Battery and extended telemetry.
pub const EXTENDED: RangeInclusive<u16> = 32..=41;
/// Device clock.
pub const CLOCK: RangeInclusive<u16> = 48..=53;
/// Factory calibration. Read only unless the operator explicitly asks otherwise.
pub const CALIBRATION: RangeInclusive<u16> = 55..=62;
/// Persisted options.
pub const OPTIONS: RangeInclusive<u16> = 66..=72;
/// Ten preset memory slots of four registers each.
pub const PRESETS: RangeInclusive<u16> = 80..=119;

/// Value written to [`RidenRegister::System`] to reboot into the bootloader.
pub const BOOTLOADER_MAGIC: u16 = 5633;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[repr(u16)]
pub enum RidenRegister {
    /// __R__ - Model identity, e.g. `60121` for an RD6012.
    Id = 0,
    /// __R__ - Serial number, upper 16 bits.
    SnHigh = 1,
    /// __R__ - Serial number, lower 16 bits.
    SnLow = 2,
    /// __R__ - Firmware version. `128` => `v1.28`.
    Firmware = 3,
    /// __R__ - Internal temperature sign in Celsius. Non-zero means negative.
    IntCSign = 4,
    /// __R__ - Internal temperature magnitude in Celsius.
    IntC = 5,
    /// __R__ - Internal temperature sign in Fahrenheit.
    IntFSign = 6,
    /// __R__ - Internal temperature magnitude in Fahrenheit.
    IntF = 7,
    /// __R/W__ - Voltage set-point.
    VSet = 8,
    /// __R/W__ - Current set-point.
    ISet = 9,
    /// __R__ - Output voltage.
    VOut = 10,
    /// __R__ - Output current.
    IOut = 11,
    /// __R__ - Output amp-hours, low resolution.
    Ah = 12,
    /// __R__ - Output power.
    POut = 13,
    /// __R__ - Input voltage.
    VIn = 14,
    /// __R__ - Keypad lock.
    Keypad = 15,
    /// __R__ - Protection status.
    ///
    /// See [`ProtectionStatus`](crate::types::ProtectionStatus).
    OvpOcp = 16,
    /// __R__ - Regulation mode.
    ///
    /// See [`ControlMode`](crate::types::ControlMode).
    CvCc = 17,
    /// __R/W__ - Output switch.
    Output = 18,
    /// __R/W__ - Active preset, 0-9.
    Preset = 19,
    /// __R__ - Current range select. Only meaningful on the RD6012P.
    IRange = 20,
    /// __R__ - Battery mode.
    BatMode = 32,
    /// __R__ - Battery voltage.
    VBat = 33,
    /// __R__ - External probe sign in Celsius.
    ExtCSign = 34,
    /// __R__ - External probe magnitude in Celsius.
    ExtC = 35,
    /// __R__ - External probe sign in Fahrenheit.
    ExtFSign = 36,
    /// __R__ - External probe magnitude in Fahrenheit.
    ExtF = 37,
    /// __R__ - Accumulated milli-amp-hours, upper 16 bits.
    AhHigh = 38,
    /// __R__ - Accumulated milli-amp-hours, lower 16 bits.
    AhLow = 39,
    /// __R__ - Accumulated milli-watt-hours, upper 16 bits.
    WhHigh = 40,
    /// __R__ - Accumulated milli-watt-hours, lower 16 bits.
    WhLow = 41,
    /// __R/W__ - Clock year.
    Year = 48,
    Month = 49,
    Day = 50,
    Hour = 51,
    Minute = 52,
    Second = 53,
    /// __R__ - Calibration. Do not write unless you know what you're doing.
    VOutZero = 55,
    VOutScale = 56,
    VBackZero = 57,
    VBackScale = 58,
    IOutZero = 59,
    IOutScale = 60,
    IBackZero = 61,
    IBackScale = 62,
    /// __R/W__ - Ask for confirmation before changing the output.
    OptTakeOk = 66,
    /// __R/W__ - Restore the output state after power-up.
    OptTakeOut = 67,
    /// __R/W__ - Enable the output at boot.
    OptBootPow = 68,
    /// __R/W__ - Buzzer.
    OptBuzz = 69,
    /// __R/W__ - Boot logo.
    OptLogo = 70,
    /// __R/W__ - Display language index.
    OptLang = 71,
    /// __R/W__ - Backlight level, 0-5.
    OptLight = 72,
    /// __R/W__ - Voltage of preset slot M0. Slot `n` starts at `80 + 4 * n`.
    ///
    /// See [`crate::preset`].
    M0V = 80,
    /// __W__ - System command register.
    System = 256,
}

impl RidenRegister {
    /// Whether this register sits in the calibration band.
    pub fn is_calibration(&self) -> bool {
        CALIBRATION.contains(&(*self as u16))
    }
}

impl From<RidenRegister> for u16 {
    fn from(value: RidenRegister) -> Self {
        value as u16
    }
}

/// Number of registers covered by a band.
pub const fn span(band: &RangeInclusive<u16>) -> u16 {
    *band.end() - *band.start() + 1
}
