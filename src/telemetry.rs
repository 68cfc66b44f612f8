//! Decoding raw register batches into a [`DeviceState`] snapshot.
//!
//! A refresh is two bulk reads: [`LIVE`] and [`EXTENDED_READ`], the latter spanning battery
//! telemetry through the option flags. Decoding is pure. It never touches the device, so the
//! RD6012P range-select register is taken from the live batch rather than read again.

use core::ops::RangeInclusive;

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};

use crate::{
    model::ModelProfile,
    register::{CALIBRATION, EXTENDED, LIVE, OPTIONS, RidenRegister as R, span},
    types::{ControlMode, ProtectionStatus},
};

/// Second bulk read of a refresh: battery telemetry, clock, calibration and options.
pub const EXTENDED_READ: RangeInclusive<u16> = RangeInclusive::new(*EXTENDED.start(), *OPTIONS.end());

pub const LIVE_LEN: usize = span(&LIVE) as usize;
pub const EXTENDED_LEN: usize = span(&EXTENDED_READ) as usize;
pub const CALIBRATION_LEN: usize = span(&CALIBRATION) as usize;
pub const OPTIONS_LEN: usize = span(&OPTIONS) as usize;

/// Sign-magnitude value: a non-zero sign register means negative.
pub fn signed(sign: u16, magnitude: u16) -> i32 {
    if sign != 0 {
        -(magnitude as i32)
    } else {
        magnitude as i32
    }
}

/// 32-bit accumulator in thousandths, split over a high and a low register.
pub fn accumulator(high: u16, low: u16) -> f64 {
    (((high as u32) << 16) | low as u32) as f64 / 1000.0
}

/// Words of one bulk read, addressed by register.
struct Batch<'a> {
    start: u16,
    words: &'a [u16],
}

impl Batch<'_> {
    /// Panics if `register` lies outside the batch, which is a bug in the caller.
    fn get(&self, register: R) -> u16 {
        self.words[(register as u16 - self.start) as usize]
    }

    fn flag(&self, register: R) -> bool {
        self.get(register) != 0
    }

    fn signed(&self, sign: R, magnitude: R) -> i32 {
        signed(self.get(sign), self.get(magnitude))
    }

    fn accumulator(&self, high: R, low: R) -> f64 {
        accumulator(self.get(high), self.get(low))
    }
}

/// A temperature probe reading, reported by the device in both units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Temperature {
    pub celsius: i32,
    pub fahrenheit: i32,
}

/// Device real-time clock. No timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceClock {
    pub year: u16,
    pub month: u16,
    pub day: u16,
    pub hour: u16,
    pub minute: u16,
    pub second: u16,
}

impl DeviceClock {
    pub fn from_words(words: [u16; 6]) -> Self {
        let [year, month, day, hour, minute, second] = words;
        Self {
            year,
            month,
            day,
            hour,
            minute,
            second,
        }
    }

    pub fn to_words(&self) -> [u16; 6] {
        [
            self.year,
            self.month,
            self.day,
            self.hour,
            self.minute,
            self.second,
        ]
    }

    /// Returns `None` if the registers do not hold a calendar date and time.
    pub fn to_datetime(&self) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)?.and_hms_opt(
            self.hour as u32,
            self.minute as u32,
            self.second as u32,
        )
    }

    /// Returns `None` for years a register cannot hold.
    pub fn from_datetime(datetime: &NaiveDateTime) -> Option<Self> {
        Some(Self {
            year: u16::try_from(datetime.year()).ok()?,
            month: datetime.month() as u16,
            day: datetime.day() as u16,
            hour: datetime.hour() as u16,
            minute: datetime.minute() as u16,
            second: datetime.second() as u16,
        })
    }
}

/// Persisted options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Options {
    /// Ask for confirmation before the output is switched.
    pub confirm_output_change: bool,
    /// Restore the output state after power-up.
    pub restore_output: bool,
    /// Enable the output at boot.
    pub power_on_boot: bool,
    pub buzzer: bool,
    pub boot_logo: bool,
    /// Display language index.
    pub language: u16,
    /// Backlight level, 0-5.
    pub backlight: u16,
}

impl Options {
    pub fn from_words(words: &[u16; OPTIONS_LEN]) -> Self {
        Self::decode(&Batch {
            start: *OPTIONS.start(),
            words,
        })
    }

    fn decode(batch: &Batch) -> Self {
        Self {
            confirm_output_change: batch.flag(R::OptTakeOk),
            restore_output: batch.flag(R::OptTakeOut),
            power_on_boot: batch.flag(R::OptBootPow),
            buzzer: batch.flag(R::OptBuzz),
            boot_logo: batch.flag(R::OptLogo),
            language: batch.get(R::OptLang),
            backlight: batch.get(R::OptLight),
        }
    }
}

/// Raw factory calibration words.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Calibration {
    pub v_out_zero: u16,
    pub v_out_scale: u16,
    pub v_back_zero: u16,
    pub v_back_scale: u16,
    pub i_out_zero: u16,
    pub i_out_scale: u16,
    pub i_back_zero: u16,
    pub i_back_scale: u16,
}

impl Calibration {
    pub fn from_words(words: [u16; CALIBRATION_LEN]) -> Self {
        let [
            v_out_zero,
            v_out_scale,
            v_back_zero,
            v_back_scale,
            i_out_zero,
            i_out_scale,
            i_back_zero,
            i_back_scale,
        ] = words;
        Self {
            v_out_zero,
            v_out_scale,
            v_back_zero,
            v_back_scale,
            i_out_zero,
            i_out_scale,
            i_back_zero,
            i_back_scale,
        }
    }
}

/// One decoded telemetry snapshot. Built fresh by every refresh.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceState {
    pub internal_temperature: Temperature,
    pub external_temperature: Temperature,
    /// Set-point voltage in volts.
    pub voltage_set: f64,
    /// Set-point current in amps.
    pub current_set: f64,
    pub voltage_out: f64,
    pub current_out: f64,
    /// Output power in watts.
    pub power_out: f64,
    pub voltage_in: f64,
    pub keypad_locked: bool,
    pub protection: ProtectionStatus,
    pub mode: ControlMode,
    pub output_enabled: bool,
    /// Active preset index.
    pub preset: u16,
    /// Range-select register, only reported by models that have one.
    pub current_range: Option<u16>,
    pub battery_mode: bool,
    pub battery_voltage: f64,
    pub amp_hours: f64,
    pub watt_hours: f64,
    pub clock: DeviceClock,
    pub options: Options,
}

impl DeviceState {
    /// Decode the two refresh batches with the scale factors of `profile`.
    pub fn decode(
        profile: &ModelProfile,
        live: &[u16; LIVE_LEN],
        extended: &[u16; EXTENDED_LEN],
    ) -> Self {
        let live = Batch {
            start: *LIVE.start(),
            words: live,
        };
        let ext = Batch {
            start: *EXTENDED_READ.start(),
            words: extended,
        };

        let current_range = profile
            .model
            .has_current_range()
            .then(|| live.get(R::IRange));
        let scaling = profile.scaling(current_range);

        let clock = DeviceClock {
            year: ext.get(R::Year),
            month: ext.get(R::Month),
            day: ext.get(R::Day),
            hour: ext.get(R::Hour),
            minute: ext.get(R::Minute),
            second: ext.get(R::Second),
        };

        Self {
            internal_temperature: Temperature {
                celsius: live.signed(R::IntCSign, R::IntC),
                fahrenheit: live.signed(R::IntFSign, R::IntF),
            },
            external_temperature: Temperature {
                celsius: ext.signed(R::ExtCSign, R::ExtC),
                fahrenheit: ext.signed(R::ExtFSign, R::ExtF),
            },
            voltage_set: scaling.raw_to_voltage(live.get(R::VSet)),
            current_set: scaling.raw_to_current(live.get(R::ISet)),
            voltage_out: scaling.raw_to_voltage(live.get(R::VOut)),
            current_out: scaling.raw_to_current(live.get(R::IOut)),
            power_out: scaling.raw_to_power(live.get(R::POut)),
            voltage_in: scaling.raw_to_input_voltage(live.get(R::VIn)),
            keypad_locked: live.flag(R::Keypad),
            protection: ProtectionStatus::from(live.get(R::OvpOcp)),
            mode: ControlMode::from(live.get(R::CvCc)),
            output_enabled: live.flag(R::Output),
            preset: live.get(R::Preset),
            current_range,
            battery_mode: ext.flag(R::BatMode),
            battery_voltage: scaling.raw_to_voltage(ext.get(R::VBat)),
            amp_hours: ext.accumulator(R::AhHigh, R::AhLow),
            watt_hours: ext.accumulator(R::WhHigh, R::WhLow),
            clock,
            options: Options::decode(&ext),
        }
    }
}
