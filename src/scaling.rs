//! Scaling factors for different PSU models
//!
//! The Riden models share one register layout but report voltage, current and power with
//! different resolutions. A raw register value is the physical value multiplied by the
//! model's divisor, e.g. with a voltage divisor of 100, `1234` means 12.34 V.

/// Scaling factors for converting raw register values to physical units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalingFactors {
    /// Divisor for voltage values (set-point, output and battery voltage).
    pub voltage_divisor: u32,
    /// Divisor for current values.
    pub current_divisor: u32,
    /// Divisor for power values.
    pub power_divisor: u32,
    /// Divisor for the input voltage.
    pub input_voltage_divisor: u32,
}

impl Default for ScalingFactors {
    /// Every factor not overridden by a model is x100.
    fn default() -> Self {
        Self {
            voltage_divisor: 100,
            current_divisor: 100,
            power_divisor: 100,
            input_voltage_divisor: 100,
        }
    }
}

impl ScalingFactors {
    /// Convert raw voltage register value to volts
    #[inline]
    pub fn raw_to_voltage(&self, raw: u16) -> f64 {
        decode(raw, self.voltage_divisor)
    }

    /// Convert volts to raw voltage register value
    #[inline]
    pub fn voltage_to_raw(&self, volts: f64) -> Option<u16> {
        encode(volts, self.voltage_divisor)
    }

    /// Convert raw current register value to amps
    #[inline]
    pub fn raw_to_current(&self, raw: u16) -> f64 {
        decode(raw, self.current_divisor)
    }

    /// Convert amps to raw current register value
    #[inline]
    pub fn current_to_raw(&self, amps: f64) -> Option<u16> {
        encode(amps, self.current_divisor)
    }

    /// Convert raw power register value to watts
    #[inline]
    pub fn raw_to_power(&self, raw: u16) -> f64 {
        decode(raw, self.power_divisor)
    }

    /// Convert watts to raw power register value
    #[inline]
    pub fn power_to_raw(&self, watts: f64) -> Option<u16> {
        encode(watts, self.power_divisor)
    }

    /// Convert raw input voltage register value to volts
    #[inline]
    pub fn raw_to_input_voltage(&self, raw: u16) -> f64 {
        decode(raw, self.input_voltage_divisor)
    }
}

/// No rounding on read.
#[inline]
pub fn decode(raw: u16, divisor: u32) -> f64 {
    raw as f64 / divisor as f64
}

/// Rounds to the nearest raw step, ties to even. Returns `None` if the result does not fit in a register.
pub fn encode(value: f64, divisor: u32) -> Option<u16> {
    let raw = (value * divisor as f64).round_ties_even();
    if raw.is_finite() && (0.0..=u16::MAX as f64).contains(&raw) {
        Some(raw as u16)
    } else {
        None
    }
}
