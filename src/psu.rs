use chrono::NaiveDateTime;
use log::{debug, info};

use crate::{
    error::{Error, Result},
    model::ModelProfile,
    preset::{Preset, PresetGroup, PresetOffset},
    register::{BOOTLOADER_MAGIC, CALIBRATION, CLOCK, LIVE, OPTIONS, RidenRegister},
    scaling::ScalingFactors,
    session::{DeviceInfo, DeviceSession},
    telemetry::{
        CALIBRATION_LEN, Calibration, DeviceClock, DeviceState, EXTENDED_LEN, EXTENDED_READ,
        LIVE_LEN, OPTIONS_LEN, Options,
    },
    transport::ModbusMaster,
    types::BacklightLevel,
};

/// A connected Riden PSU.
///
/// You can create a RidenPsu over any [`ModbusMaster`], usually an
/// [`RtuMaster`](crate::transport::RtuMaster) on a serial port.
///
/// For it's methods, we generally use the nomenclature that "set" means to write a configuration,
/// while [`Self::refresh`] reads back everything the device reports in one snapshot.
pub struct RidenPsu<M: ModbusMaster> {
    session: DeviceSession<M>,
    info: DeviceInfo,
    profile: ModelProfile,
}

impl<M: ModbusMaster> RidenPsu<M> {
    /// Identify the PSU behind `master`, using the default retry policy.
    pub fn connect(master: M) -> Result<Self, M::Error> {
        Self::with_session(DeviceSession::new(master))
    }

    /// Identify the PSU behind an existing session.
    ///
    /// Fails with [`Error::UnknownModel`] rather than guessing a profile.
    pub fn with_session(mut session: DeviceSession<M>) -> Result<Self, M::Error> {
        let info = session.read_identity()?;
        let profile = ModelProfile::detect(info.id)?;
        info!(
            "Connected to {} (serial {}, firmware {})",
            profile.model,
            info.serial(),
            info.firmware
        );
        Ok(Self {
            session,
            info,
            profile,
        })
    }

    pub fn info(&self) -> &DeviceInfo {
        &self.info
    }

    pub fn profile(&self) -> &ModelProfile {
        &self.profile
    }

    pub fn session_mut(&mut self) -> &mut DeviceSession<M> {
        &mut self.session
    }

    pub fn into_session(self) -> DeviceSession<M> {
        self.session
    }

    /// Read and decode everything the device reports, in exactly two bulk reads.
    pub fn refresh(&mut self) -> Result<DeviceState, M::Error> {
        let live = self.session.read_band::<LIVE_LEN>(*LIVE.start())?;
        let extended = self
            .session
            .read_band::<EXTENDED_LEN>(*EXTENDED_READ.start())?;
        let state = DeviceState::decode(&self.profile, &live, &extended);
        debug!("{state:?}");
        Ok(state)
    }

    /// Set the output target voltage, in volts.
    pub fn set_voltage(&mut self, volts: f64) -> Result<(), M::Error> {
        let raw = self
            .profile
            .scaling(None)
            .voltage_to_raw(volts)
            .ok_or(Error::InvalidRange)?;
        self.session.write_register(RidenRegister::VSet, raw)
    }

    /// Set the output current limit, in amps.
    pub fn set_current(&mut self, amps: f64) -> Result<(), M::Error> {
        let raw = self
            .current_scaling()?
            .current_to_raw(amps)
            .ok_or(Error::InvalidRange)?;
        self.session.write_register(RidenRegister::ISet, raw)
    }

    /// Enable/disable the output.
    pub fn set_output(&mut self, enabled: bool) -> Result<(), M::Error> {
        self.session
            .write_register(RidenRegister::Output, enabled as u16)
    }

    /// Activate preset by index (0 - 9).
    pub fn set_preset(&mut self, index: u16) -> Result<(), M::Error> {
        let group = PresetGroup::try_from(index).map_err(|_| Error::InvalidRange)?;
        self.session
            .write_register(RidenRegister::Preset, group.into())
    }

    /// Read the contents of a preset memory slot.
    pub fn read_preset(&mut self, group: PresetGroup) -> Result<Preset, M::Error> {
        let scaling = self.current_scaling()?;
        let words = self
            .session
            .read_band(PresetOffset::VSet.address_in_group(group))?;
        Ok(Preset::decode(&words, &scaling))
    }

    /// Overwrite a preset memory slot in one request.
    pub fn write_preset(&mut self, group: PresetGroup, preset: &Preset) -> Result<(), M::Error> {
        let scaling = self.current_scaling()?;
        let words = preset.encode(&scaling).ok_or(Error::InvalidRange)?;
        self.session
            .write_registers(PresetOffset::VSet.address_in_group(group), &words)
    }

    /// Read the device clock.
    pub fn clock(&mut self) -> Result<NaiveDateTime, M::Error> {
        let words = self.session.read_band(*CLOCK.start())?;
        DeviceClock::from_words(words)
            .to_datetime()
            .ok_or(Error::InvalidTimestamp)
    }

    /// Set the device clock in one request.
    pub fn set_clock(&mut self, datetime: &NaiveDateTime) -> Result<(), M::Error> {
        let clock = DeviceClock::from_datetime(datetime).ok_or(Error::InvalidTimestamp)?;
        self.session
            .write_registers(*CLOCK.start(), &clock.to_words())
    }

    /// Read all persisted options in one request.
    pub fn options(&mut self) -> Result<Options, M::Error> {
        let words = self.session.read_band::<OPTIONS_LEN>(*OPTIONS.start())?;
        Ok(Options::from_words(&words))
    }

    /// Ask for confirmation on the device before the output is switched.
    pub fn set_confirm_output_change(&mut self, enabled: bool) -> Result<(), M::Error> {
        self.session
            .write_register(RidenRegister::OptTakeOk, enabled as u16)
    }

    /// Restore the output state after power-up.
    pub fn set_restore_output(&mut self, enabled: bool) -> Result<(), M::Error> {
        self.session
            .write_register(RidenRegister::OptTakeOut, enabled as u16)
    }

    /// Enable the output as soon as the device boots.
    pub fn set_power_on_boot(&mut self, enabled: bool) -> Result<(), M::Error> {
        self.session
            .write_register(RidenRegister::OptBootPow, enabled as u16)
    }

    /// Enable/disable the buzzer.
    pub fn set_buzzer(&mut self, enabled: bool) -> Result<(), M::Error> {
        self.session
            .write_register(RidenRegister::OptBuzz, enabled as u16)
    }

    /// Show the boot logo on power-up.
    pub fn set_boot_logo(&mut self, enabled: bool) -> Result<(), M::Error> {
        self.session
            .write_register(RidenRegister::OptLogo, enabled as u16)
    }

    /// Select the display language by index.
    pub fn set_language(&mut self, language: u16) -> Result<(), M::Error> {
        self.session.write_register(RidenRegister::OptLang, language)
    }

    /// Set the backlight brightness level (0 - 5).
    pub fn set_backlight(&mut self, level: u16) -> Result<(), M::Error> {
        let level = BacklightLevel::try_from(level).map_err(|_| Error::InvalidRange)?;
        self.session
            .write_register(RidenRegister::OptLight, level.into())
    }

    /// Read the factory calibration. Writes go through
    /// [`DeviceSession::write_calibration_register`].
    pub fn calibration(&mut self) -> Result<Calibration, M::Error> {
        let words = self
            .session
            .read_band::<CALIBRATION_LEN>(*CALIBRATION.start())?;
        Ok(Calibration::from_words(words))
    }

    /// Reboot the device into its bootloader. The device does not reply, so a missing
    /// acknowledgement is not an error.
    pub fn reboot_to_bootloader(&mut self) -> Result<(), M::Error> {
        info!("Rebooting {} into the bootloader", self.profile.model);
        self.session
            .write_register_unacknowledged(RidenRegister::System, BOOTLOADER_MAGIC)
    }

    /// Scaling for current values. The RD6012P current range can change at any time, so it is
    /// read fresh; other models need no round trip.
    fn current_scaling(&mut self) -> Result<ScalingFactors, M::Error> {
        let range = if self.profile.model.has_current_range() {
            Some(self.session.read_register(RidenRegister::IRange)?)
        } else {
            None
        };
        Ok(self.profile.scaling(range))
    }
}
