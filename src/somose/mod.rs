//! SOMOSE soil moisture and temperature sensor.
//!
//! - Moisture: averaged 8 bit value, or 16 bit raw count (8000 = 100 %)
//! - Temperature: 1 °C resolution
//! - Address(7bit): 0x55 by default, reprogrammable
//!
//! Bus failures never escape the driver: accessors log them, flag
//! [`Status::Warning`] and hand back a zero/default value. The next
//! update cycle simply tries again.

use embedded_hal_1::{delay::DelayNs, i2c::I2c};

use crate::component::{NullSensor, PollingComponent, Sensor, Status};

pub mod command;

use command::*;
pub use command::{TemperatureFormat, Version};

pub const DEFAULT_ADDRESS: u8 = 0x55;

/// Processing time the device needs between a command and its response.
const SETTLE_MS: u32 = 1;
/// Power mode transitions are slower than a register access.
const POWER_MODE_SETTLE_MS: u32 = 25;
const MEASUREMENT_POLL_MS: u32 = 10;
const MEASUREMENT_POLL_LIMIT: u8 = 20;

/// Driver errors
#[derive(Debug)]
pub enum Error<E> {
    /// I²C bus error
    I2c(E),
    /// Version response is not of the form `v<digit>.<digit>`
    InvalidVersion,
}

/// Which response family moisture is read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MoistureData {
    /// `0x76`, dump byte plus an averaged 8 bit value published as is.
    #[default]
    Average,
    /// `0x72`, big-endian 16 bit raw count scaled to percent.
    Raw,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EnergyMode {
    /// The device measures on its own, values are read directly.
    #[default]
    Continuous,
    /// Low power mode, every update triggers a measurement and waits for it.
    EnergySaving,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    pub moisture_data: MoistureData,
    pub temperature: TemperatureFormat,
    pub energy_mode: EnergyMode,
    /// Repetitions per triggered measurement in energy saving mode.
    pub repetitions: u8,
    pub update_interval_ms: u32,
    /// Experimental: reset registers 0x1B, 0x1C and 0x1E during setup
    /// unless the status byte reports them as configured.
    pub reset_registers: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            moisture_data: MoistureData::Average,
            temperature: TemperatureFormat::Signed,
            energy_mode: EnergyMode::Continuous,
            repetitions: 1,
            update_interval_ms: 20_000,
            reset_registers: false,
        }
    }
}

/// Dry and wet references, raw sensor units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    pub min: u16,
    pub max: u16,
}

impl Calibration {
    /// Maps a raw count onto `min..max` as 0..100 %. Not clamped.
    pub fn relative(&self, raw: u16) -> Option<f32> {
        if self.max <= self.min {
            return None;
        }
        Some((raw as f32 - self.min as f32) * 100.0 / (self.max - self.min) as f32)
    }
}

/// SOMOSE driver
///
/// `T` and `M` are the temperature and moisture sinks, either may be left
/// unwired.
pub struct Somose<I2C, D, T = NullSensor, M = NullSensor> {
    i2c: I2C,
    delay: D,
    address: u8,
    config: Config,
    moisture_min: Option<u16>,
    moisture_max: Option<u16>,
    status: Status,
    temperature_sensor: Option<T>,
    moisture_sensor: Option<M>,
}

impl<I2C, D> Somose<I2C, D>
where
    I2C: I2c,
    D: DelayNs,
{
    /// Create a driver on the default address `0x55`.
    pub fn new(i2c: I2C, delay: D, config: Config) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS, config)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8, config: Config) -> Self {
        Somose {
            i2c,
            delay,
            address,
            config,
            moisture_min: None,
            moisture_max: None,
            status: Status::Ok,
            temperature_sensor: None,
            moisture_sensor: None,
        }
    }
}

impl<I2C, D, T, M> Somose<I2C, D, T, M>
where
    I2C: I2c,
    D: DelayNs,
    T: Sensor,
    M: Sensor,
{
    pub fn with_temperature_sensor<S: Sensor>(self, sensor: S) -> Somose<I2C, D, S, M> {
        Somose {
            i2c: self.i2c,
            delay: self.delay,
            address: self.address,
            config: self.config,
            moisture_min: self.moisture_min,
            moisture_max: self.moisture_max,
            status: self.status,
            temperature_sensor: Some(sensor),
            moisture_sensor: self.moisture_sensor,
        }
    }

    pub fn with_moisture_sensor<S: Sensor>(self, sensor: S) -> Somose<I2C, D, T, S> {
        Somose {
            i2c: self.i2c,
            delay: self.delay,
            address: self.address,
            config: self.config,
            moisture_min: self.moisture_min,
            moisture_max: self.moisture_max,
            status: self.status,
            temperature_sensor: self.temperature_sensor,
            moisture_sensor: Some(sensor),
        }
    }

    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Retarget the driver, e.g. after [`Self::set_i2c_address`] took effect.
    pub fn set_address(&mut self, address: u8) {
        self.address = address;
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn mark_failed(&mut self) {
        self.status = Status::Failed;
    }

    pub fn moisture_min(&self) -> Option<u16> {
        self.moisture_min
    }

    pub fn moisture_max(&self) -> Option<u16> {
        self.moisture_max
    }

    /// Available once both references have been read or written.
    pub fn calibration(&self) -> Option<Calibration> {
        Some(Calibration {
            min: self.moisture_min?,
            max: self.moisture_max?,
        })
    }

    fn status_set_warning(&mut self) {
        if self.status == Status::Ok {
            self.status = Status::Warning;
        }
    }

    fn status_clear_warning(&mut self) {
        if self.status == Status::Warning {
            self.status = Status::Ok;
        }
    }

    /// Write `request` to `address` and give the device `settle_ms` to process it.
    fn send(&mut self, address: u8, request: &[u8], settle_ms: u32) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(address, request).map_err(Error::I2c)?;
        self.delay.delay_ms(settle_ms);
        Ok(())
    }

    /// Single byte command followed by an `N` byte response.
    fn query<const N: usize>(&mut self, command: u8) -> Result<[u8; N], Error<I2C::Error>> {
        self.send(self.address, &[command], SETTLE_MS)?;
        let mut buf = [0u8; N];
        self.i2c.read(self.address, &mut buf).map_err(Error::I2c)?;
        Ok(buf)
    }

    fn attempt<V>(&mut self, what: &str, result: Result<V, Error<I2C::Error>>) -> Option<V> {
        match result {
            Ok(value) => Some(value),
            Err(_) => {
                error!("Communication failed for {}!", what);
                self.status_set_warning();
                None
            }
        }
    }

    fn absorb<V: Default>(&mut self, what: &str, result: Result<V, Error<I2C::Error>>) -> V {
        self.attempt(what, result).unwrap_or_default()
    }

    /// Temperature in °C, decoded per [`Config::temperature`].
    pub fn temperature(&mut self) -> f32 {
        let result = self.query::<1>(CMD_TEMPERATURE);
        let byte = self.absorb("temperature", result.map(|buf| buf[0]));
        self.config.temperature.decode(byte)
    }

    /// Averaged 8 bit moisture value.
    pub fn averaged_moisture(&mut self) -> u8 {
        let result = self.query::<2>(CMD_MOISTURE_AVERAGED).map(averaged_moisture);
        let value = self.absorb("averaged moisture", result);
        debug!("Read averaged moisture value {}.", value);
        value
    }

    /// 16 bit raw moisture count.
    pub fn raw_moisture(&mut self) -> u16 {
        let result = self.query::<2>(CMD_MOISTURE_RAW).map(be_u16);
        let value = self.absorb("raw moisture", result);
        debug!("Read moisture raw value {}.", value);
        value
    }

    /// Moisture in % via the configured [`MoistureData`] family.
    pub fn moisture(&mut self) -> f32 {
        match self.config.moisture_data {
            MoistureData::Average => self.averaged_moisture() as f32,
            MoistureData::Raw => moisture_percent(self.raw_moisture()),
        }
    }

    /// Raw moisture relative to the dry and wet references.
    pub fn calibrated_moisture(&mut self) -> Option<f32> {
        let calibration = self.calibration()?;
        let result = self.query::<2>(CMD_MOISTURE_RAW).map(be_u16);
        let raw = self.attempt("raw moisture", result)?;
        calibration.relative(raw)
    }

    /// Program a new bus address into the device at `old_address`.
    ///
    /// Fire-and-forget: nothing is read back, and the driver keeps talking
    /// to its current address until [`Self::set_address`] is called.
    pub fn set_i2c_address(&mut self, old_address: u8, new_address: u8) {
        let request = [CMD_SET_I2C_ADDRESS, address_payload(new_address)];
        let result = self.send(old_address, &request, SETTLE_MS);
        if self.attempt("i2c address", result).is_some() {
            info!("Changed address {:#x} to {:#x}.", old_address, new_address);
        }
    }

    fn set_reference(&mut self, command: u8, value: u16, what: &str) -> bool {
        let [low, high] = le_payload(value);
        let result = self.send(self.address, &[command, low, high], SETTLE_MS);
        self.attempt(what, result).is_some()
    }

    pub fn set_reference_dry(&mut self, value: u16) -> bool {
        let ok = self.set_reference(CMD_SET_REFERENCE_DRY, value, "reference dry");
        if ok {
            self.moisture_min = Some(value);
        }
        ok
    }

    pub fn set_reference_wet(&mut self, value: u16) -> bool {
        let ok = self.set_reference(CMD_SET_REFERENCE_WET, value, "reference wet");
        if ok {
            self.moisture_max = Some(value);
        }
        ok
    }

    fn read_reference(&mut self, command: u8, what: &str) -> Option<u16> {
        let result = self.query::<2>(command);
        let buf = self.attempt(what, result)?;
        let value = be_u16(buf);
        debug!("Read {} value {} ({}, {}).", what, value, buf[0], buf[1]);
        Some(value)
    }

    pub fn reference_dry(&mut self) -> u16 {
        self.read_reference(CMD_GET_REFERENCE_DRY, "reference dry")
            .unwrap_or_default()
    }

    pub fn reference_wet(&mut self) -> u16 {
        self.read_reference(CMD_GET_REFERENCE_WET, "reference wet")
            .unwrap_or_default()
    }

    fn read_version(&mut self, command: u8) -> Result<Version, Error<I2C::Error>> {
        let buf = self.query::<4>(command)?;
        Version::parse(buf).ok_or(Error::InvalidVersion)
    }

    fn version_or(&mut self, command: u8, fallback: Version, what: &str) -> Version {
        match self.read_version(command) {
            Ok(version) => {
                debug!("{} version {}.{}", what, version.major, version.minor);
                version
            }
            Err(Error::InvalidVersion) => {
                warn!("Malformed {} version, assuming {}.{}", what, fallback.major, fallback.minor);
                fallback
            }
            Err(Error::I2c(_)) => {
                error!("Reading {} version failed, assuming {}.{}", what, fallback.major, fallback.minor);
                self.status_set_warning();
                fallback
            }
        }
    }

    /// Falls back to 2.2 when the device does not answer properly.
    pub fn hardware_version(&mut self) -> Version {
        self.version_or(CMD_HARDWARE_VERSION, Version::HARDWARE_FALLBACK, "hardware")
    }

    /// Falls back to 1.2 when the device does not answer properly.
    pub fn firmware_version(&mut self) -> Version {
        self.version_or(CMD_FIRMWARE_VERSION, Version::FIRMWARE_FALLBACK, "firmware")
    }

    fn read_status(&mut self) -> Result<u8, Error<I2C::Error>> {
        self.query::<1>(CMD_STATUS).map(|buf| buf[0])
    }

    pub fn low_power_mode(&mut self) -> bool {
        let result = self.read_status().map(|status| status & STATUS_LOW_POWER != 0);
        self.absorb("low power mode", result)
    }

    pub fn set_low_power_mode(&mut self, on: bool) -> bool {
        let result = self.send(self.address, &[CMD_LOW_POWER, on as u8], POWER_MODE_SETTLE_MS);
        self.attempt("set low power mode", result).is_some()
    }

    /// Trigger a measurement averaged over `repetitions` samples.
    pub fn start_measurement(&mut self, repetitions: u8) -> bool {
        let result = self.send(self.address, &[CMD_START_MEASUREMENT, repetitions], SETTLE_MS);
        self.attempt("start measurement", result).is_some()
    }

    pub fn is_measurement_finished(&mut self) -> bool {
        let result = self.read_status().map(|status| status & STATUS_MEASURING == 0);
        self.absorb("measurement status", result)
    }

    fn trigger_measurement(&mut self) {
        if !self.start_measurement(self.config.repetitions) {
            return;
        }
        for _ in 0..MEASUREMENT_POLL_LIMIT {
            let result = self.read_status();
            match self.attempt("measurement status", result) {
                Some(status) if status & STATUS_MEASURING == 0 => return,
                Some(_) => self.delay.delay_ms(MEASUREMENT_POLL_MS),
                None => return,
            }
        }
        warn!("Measurement did not finish in time, reading anyway.");
        self.status_set_warning();
    }

    /// Returns false when setup has to stop.
    fn reset_registers_if_required(&mut self) -> bool {
        let mut status = [0u8; 1];
        let result = self.i2c.read(self.address, &mut status).map_err(Error::I2c);
        if self.attempt("status", result).is_none() {
            return false;
        }
        if status[0] & STATUS_RESET_MASK == STATUS_RESET_MASK {
            return true;
        }
        debug!("Resetting SOMOSE registers");
        for register in RESET_REGISTERS {
            let result = self.send(self.address, &[register], SETTLE_MS);
            if self.attempt("register reset", result).is_none() {
                return false;
            }
        }
        true
    }
}

impl<I2C, D, T, M> PollingComponent for Somose<I2C, D, T, M>
where
    I2C: I2c,
    D: DelayNs,
    T: Sensor,
    M: Sensor,
{
    fn setup(&mut self) {
        info!("Setting up SOMOSE...");

        let Some(min) = self.read_reference(CMD_GET_REFERENCE_DRY, "moisture min") else {
            return;
        };
        self.moisture_min = Some(min);

        let Some(max) = self.read_reference(CMD_GET_REFERENCE_WET, "moisture max") else {
            return;
        };
        self.moisture_max = Some(max);

        if min >= max {
            warn!("Moisture min {} is not below max {}.", min, max);
        }

        if self.config.reset_registers && !self.reset_registers_if_required() {
            return;
        }

        if self.config.energy_mode == EnergyMode::EnergySaving {
            self.set_low_power_mode(true);
        }
    }

    fn update(&mut self) {
        if self.status == Status::Failed {
            return;
        }
        debug!("SOMOSE::update");

        if self.config.energy_mode == EnergyMode::EnergySaving {
            self.trigger_measurement();
        }

        let temperature = self.temperature();
        let moisture = self.moisture();

        if let Some(sensor) = self.temperature_sensor.as_mut() {
            sensor.publish_state(temperature);
        }
        if let Some(sensor) = self.moisture_sensor.as_mut() {
            sensor.publish_state(moisture);
        }

        // best effort: a completed cycle always clears the warning
        self.status_clear_warning();
    }

    fn dump_config(&self) {
        info!("SOMOSE:");
        info!("  Address: {:#x}", self.address);
        if self.status == Status::Failed {
            error!("Communication with SOMOSE failed!");
        }
        info!("  Moisture data: {:?}", self.config.moisture_data);
        info!("  Temperature format: {:?}", self.config.temperature);
        info!("  Energy mode: {:?}", self.config.energy_mode);
        match self.calibration() {
            Some(c) => info!("  Calibration: min {} max {}", c.min, c.max),
            None => info!("  Calibration: not read"),
        }
        info!("  Temperature sensor: {}", self.temperature_sensor.is_some());
        info!("  Moisture sensor: {}", self.moisture_sensor.is_some());
    }

    fn update_interval(&self) -> u32 {
        self.config.update_interval_ms
    }
}

impl<I2C, D, T, M> core::fmt::Display for Somose<I2C, D, T, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        writeln!(f, "SOMOSE:")?;
        writeln!(f, "  Address: {:#04x}", self.address)?;
        writeln!(f, "  Moisture data: {:?}", self.config.moisture_data)?;
        writeln!(f, "  Temperature format: {:?}", self.config.temperature)?;
        writeln!(f, "  Energy mode: {:?}", self.config.energy_mode)?;
        match (self.moisture_min, self.moisture_max) {
            (Some(min), Some(max)) => writeln!(f, "  Calibration: min {} max {}", min, max)?,
            _ => writeln!(f, "  Calibration: not read")?,
        }
        write!(f, "  Status: {:?}", self.status)
    }
}
