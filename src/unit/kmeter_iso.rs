//! KMeterISO as a framework unit, with periodic measurement into a ring buffer.
//!
//! ```ignore
//! use kmeter_iso::registers::MeasurementUnit;
//! use kmeter_iso::unit::{Component, ComponentConfig, UnitKmeterIso};
//!
//! let mut unit: UnitKmeterIso<_, _, 8> = UnitKmeterIso::new(i2c, clock);
//! unit.set_component_config(ComponentConfig { stored_size: 8, ..Default::default() });
//! unit.begin()?;
//!
//! loop {
//!     unit.update(false);
//!     if unit.updated() {
//!         let t = unit.latest().map(|d| d.temperature());
//!     }
//! }
//! ```

use embedded_hal_1::{delay::DelayNs, i2c::I2c};
use heapless::String;

use super::{block_with_timeout, change_i2c_address, Adapter, Component, ComponentConfig, SampleBuffer, Schedule};
use crate::clock::Clock;
use crate::error::Error;
use crate::registers::*;

/// How long a new address has to be confirmed by the device.
pub const ADDRESS_CHANGE_TIMEOUT_MS: u32 = 1000;

/// Settings applied by [`Component::begin`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Start periodic measurement on begin
    pub start_periodic: bool,
    /// Periodic interval in ms
    pub interval: u32,
    /// Unit sampled by periodic measurement
    pub measurement_unit: MeasurementUnit,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            start_periodic: true,
            interval: 100,
            measurement_unit: MeasurementUnit::Celsius,
        }
    }
}

/// KMeterISO unit.
///
/// `N` bounds the ring buffer, the capacity actually used is
/// [`ComponentConfig::stored_size`].
pub struct UnitKmeterIso<I2C, C, const N: usize = 8> {
    adapter: Adapter<I2C>,
    clock: C,
    config: Config,
    schedule: Schedule,
    munit: MeasurementUnit,
    data: SampleBuffer<Data, N>,
}

impl<I2C, C, const N: usize> UnitKmeterIso<I2C, C, N>
where
    I2C: I2c,
    C: Clock + DelayNs,
{
    pub fn new(i2c: I2C, clock: C) -> Self {
        Self::with_address(i2c, clock, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, clock: C, address: u8) -> Self {
        UnitKmeterIso {
            adapter: Adapter::new(i2c, address),
            clock,
            config: Config::default(),
            schedule: Schedule::new(),
            munit: MeasurementUnit::Celsius,
            data: SampleBuffer::default(),
        }
    }

    pub fn release(self) -> (I2C, C) {
        (self.adapter.release(), self.clock)
    }

    pub fn config(&self) -> Config {
        self.config
    }

    pub fn set_config(&mut self, config: Config) {
        self.config = config;
    }

    pub fn component_config(&self) -> ComponentConfig {
        self.adapter.config()
    }

    pub fn set_component_config(&mut self, config: ComponentConfig) {
        self.adapter.set_config(config);
    }

    /// Unit sampled by periodic measurement.
    pub fn measurement_unit(&self) -> MeasurementUnit {
        self.munit
    }

    pub fn set_measurement_unit(&mut self, munit: MeasurementUnit) {
        self.munit = munit;
    }

    // Periodic measurement

    /// Starts with the current interval and measurement unit.
    pub fn start_periodic_measurement(&mut self) -> Result<(), Error<I2C::Error>> {
        let interval = self.schedule.interval();
        self.start_periodic(interval)
    }

    pub fn start_periodic_measurement_with(
        &mut self,
        interval: u32,
        munit: MeasurementUnit,
    ) -> Result<(), Error<I2C::Error>> {
        self.start_periodic(interval)?;
        self.munit = munit;
        Ok(())
    }

    /// Always succeeds, also when not running.
    pub fn stop_periodic_measurement(&mut self) -> Result<(), Error<I2C::Error>> {
        self.schedule.stop();
        Ok(())
    }

    pub fn in_periodic(&self) -> bool {
        self.schedule.in_periodic()
    }

    pub fn interval(&self) -> u32 {
        self.schedule.interval()
    }

    /// Whether the last [`update`](Component::update) stored a sample.
    pub fn updated(&self) -> bool {
        self.schedule.updated()
    }

    pub fn updated_millis(&self) -> Option<u64> {
        self.schedule.updated_millis()
    }

    // Stored samples

    pub fn available(&self) -> usize {
        self.data.len()
    }

    pub fn empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn full(&self) -> bool {
        self.data.is_full()
    }

    pub fn oldest(&self) -> Option<Data> {
        self.data.oldest().copied()
    }

    pub fn latest(&self) -> Option<Data> {
        self.data.latest().copied()
    }

    /// Drops the oldest sample.
    pub fn discard(&mut self) {
        self.data.pop();
    }

    /// Drops every sample.
    pub fn flush(&mut self) {
        self.data.clear();
    }

    /// Oldest stored temperature, NaN if nothing is stored.
    pub fn temperature(&self) -> f32 {
        self.data.oldest().map_or(f32::NAN, Data::temperature)
    }

    // Registers

    pub fn read_status(&mut self) -> Result<Status, Error<I2C::Error>> {
        self.adapter.read_register8(ERROR_STATUS_REG).map(Status)
    }

    pub fn is_ready(&mut self) -> bool {
        is_ready(&mut self.adapter)
    }

    pub fn read_firmware_version(&mut self) -> Result<u8, Error<I2C::Error>> {
        self.adapter.read_register8(FIRMWARE_VERSION_REG)
    }

    pub fn read_temperature_string(&mut self, munit: MeasurementUnit) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        read_string(&mut self.adapter, munit.string_register())
    }

    pub fn read_internal_temperature_string(
        &mut self,
        munit: MeasurementUnit,
    ) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        read_string(&mut self.adapter, munit.internal_string_register())
    }

    // Single shot measurement

    /// Reads the thermocouple if a conversion is ready.
    pub fn try_measure(&mut self, munit: MeasurementUnit) -> nb::Result<Data, Error<I2C::Error>> {
        try_read(&mut self.adapter, munit.register())
    }

    /// Reads the cold junction if a conversion is ready.
    pub fn try_measure_internal(&mut self, munit: MeasurementUnit) -> nb::Result<Data, Error<I2C::Error>> {
        try_read(&mut self.adapter, munit.internal_register())
    }

    /// Waits up to `timeout_ms` for a conversion, then reads the thermocouple.
    pub fn measure_singleshot(&mut self, munit: MeasurementUnit, timeout_ms: u32) -> Result<Data, Error<I2C::Error>> {
        let adapter = &mut self.adapter;
        block_with_timeout(&mut self.clock, timeout_ms, || try_read(adapter, munit.register()))
    }

    /// Waits up to `timeout_ms` for a conversion, then reads the cold junction.
    pub fn measure_internal_singleshot(
        &mut self,
        munit: MeasurementUnit,
        timeout_ms: u32,
    ) -> Result<Data, Error<I2C::Error>> {
        let adapter = &mut self.adapter;
        block_with_timeout(&mut self.clock, timeout_ms, || try_read(adapter, munit.internal_register()))
    }

    // I2C address

    /// Moves the device to `address`.
    ///
    /// # Warning
    ///
    /// The new address is persisted by the device. Succeeds only once the
    /// device answers at `address`, otherwise the driver keeps the old one.
    pub fn change_i2c_address(&mut self, address: u8) -> Result<(), Error<I2C::Error>> {
        change_i2c_address(&mut self.adapter, &mut self.clock, address, ADDRESS_CHANGE_TIMEOUT_MS)
    }

    pub fn read_i2c_address(&mut self) -> Result<u8, Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.adapter
            .read_register_delayed(I2C_ADDRESS_REG, &mut buf, &mut self.clock, 1)?;
        Ok(buf[0])
    }

    fn start_periodic(&mut self, interval: u32) -> Result<(), Error<I2C::Error>> {
        if !self.schedule.start(interval) {
            debug!("Periodic measurements are running");
            return Err(Error::InPeriodic);
        }
        Ok(())
    }
}

impl<I2C, C, const N: usize> Component for UnitKmeterIso<I2C, C, N>
where
    I2C: I2c,
    C: Clock + DelayNs,
{
    type Error = Error<I2C::Error>;

    const NAME: &'static str = "UnitKmeterISO";
    const DEFAULT_ADDRESS: u8 = DEFAULT_ADDRESS;

    fn address(&self) -> u8 {
        self.adapter.address()
    }

    fn begin(&mut self) -> Result<(), Self::Error> {
        let stored_size = self.adapter.config().stored_size;
        if stored_size != self.data.capacity() {
            self.data = SampleBuffer::with_capacity(stored_size).ok_or_else(|| {
                error!("stored_size {} out of 1..={}", stored_size, N);
                Error::InvalidConfig
            })?;
        }

        let version = self.read_firmware_version().map_err(|e| {
            error!("Failed to read version");
            e
        })?;
        if version == 0 {
            error!("Unexpected firmware version 0");
            return Err(Error::UnsupportedChip);
        }

        if self.config.start_periodic {
            self.start_periodic_measurement_with(self.config.interval, self.config.measurement_unit)
        } else {
            Ok(())
        }
    }

    fn update(&mut self, force: bool) {
        let now = self.clock.now_ms();
        if !self.schedule.tick(now, force) {
            return;
        }
        match try_read(&mut self.adapter, self.munit.register()) {
            Ok(data) => {
                self.data.push(data);
                self.schedule.record(now);
            }
            Err(nb::Error::WouldBlock) => {}
            Err(nb::Error::Other(_)) => trace!("Periodic read failed"),
        }
    }
}

fn is_ready<I2C: I2c>(adapter: &mut Adapter<I2C>) -> bool {
    adapter
        .read_register8(ERROR_STATUS_REG)
        .map_or(false, |s| Status(s).is_ready())
}

fn try_read<I2C: I2c>(adapter: &mut Adapter<I2C>, reg: u8) -> nb::Result<Data, Error<I2C::Error>> {
    if !is_ready(adapter) {
        return Err(nb::Error::WouldBlock);
    }
    let mut data = Data::default();
    adapter.read_register(reg, &mut data.raw).map_err(nb::Error::Other)?;
    Ok(data)
}

fn read_string<I2C: I2c>(adapter: &mut Adapter<I2C>, reg: u8) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
    let mut buf = [0u8; STRING_LEN];
    adapter.read_register(reg, &mut buf)?;
    decode_string(&buf).ok_or(Error::InvalidData)
}
