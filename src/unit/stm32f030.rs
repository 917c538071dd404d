//! KMeterISO seen through its STM32F030 firmware: periodic measurement keeps
//! only the latest Celsius and Fahrenheit readings.

use embedded_hal_1::{delay::DelayNs, i2c::I2c};
use heapless::String;

use super::{change_i2c_address, Adapter, Component, ComponentConfig, Schedule};
use crate::clock::Clock;
use crate::error::Error;
use crate::registers::*;

/// How long a new address has to be confirmed by the device.
pub const ADDRESS_CHANGE_TIMEOUT_MS: u32 = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Start periodic measurement on begin
    pub periodic: bool,
    /// Periodic interval in ms
    pub interval: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            periodic: true,
            interval: 1000,
        }
    }
}

pub struct UnitStm32f030<I2C, C> {
    adapter: Adapter<I2C>,
    clock: C,
    config: Config,
    schedule: Schedule,
    temperature_c: f32,
    temperature_f: f32,
}

impl<I2C, C> UnitStm32f030<I2C, C>
where
    I2C: I2c,
    C: Clock + DelayNs,
{
    pub fn new(i2c: I2C, clock: C) -> Self {
        Self::with_address(i2c, clock, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, clock: C, address: u8) -> Self {
        UnitStm32f030 {
            adapter: Adapter::new(i2c, address),
            clock,
            config: Config::default(),
            schedule: Schedule::new(),
            temperature_c: 0.0,
            temperature_f: 0.0,
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

    /// Latest periodic reading in degrees Celsius.
    pub fn celsius_temperature(&self) -> f32 {
        self.temperature_c
    }

    /// Latest periodic reading in degrees Fahrenheit.
    pub fn fahrenheit_temperature(&self) -> f32 {
        self.temperature_f
    }

    /// (Re)starts periodic measurement, sampling on the next update.
    pub fn start_periodic_measurement(&mut self, interval: u32) -> Result<(), Error<I2C::Error>> {
        self.schedule.restart(interval);
        Ok(())
    }

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

    pub fn updated(&self) -> bool {
        self.schedule.updated()
    }

    pub fn updated_millis(&self) -> Option<u64> {
        self.schedule.updated_millis()
    }

    pub fn read_status(&mut self) -> Result<Status, Error<I2C::Error>> {
        self.adapter.read_register8(ERROR_STATUS_REG).map(Status)
    }

    pub fn read_firmware_version(&mut self) -> Result<u8, Error<I2C::Error>> {
        self.adapter.read_register8(FIRMWARE_VERSION_REG)
    }

    /// Hundredths of a degree.
    pub fn read_celsius_temperature(&mut self) -> Result<i32, Error<I2C::Error>> {
        self.read_value(TEMPERATURE_CELSIUS_VAL_REG)
    }

    pub fn read_fahrenheit_temperature(&mut self) -> Result<i32, Error<I2C::Error>> {
        self.read_value(TEMPERATURE_FAHRENHEIT_VAL_REG)
    }

    pub fn read_internal_celsius_temperature(&mut self) -> Result<i32, Error<I2C::Error>> {
        self.read_value(INTERNAL_TEMPERATURE_CELSIUS_VAL_REG)
    }

    pub fn read_internal_fahrenheit_temperature(&mut self) -> Result<i32, Error<I2C::Error>> {
        self.read_value(INTERNAL_TEMPERATURE_FAHRENHEIT_VAL_REG)
    }

    pub fn read_celsius_temperature_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(TEMPERATURE_CELSIUS_STRING_REG)
    }

    pub fn read_fahrenheit_temperature_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(TEMPERATURE_FAHRENHEIT_STRING_REG)
    }

    pub fn read_internal_celsius_temperature_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(INTERNAL_TEMPERATURE_CELSIUS_STRING_REG)
    }

    pub fn read_internal_fahrenheit_temperature_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(INTERNAL_TEMPERATURE_FAHRENHEIT_STRING_REG)
    }

    /// Moves the device to `address`, waiting up to 100 ms for it to answer there.
    pub fn change_i2c_address(&mut self, address: u8) -> Result<(), Error<I2C::Error>> {
        change_i2c_address(&mut self.adapter, &mut self.clock, address, ADDRESS_CHANGE_TIMEOUT_MS)
    }

    pub fn read_i2c_address(&mut self) -> Result<u8, Error<I2C::Error>> {
        self.adapter.read_register8(I2C_ADDRESS_REG)
    }

    fn read_value(&mut self, reg: u8) -> Result<i32, Error<I2C::Error>> {
        let mut buf = [0u8; TEMPERATURE_LEN];
        self.adapter.read_register(reg, &mut buf)?;
        Ok(decode_value(buf))
    }

    fn read_string(&mut self, reg: u8) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        let mut buf = [0u8; STRING_LEN];
        self.adapter.read_register(reg, &mut buf)?;
        decode_string(&buf).ok_or(Error::InvalidData)
    }

    fn read_measurement(&mut self) -> nb::Result<(), Error<I2C::Error>> {
        let status = self.read_status()?;
        if !status.is_ready() {
            warn!("Not ready or error: {:02x}", status.0);
            return Err(nb::Error::WouldBlock);
        }
        let c = self.read_celsius_temperature()?;
        let f = self.read_fahrenheit_temperature()?;
        self.temperature_c = conversion(c);
        self.temperature_f = conversion(f);
        Ok(())
    }
}

impl<I2C, C> Component for UnitStm32f030<I2C, C>
where
    I2C: I2c,
    C: Clock + DelayNs,
{
    type Error = Error<I2C::Error>;

    const NAME: &'static str = "UnitSTM32F030";
    const DEFAULT_ADDRESS: u8 = DEFAULT_ADDRESS;

    fn address(&self) -> u8 {
        self.adapter.address()
    }

    fn begin(&mut self) -> Result<(), Self::Error> {
        let version = self.read_firmware_version().map_err(|e| {
            error!("Failed to read version");
            e
        })?;
        if version == 0 {
            error!("Unexpected firmware version 0");
            return Err(Error::UnsupportedChip);
        }
        if self.config.periodic {
            self.start_periodic_measurement(self.config.interval)
        } else {
            Ok(())
        }
    }

    fn update(&mut self, force: bool) {
        let now = self.clock.now_ms();
        if self.schedule.tick(now, force) && self.read_measurement().is_ok() {
            self.schedule.record(now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::sim::SimClock;
    use embedded_hal_1::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    const ADDR: u8 = DEFAULT_ADDRESS;

    fn read(addr: u8, reg: u8, response: Vec<u8>) -> I2cTransaction {
        I2cTransaction::write_read(addr, vec![reg], response)
    }

    fn unit_with(expectations: &[I2cTransaction]) -> (UnitStm32f030<I2cMock, SimClock>, SimClock) {
        let clock = SimClock::new();
        (UnitStm32f030::new(I2cMock::new(expectations), clock.clone()), clock)
    }

    #[test]
    fn begin_starts_with_default_interval() {
        let (mut unit, _) = unit_with(&[read(ADDR, FIRMWARE_VERSION_REG, vec![1])]);

        unit.begin().unwrap();
        assert!(unit.in_periodic());
        assert_eq!(unit.interval(), 1000);
        unit.release().0.done();
    }

    #[test]
    fn update_caches_both_units() {
        let (mut unit, clock) = unit_with(&[
            read(ADDR, ERROR_STATUS_REG, vec![0]),
            read(ADDR, TEMPERATURE_CELSIUS_VAL_REG, 2500i32.to_le_bytes().to_vec()),
            read(ADDR, TEMPERATURE_FAHRENHEIT_VAL_REG, 7700i32.to_le_bytes().to_vec()),
            read(ADDR, ERROR_STATUS_REG, vec![0x02]),
            read(ADDR, ERROR_STATUS_REG, vec![0]),
            read(ADDR, TEMPERATURE_CELSIUS_VAL_REG, 2600i32.to_le_bytes().to_vec()),
            read(ADDR, TEMPERATURE_FAHRENHEIT_VAL_REG, 7880i32.to_le_bytes().to_vec()),
        ]);
        unit.start_periodic_measurement(50).unwrap();

        unit.update(false);
        assert!(unit.updated());
        assert_eq!(unit.celsius_temperature(), 25.0);
        assert_eq!(unit.fahrenheit_temperature(), 77.0);

        clock.advance_ms(49);
        unit.update(false);
        assert!(!unit.updated());

        // fault flagged, keep the previous values
        clock.advance_ms(1);
        unit.update(false);
        assert!(!unit.updated());
        assert_eq!(unit.celsius_temperature(), 25.0);

        unit.update(false);
        assert!(unit.updated());
        assert_eq!(unit.updated_millis(), Some(50));
        assert_eq!(unit.celsius_temperature(), 26.0);
        assert_eq!(unit.fahrenheit_temperature(), 78.8);

        unit.stop_periodic_measurement().unwrap();
        assert!(!unit.in_periodic());
        unit.release().0.done();
    }

    #[test]
    fn register_reads() {
        let (mut unit, _) = unit_with(&[
            read(ADDR, INTERNAL_TEMPERATURE_CELSIUS_VAL_REG, (-1050i32).to_le_bytes().to_vec()),
            read(ADDR, INTERNAL_TEMPERATURE_FAHRENHEIT_VAL_REG, 1310i32.to_le_bytes().to_vec()),
            read(ADDR, INTERNAL_TEMPERATURE_CELSIUS_STRING_REG, b"-10.50\0\0".to_vec()),
            read(ADDR, I2C_ADDRESS_REG, vec![ADDR]),
        ]);

        assert_eq!(unit.read_internal_celsius_temperature(), Ok(-1050));
        assert_eq!(unit.read_internal_fahrenheit_temperature(), Ok(1310));
        assert_eq!(unit.read_internal_celsius_temperature_string().unwrap().as_str(), "-10.50");
        assert_eq!(unit.read_i2c_address(), Ok(ADDR));
        unit.release().0.done();
    }

    #[test]
    fn address_change_uses_short_timeout() {
        let mut expectations = vec![I2cTransaction::write(ADDR, vec![I2C_ADDRESS_REG, 0x30])];
        expectations.extend(
            (0..=ADDRESS_CHANGE_TIMEOUT_MS)
                .map(|_| read(0x30, I2C_ADDRESS_REG, vec![0]).with_error(ErrorKind::NoAcknowledge(
                    embedded_hal_1::i2c::NoAcknowledgeSource::Address,
                ))),
        );
        let (mut unit, clock) = unit_with(&expectations);

        assert_eq!(unit.change_i2c_address(0x30), Err(Error::Timeout));
        assert_eq!(clock.now_ms(), 100);
        assert_eq!(unit.address(), ADDR);
        unit.release().0.done();
    }
}
