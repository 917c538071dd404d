use embedded_hal_1::{delay::DelayNs, i2c::I2c};
use heapless::String;

use crate::error::Error;
use crate::registers::*;

/// KMeterISO isolated K-type thermocouple unit.
///
/// - Output: hundredths of a degree, thermocouple and cold junction
/// - Range: -200 to 1350 C
/// - Address(7bit): 0x66 by default, 0x08 to 0x77 programmable
pub struct KmeterIso<I2C> {
    i2c: I2C,
    address: u8,
}

impl<I2C> KmeterIso<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        KmeterIso { i2c, address }
    }

    pub fn new_default(i2c: I2C) -> Self {
        Self::new(i2c, DEFAULT_ADDRESS)
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Checks the unit acknowledges its address.
    pub fn begin(&mut self, delay: &mut impl DelayNs) -> Result<(), I2C::Error> {
        // bus settle time after power up
        delay.delay_ms(10);
        self.i2c.write(self.address, &[])
    }

    pub fn celsius_temp_value(&mut self) -> Result<i32, I2C::Error> {
        self.read_value(TEMPERATURE_CELSIUS_VAL_REG)
    }

    pub fn fahrenheit_temp_value(&mut self) -> Result<i32, I2C::Error> {
        self.read_value(TEMPERATURE_FAHRENHEIT_VAL_REG)
    }

    pub fn internal_celsius_temp_value(&mut self) -> Result<i32, I2C::Error> {
        self.read_value(INTERNAL_TEMPERATURE_CELSIUS_VAL_REG)
    }

    pub fn internal_fahrenheit_temp_value(&mut self) -> Result<i32, I2C::Error> {
        self.read_value(INTERNAL_TEMPERATURE_FAHRENHEIT_VAL_REG)
    }

    /// Thermocouple temperature in degrees Celsius.
    pub fn read_celsius(&mut self) -> Result<f32, I2C::Error> {
        self.celsius_temp_value().map(conversion)
    }

    /// Zero when a conversion is ready, error bits otherwise.
    pub fn ready_status(&mut self) -> Result<u8, I2C::Error> {
        self.read_u8(ERROR_STATUS_REG)
    }

    pub fn firmware_version(&mut self) -> Result<u8, I2C::Error> {
        self.read_u8(FIRMWARE_VERSION_REG)
    }

    pub fn celsius_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(TEMPERATURE_CELSIUS_STRING_REG)
    }

    pub fn fahrenheit_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(TEMPERATURE_FAHRENHEIT_STRING_REG)
    }

    pub fn internal_celsius_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(INTERNAL_TEMPERATURE_CELSIUS_STRING_REG)
    }

    pub fn internal_fahrenheit_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        self.read_string(INTERNAL_TEMPERATURE_FAHRENHEIT_STRING_REG)
    }

    /// Writes a new address to the unit and talks to it there from now on.
    ///
    /// The unit is not polled at the new address, see
    /// [`UnitKmeterIso::change_i2c_address`](crate::unit::UnitKmeterIso::change_i2c_address)
    /// for the confirmed variant.
    pub fn set_i2c_address(&mut self, address: u8) -> Result<(), Error<I2C::Error>> {
        if !is_valid_i2c_address(address) {
            error!("Invalid address : {:02x}", address);
            return Err(Error::InvalidAddress(address));
        }
        self.i2c.write(self.address, &[I2C_ADDRESS_REG, address])?;
        self.address = address;
        Ok(())
    }

    fn read_value(&mut self, reg: u8) -> Result<i32, I2C::Error> {
        let mut buf = [0u8; TEMPERATURE_LEN];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(decode_value(buf))
    }

    fn read_u8(&mut self, reg: u8) -> Result<u8, I2C::Error> {
        let mut buf = [0u8; 1];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        Ok(buf[0])
    }

    fn read_string(&mut self, reg: u8) -> Result<String<STRING_LEN>, Error<I2C::Error>> {
        let mut buf = [0u8; STRING_LEN];
        self.i2c.write_read(self.address, &[reg], &mut buf)?;
        decode_string(&buf).ok_or(Error::InvalidData)
    }
}
