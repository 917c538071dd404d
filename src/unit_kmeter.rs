//! KMeter unit, for boards still on embedded-hal 0.2.
//!

use embedded_hal_02::blocking::delay::DelayMs;
use embedded_hal_02::blocking::i2c::{Write, WriteRead};
use heapless::String;

use crate::error::Error;
use crate::registers::*;

pub struct UnitKmeter<I> {
    device: I,
    address: u8,
}

impl<I, E> UnitKmeter<I>
where
    I: Write<Error = E> + WriteRead<Error = E>,
{
    /// Create device driver instance.
    pub fn new(i2c: I, address: u8) -> Self {
        UnitKmeter { device: i2c, address }
    }

    pub fn release(self) -> I {
        self.device
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn begin<D: DelayMs<u8>>(&mut self, delay: &mut D) -> Result<(), E> {
        delay.delay_ms(10);
        self.device.write(self.address, &[])
    }

    pub fn get_celsius_temp_value(&mut self) -> Result<i32, E> {
        self.read_i32(TEMPERATURE_CELSIUS_VAL_REG)
    }

    pub fn get_fahrenheit_temp_value(&mut self) -> Result<i32, E> {
        self.read_i32(TEMPERATURE_FAHRENHEIT_VAL_REG)
    }

    pub fn get_internal_celsius_temp_value(&mut self) -> Result<i32, E> {
        self.read_i32(INTERNAL_TEMPERATURE_CELSIUS_VAL_REG)
    }

    pub fn get_internal_fahrenheit_temp_value(&mut self) -> Result<i32, E> {
        self.read_i32(INTERNAL_TEMPERATURE_FAHRENHEIT_VAL_REG)
    }

    pub fn get_ready_status(&mut self) -> Result<u8, E> {
        self.read_u8(ERROR_STATUS_REG)
    }

    pub fn get_firmware_version(&mut self) -> Result<u8, E> {
        self.read_u8(FIRMWARE_VERSION_REG)
    }

    pub fn get_celsius_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<E>> {
        self.read_string(TEMPERATURE_CELSIUS_STRING_REG)
    }

    pub fn get_fahrenheit_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<E>> {
        self.read_string(TEMPERATURE_FAHRENHEIT_STRING_REG)
    }

    pub fn get_internal_celsius_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<E>> {
        self.read_string(INTERNAL_TEMPERATURE_CELSIUS_STRING_REG)
    }

    pub fn get_internal_fahrenheit_temp_string(&mut self) -> Result<String<STRING_LEN>, Error<E>> {
        self.read_string(INTERNAL_TEMPERATURE_FAHRENHEIT_STRING_REG)
    }

    fn read_u8(&mut self, reg: u8) -> Result<u8, E> {
        let mut buf = [0u8];
        self.device.write_read(self.address, &[reg], &mut buf[..])?;
        Ok(buf[0])
    }

    fn read_i32(&mut self, reg: u8) -> Result<i32, E> {
        let mut buf = [0u8; TEMPERATURE_LEN];
        self.device.write_read(self.address, &[reg], &mut buf[..])?;
        Ok(decode_value(buf))
    }

    fn read_string(&mut self, reg: u8) -> Result<String<STRING_LEN>, Error<E>> {
        let mut buf = [0u8; STRING_LEN];
        self.device.write_read(self.address, &[reg], &mut buf[..])?;
        decode_string(&buf).ok_or(Error::InvalidData)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal_mock::eh0::delay::NoopDelay;
    use embedded_hal_mock::eh0::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn legacy_getters() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write(0x66, vec![]),
            I2cTransaction::write_read(0x66, vec![0x00], vec![0x10, 0x27, 0x00, 0x00]),
            I2cTransaction::write_read(0x66, vec![0x04], vec![0x50, 0x46, 0x00, 0x00]),
            I2cTransaction::write_read(0x66, vec![0x10], vec![0xC4, 0x09, 0x00, 0x00]),
            I2cTransaction::write_read(0x66, vec![0x14], vec![0x3C, 0xF6, 0xFF, 0xFF]),
            I2cTransaction::write_read(0x66, vec![0x20], vec![0x00]),
            I2cTransaction::write_read(0x66, vec![0xFE], vec![0x01]),
            I2cTransaction::write_read(0x66, vec![0x40], b"212.00\0\0".to_vec()),
        ]);
        let mut unit = UnitKmeter::new(i2c, DEFAULT_ADDRESS);

        unit.begin(&mut NoopDelay::new()).unwrap();
        assert_eq!(unit.get_celsius_temp_value().unwrap(), 10000);
        assert_eq!(unit.get_fahrenheit_temp_value().unwrap(), 18000);
        assert_eq!(unit.get_internal_celsius_temp_value().unwrap(), 2500);
        assert_eq!(unit.get_internal_fahrenheit_temp_value().unwrap(), -2500);
        assert_eq!(unit.get_ready_status().unwrap(), 0);
        assert_eq!(unit.get_firmware_version().unwrap(), 1);
        assert_eq!(unit.get_fahrenheit_temp_string().unwrap().as_str(), "212.00");
        unit.release().done();
    }
}
