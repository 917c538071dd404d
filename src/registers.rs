//! KMeterISO register map and payload decoding.
//!
//! All temperature registers hold a little-endian `i32` in hundredths of a degree.
//! String registers hold up to 8 ASCII characters, NUL padded.

use heapless::String;

/// Factory I²C address.
pub const DEFAULT_ADDRESS: u8 = 0x66;

pub const TEMPERATURE_CELSIUS_VAL_REG: u8 = 0x00;
pub const TEMPERATURE_FAHRENHEIT_VAL_REG: u8 = 0x04;
pub const INTERNAL_TEMPERATURE_CELSIUS_VAL_REG: u8 = 0x10;
pub const INTERNAL_TEMPERATURE_FAHRENHEIT_VAL_REG: u8 = 0x14;
pub const ERROR_STATUS_REG: u8 = 0x20;
pub const TEMPERATURE_CELSIUS_STRING_REG: u8 = 0x30;
pub const TEMPERATURE_FAHRENHEIT_STRING_REG: u8 = 0x40;
pub const INTERNAL_TEMPERATURE_CELSIUS_STRING_REG: u8 = 0x50;
pub const INTERNAL_TEMPERATURE_FAHRENHEIT_STRING_REG: u8 = 0x60;
pub const FIRMWARE_VERSION_REG: u8 = 0xFE;
pub const I2C_ADDRESS_REG: u8 = 0xFF;

pub const TEMPERATURE_LEN: usize = 4;
pub const STRING_LEN: usize = 8;

/// Lowest and highest address the device accepts, reserved ranges excluded.
pub const I2C_ADDRESS_MIN: u8 = 0x08;
pub const I2C_ADDRESS_MAX: u8 = 0x77;

/// Temperature unit selecting which value register is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MeasurementUnit {
    Celsius,
    Fahrenheit,
}

impl Default for MeasurementUnit {
    fn default() -> Self {
        MeasurementUnit::Celsius
    }
}

impl MeasurementUnit {
    /// Thermocouple (hot junction) value register.
    pub const fn register(self) -> u8 {
        match self {
            MeasurementUnit::Celsius => TEMPERATURE_CELSIUS_VAL_REG,
            MeasurementUnit::Fahrenheit => TEMPERATURE_FAHRENHEIT_VAL_REG,
        }
    }

    /// Cold junction value register.
    pub const fn internal_register(self) -> u8 {
        match self {
            MeasurementUnit::Celsius => INTERNAL_TEMPERATURE_CELSIUS_VAL_REG,
            MeasurementUnit::Fahrenheit => INTERNAL_TEMPERATURE_FAHRENHEIT_VAL_REG,
        }
    }

    pub const fn string_register(self) -> u8 {
        match self {
            MeasurementUnit::Celsius => TEMPERATURE_CELSIUS_STRING_REG,
            MeasurementUnit::Fahrenheit => TEMPERATURE_FAHRENHEIT_STRING_REG,
        }
    }

    pub const fn internal_string_register(self) -> u8 {
        match self {
            MeasurementUnit::Celsius => INTERNAL_TEMPERATURE_CELSIUS_STRING_REG,
            MeasurementUnit::Fahrenheit => INTERNAL_TEMPERATURE_FAHRENHEIT_STRING_REG,
        }
    }
}

/// One raw temperature sample as read from a value register.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Data {
    pub raw: [u8; TEMPERATURE_LEN],
}

impl Data {
    pub const fn new(raw: [u8; TEMPERATURE_LEN]) -> Self {
        Data { raw }
    }

    /// Temperature in hundredths of a degree.
    #[inline]
    pub const fn value(&self) -> i32 {
        decode_value(self.raw)
    }

    /// Temperature in degrees of the unit the sample was read in.
    #[inline]
    pub fn temperature(&self) -> f32 {
        conversion(self.value())
    }
}

/// Error status register.
///
/// Zero means a fresh conversion is available; any other value means the
/// device is busy or has flagged a fault (e.g. open thermocouple).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Status(pub u8);

impl Status {
    #[inline]
    pub const fn is_ready(&self) -> bool {
        self.0 == 0
    }
}

#[inline]
pub const fn decode_value(raw: [u8; TEMPERATURE_LEN]) -> i32 {
    i32::from_le_bytes(raw)
}

/// Hundredths of a degree to degrees.
#[inline]
pub fn conversion(value: i32) -> f32 {
    value as f32 / 100.0
}

/// Decodes a string register payload, stopping at the first NUL.
///
/// Returns `None` when the payload is not valid UTF-8.
pub fn decode_string(raw: &[u8; STRING_LEN]) -> Option<String<STRING_LEN>> {
    let len = raw.iter().position(|&b| b == 0).unwrap_or(STRING_LEN);
    let text = core::str::from_utf8(&raw[..len]).ok()?;
    let mut s = String::new();
    s.push_str(text).ok()?;
    Some(s)
}

/// Whether `address` can be assigned to the device.
#[inline]
pub const fn is_valid_i2c_address(address: u8) -> bool {
    address >= I2C_ADDRESS_MIN && address <= I2C_ADDRESS_MAX
}
