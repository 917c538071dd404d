use core::fmt;

/// KMeterISO errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// I²C bus error (NACK or transport failure)
    I2c(E),
    /// The device did not become ready, or did not confirm a new address, in time
    Timeout,
    /// Address outside of `0x08..=0x77`
    InvalidAddress(u8),
    /// Register payload could not be decoded
    InvalidData,
    /// Firmware version register reads zero
    UnsupportedChip,
    /// Periodic measurement is already running
    InPeriodic,
    /// Configuration is not applicable to this driver instance
    InvalidConfig,
}

impl<E> From<E> for Error<E> {
    fn from(err: E) -> Self {
        Error::I2c(err)
    }
}

impl<E: fmt::Debug> fmt::Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C bus error: {:?}", e),
            Error::Timeout => f.write_str("timed out waiting for the device"),
            Error::InvalidAddress(addr) => write!(f, "invalid I2C address {:#04x}", addr),
            Error::InvalidData => f.write_str("invalid register payload"),
            Error::UnsupportedChip => f.write_str("unsupported firmware"),
            Error::InPeriodic => f.write_str("periodic measurement is running"),
            Error::InvalidConfig => f.write_str("invalid configuration"),
        }
    }
}

#[cfg(feature = "std")]
impl<E: fmt::Debug> std::error::Error for Error<E> {}
