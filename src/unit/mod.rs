//! Unit component framework.
//!
//! A unit is one I²C device driven through an [`Adapter`], which owns the bus
//! handle and the current device address. Units implement [`Component`] so a
//! board loop can call [`Component::update`] on each of them every tick.

use embedded_hal_1::{delay::DelayNs, i2c::I2c};

use crate::clock::Clock;
use crate::error::Error;
use crate::registers::{is_valid_i2c_address, I2C_ADDRESS_REG};

mod buffer;
pub mod kmeter_iso;
mod schedule;
pub mod stm32f030;

pub use buffer::SampleBuffer;
pub use kmeter_iso::UnitKmeterIso;
pub use schedule::Schedule;
pub use stm32f030::UnitStm32f030;

/// Largest payload accepted by [`Adapter::write_register`].
pub const MAX_WRITE_LEN: usize = 8;

/// Settings shared by every unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ComponentConfig {
    /// Bus clock in Hz the transport is expected to run at
    pub clock: u32,
    /// Number of samples kept by units that buffer their measurements
    pub stored_size: usize,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        ComponentConfig {
            clock: 100_000,
            stored_size: 1,
        }
    }
}

/// A device driven by the unit framework.
pub trait Component {
    type Error;

    const NAME: &'static str;
    const DEFAULT_ADDRESS: u8;

    /// Current I²C address of the device.
    fn address(&self) -> u8;

    /// Applies the configuration and checks the device is there.
    fn begin(&mut self) -> Result<(), Self::Error>;

    /// Drives periodic work, call it as often as possible.
    ///
    /// A tick that cannot complete is skipped, it never reports an error.
    fn update(&mut self, force: bool);
}

/// Register access for one device on the bus.
pub struct Adapter<I2C> {
    i2c: I2C,
    address: u8,
    config: ComponentConfig,
}

impl<I2C> Adapter<I2C>
where
    I2C: I2c,
{
    pub fn new(i2c: I2C, address: u8) -> Self {
        Adapter {
            i2c,
            address,
            config: ComponentConfig::default(),
        }
    }

    pub fn release(self) -> I2C {
        self.i2c
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn config(&self) -> ComponentConfig {
        self.config
    }

    pub fn set_config(&mut self, config: ComponentConfig) {
        self.config = config;
    }

    /// Points the adapter at another address. Does not talk to the device.
    pub fn change_address(&mut self, address: u8) {
        self.address = address;
    }

    /// Writes the register address then reads `buf.len()` bytes, with a repeated start.
    pub fn read_register(&mut self, reg: u8, buf: &mut [u8]) -> Result<(), Error<I2C::Error>> {
        self.i2c.write_read(self.address, &[reg], buf)?;
        Ok(())
    }

    /// Like [`read_register`](Self::read_register), but stops after the register
    /// address and waits `delay_ms` before reading.
    pub fn read_register_delayed<D: DelayNs>(
        &mut self,
        reg: u8,
        buf: &mut [u8],
        delay: &mut D,
        delay_ms: u32,
    ) -> Result<(), Error<I2C::Error>> {
        self.i2c.write(self.address, &[reg])?;
        delay.delay_ms(delay_ms);
        self.i2c.read(self.address, buf)?;
        Ok(())
    }

    pub fn read_register8(&mut self, reg: u8) -> Result<u8, Error<I2C::Error>> {
        let mut buf = [0u8; 1];
        self.read_register(reg, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_register(&mut self, reg: u8, data: &[u8]) -> Result<(), Error<I2C::Error>> {
        if data.len() > MAX_WRITE_LEN {
            return Err(Error::InvalidData);
        }
        let mut frame = [0u8; MAX_WRITE_LEN + 1];
        frame[0] = reg;
        frame[1..=data.len()].copy_from_slice(data);
        self.i2c.write(self.address, &frame[..=data.len()])?;
        Ok(())
    }

    pub fn write_register8(&mut self, reg: u8, value: u8) -> Result<(), Error<I2C::Error>> {
        self.write_register(reg, &[value])
    }
}

/// Runs `op` every millisecond until it completes or `timeout_ms` has passed.
///
/// `op` is always tried at least once, and once more right at the deadline.
pub(crate) fn block_with_timeout<T, E, C, F>(clock: &mut C, timeout_ms: u32, mut op: F) -> Result<T, Error<E>>
where
    C: Clock + DelayNs,
    F: FnMut() -> nb::Result<T, Error<E>>,
{
    let timeout_at = clock.now_ms() + u64::from(timeout_ms);
    loop {
        match op() {
            Ok(value) => return Ok(value),
            Err(nb::Error::Other(e)) => return Err(e),
            Err(nb::Error::WouldBlock) => {}
        }
        if clock.now_ms() >= timeout_at {
            break;
        }
        clock.delay_ms(1);
    }
    warn!("Failed due to timeout");
    Err(Error::Timeout)
}

/// Moves the device to `address` and waits until it answers there.
///
/// The new address is written at the current one, then the adapter is
/// retargeted and the address register polled until it echoes `address`.
/// If that does not happen within `timeout_ms` the adapter goes back to the
/// previous address.
pub(crate) fn change_i2c_address<I2C, C>(
    adapter: &mut Adapter<I2C>,
    clock: &mut C,
    address: u8,
    timeout_ms: u32,
) -> Result<(), Error<I2C::Error>>
where
    I2C: I2c,
    C: Clock + DelayNs,
{
    if !is_valid_i2c_address(address) {
        error!("Invalid address : {:02x}", address);
        return Err(Error::InvalidAddress(address));
    }
    let previous = adapter.address();
    adapter.write_register8(I2C_ADDRESS_REG, address)?;
    adapter.change_address(address);

    let confirmed = block_with_timeout(clock, timeout_ms, || match adapter.read_register8(I2C_ADDRESS_REG) {
        Ok(echo) if echo == address => Ok(()),
        // still rebooting
        _ => Err(nb::Error::WouldBlock),
    });
    match confirmed {
        Ok(()) => {
            info!("I2C address changed {:02x} -> {:02x}", previous, address);
            Ok(())
        }
        Err(e) => {
            adapter.change_address(previous);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::sim::SimClock;
    use embedded_hal_1::i2c::ErrorKind;
    use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTransaction};

    #[test]
    fn register_helpers_frame_requests() {
        let i2c = I2cMock::new(&[
            I2cTransaction::write_read(0x66, vec![0xFE], vec![0x03]),
            I2cTransaction::write_read(0x66, vec![0x00], vec![1, 2, 3, 4]),
            I2cTransaction::write(0x66, vec![0xFF, 0x42]),
            I2cTransaction::write(0x66, vec![0x30, 1, 2, 3]),
            I2cTransaction::write(0x66, vec![0xFF]),
            I2cTransaction::read(0x66, vec![0x66]),
        ]);
        let mut clock = SimClock::new();
        let mut adapter = Adapter::new(i2c, 0x66);

        assert_eq!(adapter.read_register8(0xFE), Ok(3));
        let mut buf = [0u8; 4];
        adapter.read_register(0x00, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
        adapter.write_register8(0xFF, 0x42).unwrap();
        adapter.write_register(0x30, &[1, 2, 3]).unwrap();
        assert_eq!(adapter.write_register(0x30, &[0; 9]), Err(Error::InvalidData));

        let mut buf = [0u8; 1];
        adapter.read_register_delayed(0xFF, &mut buf, &mut clock, 1).unwrap();
        assert_eq!(buf, [0x66]);
        assert_eq!(clock.now_ms(), 1);
        adapter.release().done();
    }

    #[test]
    fn bus_errors_surface_as_i2c() {
        let i2c = I2cMock::new(&[I2cTransaction::write_read(0x66, vec![0x20], vec![0x00]).with_error(ErrorKind::Other)]);
        let mut adapter = Adapter::new(i2c, 0x66);

        assert_eq!(adapter.read_register8(0x20), Err(Error::I2c(ErrorKind::Other)));
        adapter.release().done();
    }

    #[test]
    fn block_with_timeout_tries_at_deadline() {
        let mut clock = SimClock::new();
        let observer = clock.clone();
        let mut attempts = 0;

        let res: Result<(), Error<()>> = block_with_timeout(&mut clock, 5, || {
            attempts += 1;
            Err(nb::Error::WouldBlock)
        });
        assert_eq!(res, Err(Error::Timeout));
        assert_eq!(attempts, 6);
        assert_eq!(observer.now_ms(), 5);

        let res: Result<(), Error<()>> = block_with_timeout(&mut clock, 0, || {
            attempts += 1;
            Err(nb::Error::WouldBlock)
        });
        assert_eq!(res, Err(Error::Timeout));
        assert_eq!(attempts, 7);
        assert_eq!(observer.now_ms(), 5);
    }

    #[test]
    fn block_with_timeout_stops_on_result() {
        let mut clock = SimClock::new();
        let mut attempts = 0;

        let res: Result<u8, Error<()>> = block_with_timeout(&mut clock, 100, || {
            attempts += 1;
            if attempts == 3 {
                Ok(7)
            } else {
                Err(nb::Error::WouldBlock)
            }
        });
        assert_eq!(res, Ok(7));
        assert_eq!(clock.now_ms(), 2);

        let res: Result<u8, Error<()>> =
            block_with_timeout(&mut clock, 100, || Err(nb::Error::Other(Error::InvalidData)));
        assert_eq!(res, Err(Error::InvalidData));
    }
}
