//! Platform-agnostic driver for the KMeterISO isolated K-type thermocouple unit.
//!
//! The unit reports the thermocouple (hot junction) and its internal cold
//! junction temperature, each in Celsius and Fahrenheit, over I²C.
//!
//! Three ways to drive it:
//!
//! - [`KmeterIso`]: plain embedded-hal 1.0 driver, one call per register.
//! - [`UnitKmeter`]: the same register set for embedded-hal 0.2 blocking I²C.
//! - [`unit::UnitKmeterIso`]: unit framework integration with periodic
//!   measurement into a ring buffer, single shot reads with timeout and
//!   confirmed I²C address changes.
//!
//! ## Features
//!
//! - `defmt` or `log`: diagnostics through either logger.
//! - `std`: [`clock::StdClock`] and `std::error::Error` for [`Error`].
#![cfg_attr(not(any(test, feature = "std")), no_std)]

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod clock;
mod error;
pub mod kmeter_iso;
pub mod registers;
pub mod unit;
pub mod unit_kmeter;

pub use error::Error;
pub use kmeter_iso::KmeterIso;
pub use registers::{Data, MeasurementUnit, Status, DEFAULT_ADDRESS};
pub use unit_kmeter::UnitKmeter;
