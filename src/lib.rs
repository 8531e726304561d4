//! Platform-agnostic driver for the SOMOSE soil moisture and temperature sensor.
//!
//! The driver talks to the device through any `embedded-hal` 1.0 [`I2c`]
//! implementation (0.2 peripherals via [`compat::Legacy`]) and is driven by a
//! host scheduler through [`component::PollingComponent`].
//!
//! ```ignore
//! let mut somose = Somose::new(i2c, delay, Config::default())
//!     .with_temperature_sensor(|celsius: f32| { /* ... */ })
//!     .with_moisture_sensor(|percent: f32| { /* ... */ });
//! somose.setup();
//! loop {
//!     somose.update();
//!     // sleep somose.update_interval() ms
//! }
//! ```
//!
//! [`I2c`]: embedded_hal_1::i2c::I2c

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod compat;
pub mod component;
pub mod somose;

pub use component::{NullSensor, PollingComponent, Sensor, Status};
pub use somose::{Calibration, Config, EnergyMode, Error, MoistureData, Somose, TemperatureFormat, Version};
