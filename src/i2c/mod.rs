//! Two-wire (I2C) master
//!
//! [`I2cEngine`] runs write, read and write-then-read transactions on the
//! I2C v2 block, interrupt-driven or through DMA per direction.

mod config;
mod engine;

pub use config::{BusSpeed, I2cConfig};
pub use engine::{DmaSelect, I2cEngine, I2cPhase};
pub use crate::register::i2c::I2cInstance;
