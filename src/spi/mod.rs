//! Synchronous-bus (SPI) master
//!
//! [`SpiEngine`] runs full-duplex transfers and chip-select-held
//! write-then-read transactions, interrupt-driven or over DMA.

mod config;
mod engine;

pub use config::{BaudDivider, BitOrder, DataSize, NssMode, SpiConfig, SpiMode};
pub use engine::{NoChipSelect, SpiEngine, SpiPhase};
pub use crate::register::spi::SpiInstance;
