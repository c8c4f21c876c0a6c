//! STM32F0 Interrupt/DMA Transaction Engines
//!
//! A `no_std`, `no_alloc` set of transaction engines for the STM32F0
//! communication peripherals, built around a shared DMA channel router.
//!
//! # Architecture
//!
//! The crate is organized into four layers:
//!
//! 1. **Register Layer** ([`register`]): One trait per peripheral block with
//!    a volatile MMIO implementation, so engines can be driven by mocks
//! 2. **DMA Layer** ([`dma`]): [`DmaRouter`] owns the DMA1 channel pool and
//!    routes completion/error events to the attached [`DmaClient`]s
//! 3. **Engine Layer** ([`i2c`], [`spi`], [`serial`]): One state machine per
//!    peripheral, moving data by interrupt or DMA per direction
//! 4. **Sync Layer** ([`sync`]): Critical-section wrappers that share an
//!    engine between thread mode and its interrupt handlers
//!
//! The [`hal`] module covers the two chip services the engines need at
//! start-up: peripheral clock gating and NVIC line enables.
//!
//! # Features
//!
//! - `stm32f070` (default): DMA1 with 5 channels
//! - `stm32f072`: DMA1 with 7 channels
//! - `defmt`: Enable defmt formatting for error and config types
//! - `log`: Emit engine diagnostics through the `log` facade
//!
//! # Example
//!
//! ```ignore
//! use stm32f0_irqdma::{DmaRouter, I2cConfig, I2cEngine, SharedI2c};
//! use stm32f0_irqdma::hal::{Nvic, Priority, Rcc};
//! use stm32f0_irqdma::i2c::{DmaSelect, I2cInstance};
//! use stm32f0_irqdma::register::{Dma1, I2cMmio};
//!
//! static DMA: DmaRouter<'static, Dma1> = DmaRouter::new(Dma1::new());
//! static I2C: SharedI2c<'static, I2cMmio, Dma1> = SharedI2c::new(I2cEngine::new(
//!     I2cMmio::new(I2cInstance::I2c1),
//!     &DMA,
//!     I2cConfig::new().with_dma_channels(I2cInstance::I2c1.default_dma_channels()),
//! ));
//!
//! DMA.initialize(&mut Rcc::new(), &mut Nvic::new(), Priority::P1);
//! I2C.bind().unwrap();
//! I2C.with(|i2c| i2c.init(&mut Rcc::new(), &mut Nvic::new())).unwrap();
//!
//! static CMD: [u8; 2] = [0x6B, 0x00];
//! I2C.write(0x68, &CMD, DmaSelect::TX).unwrap();
//! I2C.wait_done(&mut delay, 1_000).unwrap();
//! ```
//!
//! # Memory Requirements
//!
//! Engines own no buffers except the serial rings, sized by const generics.
//! Transaction buffers are borrowed for the engine's lifetime, which in
//! interrupt-driven use means `'static`.

#![no_std]
#![deny(missing_docs)]
#![allow(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
// Clippy lint levels live here; thresholds and config are in Cargo.toml.
#![deny(clippy::correctness)]
#![warn(
    clippy::suspicious,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::cloned_instead_of_copied,
    clippy::explicit_iter_loop,
    clippy::implicit_clone,
    clippy::inconsistent_struct_constructor,
    clippy::manual_assert,
    clippy::manual_let_else,
    clippy::match_same_arms,
    clippy::needless_pass_by_value,
    clippy::semicolon_if_nothing_returned,
    clippy::uninlined_format_args,
    clippy::unnested_or_patterns,
    clippy::std_instead_of_core,
    clippy::std_instead_of_alloc,
    clippy::alloc_instead_of_core
)]
#![allow(
    clippy::mod_module_files,
    clippy::self_named_module_files,
    clippy::similar_names,
    clippy::too_many_arguments,
    clippy::struct_excessive_bools,
    clippy::fn_params_excessive_bools,
    clippy::type_complexity,
    clippy::must_use_candidate,
    clippy::assertions_on_constants,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::panic_in_result_fn,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::module_name_repetitions,
    clippy::wildcard_imports,
    clippy::items_after_statements
)]
#[cfg(all(feature = "stm32f070", feature = "stm32f072"))]
compile_error!("Features 'stm32f070' and 'stm32f072' are mutually exclusive.");

#[cfg(not(any(feature = "stm32f070", feature = "stm32f072")))]
compile_error!(
    "Either feature 'stm32f070' or 'stm32f072' must be enabled. The default is 'stm32f070'."
);

// =============================================================================
// Modules
// =============================================================================

pub mod constants;
pub mod dma;
pub mod error;
pub mod hal;
pub mod i2c;
pub mod register;
pub mod serial;
pub mod spi;
pub mod sync;

// Test utilities (only available during testing)
#[cfg(test)]
pub mod testing;

// =============================================================================
// Re-exports
// =============================================================================

pub use dma::{
    DmaChannels, DmaClient, DmaEvents, DmaPriority, DmaRouter, IrqLine, ItemWidth,
    TransferDescriptor, XferEngine,
};
pub use error::{
    ConfigError, ConfigResult, DmaError, DmaResult, Error, I2cError, I2cResult, RequestError,
    RequestResult, Result, SerialError, SerialResult, SpiError, SpiResult,
};
pub use i2c::{DmaSelect, I2cConfig, I2cEngine, I2cPhase};
pub use serial::{RingBuffer, SerialConfig, SerialEngine};
pub use spi::{NoChipSelect, SpiConfig, SpiEngine, SpiPhase};
pub use sync::{CriticalSectionCell, SharedI2c, SharedSerial, SharedSpi};
