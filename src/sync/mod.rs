//! Synchronization and Concurrency Support
//!
//! This module provides the synchronization primitive and the ISR-safe
//! wrappers that let an engine be shared between thread mode and its
//! interrupt handlers:
//!
//! - **Primitives** (`primitives`): [`CriticalSectionCell`], ISR-safe
//!   interior mutability
//!
//! - **Shared Wrappers** (`shared`): one per engine
//!   - [`SharedI2c`] - two-wire engine, with a bounded `wait_done`
//!   - [`SharedSpi`] - synchronous-bus engine, with a bounded `wait`
//!   - [`SharedSerial`] - serial-link engine, also an [`embedded_io::Write`]
//!
//! Each wrapper is the [`DmaClient`](crate::dma::DmaClient) of its engine's
//! channels, so the [`DmaRouter`](crate::dma::DmaRouter) can deliver channel
//! events without knowing the engine type.
//!
//! # Example
//!
//! ```ignore
//! use stm32f0_irqdma::sync::SharedSerial;
//!
//! static DMA: DmaRouter<'static, Dma1> = DmaRouter::new(Dma1::new());
//! static SERIAL: SharedSerial<'static, UsartMmio, Dma1, 64, 64> = SharedSerial::new(
//!     SerialEngine::new(UsartMmio::new(UsartInstance::Usart1), &DMA, SerialConfig::new()),
//! );
//!
//! fn main() {
//!     SERIAL.bind().unwrap();
//!     SERIAL.with(|serial| serial.init(&mut Rcc::new(), &mut Nvic::new())).unwrap();
//!     SERIAL.write(b"boot\r\n");
//! }
//!
//! #[interrupt]
//! fn USART1() {
//!     SERIAL.on_interrupt();
//! }
//! ```

mod primitives;

pub use primitives::CriticalSectionCell;

mod shared;

pub use shared::{SharedI2c, SharedSerial, SharedSpi};
