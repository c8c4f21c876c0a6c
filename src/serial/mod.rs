//! Serial link (USART)
//!
//! [`SerialEngine`] moves bytes through a transmit and a receive
//! [`RingBuffer`], per direction either interrupt-driven or over DMA.

mod config;
mod engine;
mod ring;

pub use config::{Oversampling, Parity, SerialConfig, StopBits, WordLength};
pub use engine::SerialEngine;
pub use ring::RingBuffer;
pub use crate::register::usart::UsartInstance;
