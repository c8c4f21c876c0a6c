//! Peripheral Clock Gating
//!
//! Engines only ever ask for a peripheral's clock domain to be switched on
//! before first use. [`ClockGate`] is that request; [`Rcc`] answers it by
//! setting the matching enable bit in the STM32F0 reset and clock control
//! block.

use crate::register::{RCC_BASE, set_bits};

// =============================================================================
// RCC Register Definitions
// =============================================================================

/// AHB peripheral clock enable register offset
pub const AHBENR_OFFSET: usize = 0x14;
/// APB2 peripheral clock enable register offset
pub const APB2ENR_OFFSET: usize = 0x18;
/// APB1 peripheral clock enable register offset
pub const APB1ENR_OFFSET: usize = 0x1C;

/// AHBENR: DMA1 clock enable
pub const AHBENR_DMA1EN: u32 = 1 << 0;
/// APB2ENR: SPI1 clock enable
pub const APB2ENR_SPI1EN: u32 = 1 << 12;
/// APB2ENR: USART1 clock enable
pub const APB2ENR_USART1EN: u32 = 1 << 14;
/// APB1ENR: SPI2 clock enable
pub const APB1ENR_SPI2EN: u32 = 1 << 14;
/// APB1ENR: USART2 clock enable
pub const APB1ENR_USART2EN: u32 = 1 << 17;
/// APB1ENR: I2C1 clock enable
pub const APB1ENR_I2C1EN: u32 = 1 << 21;
/// APB1ENR: I2C2 clock enable
pub const APB1ENR_I2C2EN: u32 = 1 << 22;

/// Peripherals whose clock domain an engine may need
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    /// DMA1 controller
    Dma1,
    /// I2C1
    I2c1,
    /// I2C2
    I2c2,
    /// SPI1
    Spi1,
    /// SPI2
    Spi2,
    /// USART1
    Usart1,
    /// USART2
    Usart2,
}

impl Peripheral {
    /// Enable register offset and bit for this peripheral
    #[must_use]
    pub const fn enable_bit(self) -> (usize, u32) {
        match self {
            Peripheral::Dma1 => (AHBENR_OFFSET, AHBENR_DMA1EN),
            Peripheral::I2c1 => (APB1ENR_OFFSET, APB1ENR_I2C1EN),
            Peripheral::I2c2 => (APB1ENR_OFFSET, APB1ENR_I2C2EN),
            Peripheral::Spi1 => (APB2ENR_OFFSET, APB2ENR_SPI1EN),
            Peripheral::Spi2 => (APB1ENR_OFFSET, APB1ENR_SPI2EN),
            Peripheral::Usart1 => (APB2ENR_OFFSET, APB2ENR_USART1EN),
            Peripheral::Usart2 => (APB1ENR_OFFSET, APB1ENR_USART2EN),
        }
    }
}

/// Something that can switch on a peripheral's clock domain
pub trait ClockGate {
    /// Make sure `peripheral` is clocked. Idempotent.
    fn enable(&mut self, peripheral: Peripheral);
}

impl<T: ClockGate + ?Sized> ClockGate for &mut T {
    fn enable(&mut self, peripheral: Peripheral) {
        (**self).enable(peripheral);
    }
}

/// Reset and clock control block
#[derive(Debug, Default)]
pub struct Rcc {
    _private: (),
}

impl Rcc {
    /// Create a handle to the RCC block
    pub const fn new() -> Self {
        Self { _private: () }
    }
}

impl ClockGate for Rcc {
    fn enable(&mut self, peripheral: Peripheral) {
        let (offset, bit) = peripheral.enable_bit();
        // SAFETY: RCC enable registers are always mapped
        unsafe { set_bits(RCC_BASE + offset, bit) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dma_clock_lives_on_ahb() {
        assert_eq!(Peripheral::Dma1.enable_bit(), (0x14, 1));
    }

    #[test]
    fn apb_buses_split_by_instance() {
        assert_eq!(Peripheral::Spi1.enable_bit(), (APB2ENR_OFFSET, 1 << 12));
        assert_eq!(Peripheral::Spi2.enable_bit(), (APB1ENR_OFFSET, 1 << 14));
        assert_eq!(Peripheral::Usart1.enable_bit().0, APB2ENR_OFFSET);
        assert_eq!(Peripheral::I2c2.enable_bit(), (APB1ENR_OFFSET, 1 << 22));
    }
}
