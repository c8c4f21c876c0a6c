//! Interrupt Controller Collaborator
//!
//! Engines enable their interrupt lines through [`InterruptController`]; the
//! controller is trusted to route the line to the handler that calls the
//! engine's `on_interrupt`.

use crate::register::{NVIC_IPR_BASE, NVIC_ISER, modify_reg, write_reg};

/// Interrupt lines used by the transaction engines, numbered as in the
/// STM32F0 vector table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Interrupt {
    /// DMA1 channel 1
    Dma1Ch1 = 9,
    /// DMA1 channels 2 and 3
    Dma1Ch2To3 = 10,
    /// DMA1 channels 4 and 5
    #[cfg(not(feature = "stm32f072"))]
    Dma1Ch4To5 = 11,
    /// DMA1 channels 4 to 7
    #[cfg(feature = "stm32f072")]
    Dma1Ch4To7 = 11,
    /// I2C1 event and error
    I2c1 = 23,
    /// I2C2 event and error
    I2c2 = 24,
    /// SPI1
    Spi1 = 25,
    /// SPI2
    Spi2 = 26,
    /// USART1
    Usart1 = 27,
    /// USART2
    Usart2 = 28,
}

impl Interrupt {
    /// Position in the vector table
    #[inline(always)]
    #[must_use]
    pub const fn number(self) -> u8 {
        self as u8
    }
}

/// Interrupt priority
///
/// Cortex-M0 implements two priority bits; `P0` is the most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    /// Highest priority
    P0,
    /// High priority
    P1,
    /// Low priority
    #[default]
    P2,
    /// Lowest priority
    P3,
}

impl Priority {
    /// Priority byte as written to the IPR field (bits 7:6)
    #[inline(always)]
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        (self as u8) << 6
    }
}

/// Something that can enable an interrupt line at a priority
pub trait InterruptController {
    /// Set the line's priority and unmask it
    fn enable(&mut self, irq: Interrupt, priority: Priority);
}

impl<T: InterruptController + ?Sized> InterruptController for &mut T {
    fn enable(&mut self, irq: Interrupt, priority: Priority) {
        (**self).enable(irq, priority);
    }
}

/// Cortex-M0 nested vectored interrupt controller
#[derive(Debug, Default)]
pub struct Nvic {
    _private: (),
}

impl Nvic {
    /// Create a handle to the NVIC
    pub const fn new() -> Self {
        Self { _private: () }
    }

    /// IPR word address and bit shift for an interrupt's priority field
    #[must_use]
    pub const fn priority_field(irq: Interrupt) -> (usize, u32) {
        let n = irq.number() as usize;
        (NVIC_IPR_BASE + (n / 4) * 4, ((n % 4) * 8) as u32)
    }
}

impl InterruptController for Nvic {
    fn enable(&mut self, irq: Interrupt, priority: Priority) {
        let (addr, shift) = Self::priority_field(irq);
        // SAFETY: NVIC registers are always mapped; IPR needs word access on M0
        unsafe {
            modify_reg(addr, |v| {
                (v & !(0xFF << shift)) | (u32::from(priority.to_raw()) << shift)
            });
            write_reg(NVIC_ISER, 1 << irq.number());
        }
    }
}
