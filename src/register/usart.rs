//! USART Register Definitions

use super::{USART1_BASE, USART2_BASE, read_reg8, write_reg8};
use crate::dma::DmaChannels;
use crate::hal::{Interrupt, Peripheral};

// =============================================================================
// Register Offsets
// =============================================================================

/// Control register 1
pub const CR1_OFFSET: usize = 0x00;
/// Control register 2
pub const CR2_OFFSET: usize = 0x04;
/// Control register 3
pub const CR3_OFFSET: usize = 0x08;
/// Baud rate register
pub const BRR_OFFSET: usize = 0x0C;
/// Interrupt and status register
pub const ISR_OFFSET: usize = 0x1C;
/// Interrupt flag clear register
pub const ICR_OFFSET: usize = 0x20;
/// Receive data register
pub const RDR_OFFSET: usize = 0x24;
/// Transmit data register
pub const TDR_OFFSET: usize = 0x28;

// =============================================================================
// CR1 Bits
// =============================================================================

/// USART enable
pub const CR1_UE: u32 = 1 << 0;
/// Receiver enable
pub const CR1_RE: u32 = 1 << 2;
/// Transmitter enable
pub const CR1_TE: u32 = 1 << 3;
/// IDLE interrupt enable
pub const CR1_IDLEIE: u32 = 1 << 4;
/// RXNE interrupt enable
pub const CR1_RXNEIE: u32 = 1 << 5;
/// Transmission complete interrupt enable
pub const CR1_TCIE: u32 = 1 << 6;
/// TXE interrupt enable
pub const CR1_TXEIE: u32 = 1 << 7;
/// Parity selection: 1 = odd
pub const CR1_PS: u32 = 1 << 9;
/// Parity control enable
pub const CR1_PCE: u32 = 1 << 10;
/// Word length: 1 = 9 bits
pub const CR1_M: u32 = 1 << 12;
/// Oversampling by 8
pub const CR1_OVER8: u32 = 1 << 15;

// =============================================================================
// CR2 / CR3 Bits
// =============================================================================

/// Stop bits field shift (0 = 1 bit, 2 = 2 bits)
pub const CR2_STOP_SHIFT: u32 = 12;
/// Stop bits field mask
pub const CR2_STOP_MASK: u32 = 0x3 << 12;
/// Error interrupt enable
pub const CR3_EIE: u32 = 1 << 0;
/// DMA enable receiver
pub const CR3_DMAR: u32 = 1 << 6;
/// DMA enable transmitter
pub const CR3_DMAT: u32 = 1 << 7;

// =============================================================================
// ISR / ICR Bits
// =============================================================================

/// Parity error
pub const ISR_PE: u32 = 1 << 0;
/// Framing error
pub const ISR_FE: u32 = 1 << 1;
/// Noise detected
pub const ISR_NE: u32 = 1 << 2;
/// Overrun error
pub const ISR_ORE: u32 = 1 << 3;
/// Idle line detected
pub const ISR_IDLE: u32 = 1 << 4;
/// Read data register not empty
pub const ISR_RXNE: u32 = 1 << 5;
/// Transmission complete
pub const ISR_TC: u32 = 1 << 6;
/// Transmit data register empty
pub const ISR_TXE: u32 = 1 << 7;
/// Line error conditions
pub const ISR_ERROR_MASK: u32 = ISR_PE | ISR_FE | ISR_NE | ISR_ORE;

/// ICR clear bits share positions with their ISR flags
pub const ICR_IDLECF: u32 = ISR_IDLE;
/// Transmission complete clear
pub const ICR_TCCF: u32 = ISR_TC;

// =============================================================================
// Instances
// =============================================================================

/// USART peripheral instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsartInstance {
    /// USART1
    Usart1,
    /// USART2
    Usart2,
}

impl UsartInstance {
    /// Register block base address
    #[must_use]
    pub const fn base(self) -> usize {
        match self {
            UsartInstance::Usart1 => USART1_BASE,
            UsartInstance::Usart2 => USART2_BASE,
        }
    }

    /// Clock domain
    #[must_use]
    pub const fn peripheral(self) -> Peripheral {
        match self {
            UsartInstance::Usart1 => Peripheral::Usart1,
            UsartInstance::Usart2 => Peripheral::Usart2,
        }
    }

    /// Interrupt line
    #[must_use]
    pub const fn interrupt(self) -> Interrupt {
        match self {
            UsartInstance::Usart1 => Interrupt::Usart1,
            UsartInstance::Usart2 => Interrupt::Usart2,
        }
    }

    /// DMA request mapping on DMA1
    #[must_use]
    pub const fn default_dma_channels(self) -> DmaChannels {
        match self {
            UsartInstance::Usart1 => DmaChannels::new(2, 3),
            UsartInstance::Usart2 => DmaChannels::new(4, 5),
        }
    }
}

// =============================================================================
// Register View
// =============================================================================

/// Register view of a USART block
pub trait UsartRegisters {
    /// Which instance this view addresses
    fn instance(&self) -> UsartInstance;
    /// Read control register 1
    fn cr1(&self) -> u32;
    /// Write control register 1
    fn write_cr1(&self, value: u32);
    /// Read control register 2
    fn cr2(&self) -> u32;
    /// Write control register 2
    fn write_cr2(&self, value: u32);
    /// Read control register 3
    fn cr3(&self) -> u32;
    /// Write control register 3
    fn write_cr3(&self, value: u32);
    /// Write the baud rate register
    fn write_brr(&self, value: u32);
    /// Read the interrupt and status register
    fn isr(&self) -> u32;
    /// Clear exactly the flags set in `mask`
    fn write_icr(&self, mask: u32);
    /// Pop a received byte (clears RXNE)
    fn read_rdr(&self) -> u8;
    /// Push a byte to transmit (clears TXE)
    fn write_tdr(&self, byte: u8);
    /// Bus address of RDR for DMA
    fn rdr_addr(&self) -> usize;
    /// Bus address of TDR for DMA
    fn tdr_addr(&self) -> usize;

    /// Read-modify-write control register 1
    #[inline]
    fn modify_cr1<F: FnOnce(u32) -> u32>(&self, f: F) {
        self.write_cr1(f(self.cr1()));
    }
}

impl<T: UsartRegisters + ?Sized> UsartRegisters for &T {
    fn instance(&self) -> UsartInstance {
        (**self).instance()
    }
    fn cr1(&self) -> u32 {
        (**self).cr1()
    }
    fn write_cr1(&self, value: u32) {
        (**self).write_cr1(value);
    }
    fn cr2(&self) -> u32 {
        (**self).cr2()
    }
    fn write_cr2(&self, value: u32) {
        (**self).write_cr2(value);
    }
    fn cr3(&self) -> u32 {
        (**self).cr3()
    }
    fn write_cr3(&self, value: u32) {
        (**self).write_cr3(value);
    }
    fn write_brr(&self, value: u32) {
        (**self).write_brr(value);
    }
    fn isr(&self) -> u32 {
        (**self).isr()
    }
    fn write_icr(&self, mask: u32) {
        (**self).write_icr(mask);
    }
    fn read_rdr(&self) -> u8 {
        (**self).read_rdr()
    }
    fn write_tdr(&self, byte: u8) {
        (**self).write_tdr(byte);
    }
    fn rdr_addr(&self) -> usize {
        (**self).rdr_addr()
    }
    fn tdr_addr(&self) -> usize {
        (**self).tdr_addr()
    }
}

/// Memory-mapped USART block
#[derive(Debug, Clone, Copy)]
pub struct UsartMmio {
    instance: UsartInstance,
    base: usize,
}

impl UsartMmio {
    /// View of the given instance's registers
    pub const fn new(instance: UsartInstance) -> Self {
        Self {
            instance,
            base: instance.base(),
        }
    }
}

impl UsartRegisters for UsartMmio {
    fn instance(&self) -> UsartInstance {
        self.instance
    }

    super::mmio_rw!(cr1, write_cr1, CR1_OFFSET, "control register 1");
    super::mmio_rw!(cr2, write_cr2, CR2_OFFSET, "control register 2");
    super::mmio_rw!(cr3, write_cr3, CR3_OFFSET, "control register 3");
    super::mmio_wo!(write_brr, BRR_OFFSET, "baud rate register");
    super::mmio_ro!(isr, ISR_OFFSET, "interrupt and status register");
    super::mmio_wo!(write_icr, ICR_OFFSET, "interrupt flag clear register");

    fn read_rdr(&self) -> u8 {
        // SAFETY: RDR lies inside this instance's register window
        unsafe { read_reg8(self.base + RDR_OFFSET) }
    }

    fn write_tdr(&self, byte: u8) {
        // SAFETY: TDR lies inside this instance's register window
        unsafe { write_reg8(self.base + TDR_OFFSET, byte) }
    }

    fn rdr_addr(&self) -> usize {
        self.base + RDR_OFFSET
    }

    fn tdr_addr(&self) -> usize {
        self.base + TDR_OFFSET
    }
}
