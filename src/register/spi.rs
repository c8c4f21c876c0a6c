//! SPI Register Definitions
//!
//! The data register is accessed with the width of one item: an 8-bit access
//! pops or pushes one byte of the FIFO, a 16-bit access two.

use super::{SPI1_BASE, SPI2_BASE, read_reg16, read_reg8, write_reg16, write_reg8};
use crate::dma::DmaChannels;
use crate::hal::{Interrupt, Peripheral};

// =============================================================================
// Register Offsets
// =============================================================================

/// Control register 1
pub const CR1_OFFSET: usize = 0x00;
/// Control register 2
pub const CR2_OFFSET: usize = 0x04;
/// Status register
pub const SR_OFFSET: usize = 0x08;
/// Data register
pub const DR_OFFSET: usize = 0x0C;

// =============================================================================
// CR1 Bits
// =============================================================================

/// Clock phase
pub const CR1_CPHA: u32 = 1 << 0;
/// Clock polarity
pub const CR1_CPOL: u32 = 1 << 1;
/// Master selection
pub const CR1_MSTR: u32 = 1 << 2;
/// Baud rate divisor field shift
pub const CR1_BR_SHIFT: u32 = 3;
/// Baud rate divisor field mask
pub const CR1_BR_MASK: u32 = 0x7 << 3;
/// SPI enable
pub const CR1_SPE: u32 = 1 << 6;
/// LSB first
pub const CR1_LSBFIRST: u32 = 1 << 7;
/// Internal slave select level
pub const CR1_SSI: u32 = 1 << 8;
/// Software slave management
pub const CR1_SSM: u32 = 1 << 9;

// =============================================================================
// CR2 Bits
// =============================================================================

/// RX DMA request enable
pub const CR2_RXDMAEN: u32 = 1 << 0;
/// TX DMA request enable
pub const CR2_TXDMAEN: u32 = 1 << 1;
/// NSS output enable
pub const CR2_SSOE: u32 = 1 << 2;
/// NSS pulse between items
pub const CR2_NSSP: u32 = 1 << 3;
/// Error interrupt enable
pub const CR2_ERRIE: u32 = 1 << 5;
/// RX buffer not empty interrupt enable
pub const CR2_RXNEIE: u32 = 1 << 6;
/// TX buffer empty interrupt enable
pub const CR2_TXEIE: u32 = 1 << 7;
/// Data size field shift (value = bits - 1)
pub const CR2_DS_SHIFT: u32 = 8;
/// Data size field mask
pub const CR2_DS_MASK: u32 = 0xF << 8;
/// RXNE fires at 8-bit FIFO level
pub const CR2_FRXTH: u32 = 1 << 12;
/// Both DMA request enables
pub const CR2_DMA_MASK: u32 = CR2_RXDMAEN | CR2_TXDMAEN;
/// Both data interrupt enables
pub const CR2_IRQ_MASK: u32 = CR2_RXNEIE | CR2_TXEIE;

// =============================================================================
// SR Bits
// =============================================================================

/// Receive buffer not empty
pub const SR_RXNE: u32 = 1 << 0;
/// Transmit buffer empty
pub const SR_TXE: u32 = 1 << 1;
/// CRC error (cleared by writing 0)
pub const SR_CRCERR: u32 = 1 << 4;
/// Mode fault
pub const SR_MODF: u32 = 1 << 5;
/// Overrun
pub const SR_OVR: u32 = 1 << 6;
/// Busy
pub const SR_BSY: u32 = 1 << 7;
/// Error conditions
pub const SR_ERROR_MASK: u32 = SR_CRCERR | SR_MODF | SR_OVR;

// =============================================================================
// Instances
// =============================================================================

/// SPI peripheral instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiInstance {
    /// SPI1
    Spi1,
    /// SPI2
    Spi2,
}

impl SpiInstance {
    /// Register block base address
    #[must_use]
    pub const fn base(self) -> usize {
        match self {
            SpiInstance::Spi1 => SPI1_BASE,
            SpiInstance::Spi2 => SPI2_BASE,
        }
    }

    /// Clock domain
    #[must_use]
    pub const fn peripheral(self) -> Peripheral {
        match self {
            SpiInstance::Spi1 => Peripheral::Spi1,
            SpiInstance::Spi2 => Peripheral::Spi2,
        }
    }

    /// Interrupt line
    #[must_use]
    pub const fn interrupt(self) -> Interrupt {
        match self {
            SpiInstance::Spi1 => Interrupt::Spi1,
            SpiInstance::Spi2 => Interrupt::Spi2,
        }
    }

    /// DMA request mapping on DMA1
    #[must_use]
    pub const fn default_dma_channels(self) -> DmaChannels {
        match self {
            SpiInstance::Spi1 => DmaChannels::new(3, 2),
            SpiInstance::Spi2 => DmaChannels::new(5, 4),
        }
    }
}

// =============================================================================
// Register View
// =============================================================================

/// Register view of an SPI block
pub trait SpiRegisters {
    /// Which instance this view addresses
    fn instance(&self) -> SpiInstance;
    /// Read control register 1
    fn cr1(&self) -> u32;
    /// Write control register 1 (a write after reading SR clears MODF)
    fn write_cr1(&self, value: u32);
    /// Read control register 2
    fn cr2(&self) -> u32;
    /// Write control register 2
    fn write_cr2(&self, value: u32);
    /// Read the status register
    fn sr(&self) -> u32;
    /// Write the status register (bits written as 0 clear CRCERR)
    fn write_sr(&self, value: u32);
    /// Pop one 8-bit item
    fn read_dr8(&self) -> u8;
    /// Pop one 16-bit item
    fn read_dr16(&self) -> u16;
    /// Push one 8-bit item
    fn write_dr8(&self, value: u8);
    /// Push one 16-bit item
    fn write_dr16(&self, value: u16);
    /// Bus address of DR for DMA
    fn dr_addr(&self) -> usize;

    /// Read-modify-write control register 2
    #[inline]
    fn modify_cr2<F: FnOnce(u32) -> u32>(&self, f: F) {
        self.write_cr2(f(self.cr2()));
    }

    /// Drain the data register and status to clear a pending overrun
    #[inline]
    fn drain(&self) {
        let _ = self.read_dr8();
        let _ = self.sr();
    }

    /// Run the hardware clear sequence for every error flag in `sr`
    fn clear_errors(&self, sr: u32) {
        if sr & SR_OVR != 0 {
            self.drain();
        }
        if sr & SR_CRCERR != 0 {
            self.write_sr(!SR_CRCERR & 0xFFFF);
        }
        if sr & SR_MODF != 0 {
            self.write_cr1(self.cr1());
        }
    }
}

impl<T: SpiRegisters + ?Sized> SpiRegisters for &T {
    fn instance(&self) -> SpiInstance {
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
    fn sr(&self) -> u32 {
        (**self).sr()
    }
    fn write_sr(&self, value: u32) {
        (**self).write_sr(value);
    }
    fn read_dr8(&self) -> u8 {
        (**self).read_dr8()
    }
    fn read_dr16(&self) -> u16 {
        (**self).read_dr16()
    }
    fn write_dr8(&self, value: u8) {
        (**self).write_dr8(value);
    }
    fn write_dr16(&self, value: u16) {
        (**self).write_dr16(value);
    }
    fn dr_addr(&self) -> usize {
        (**self).dr_addr()
    }
}

/// Memory-mapped SPI block
#[derive(Debug, Clone, Copy)]
pub struct SpiMmio {
    instance: SpiInstance,
    base: usize,
}

impl SpiMmio {
    /// View of the given instance's registers
    pub const fn new(instance: SpiInstance) -> Self {
        Self {
            instance,
            base: instance.base(),
        }
    }
}

impl SpiRegisters for SpiMmio {
    fn instance(&self) -> SpiInstance {
        self.instance
    }

    super::mmio_rw!(cr1, write_cr1, CR1_OFFSET, "control register 1");
    super::mmio_rw!(cr2, write_cr2, CR2_OFFSET, "control register 2");
    super::mmio_rw!(sr, write_sr, SR_OFFSET, "status register");

    fn read_dr8(&self) -> u8 {
        // SAFETY: DR lies inside this instance's register window
        unsafe { read_reg8(self.base + DR_OFFSET) }
    }

    fn read_dr16(&self) -> u16 {
        // SAFETY: DR lies inside this instance's register window
        unsafe { read_reg16(self.base + DR_OFFSET) }
    }

    fn write_dr8(&self, value: u8) {
        // SAFETY: DR lies inside this instance's register window
        unsafe { write_reg8(self.base + DR_OFFSET, value) }
    }

    fn write_dr16(&self, value: u16) {
        // SAFETY: DR lies inside this instance's register window
        unsafe { write_reg16(self.base + DR_OFFSET, value) }
    }

    fn dr_addr(&self) -> usize {
        self.base + DR_OFFSET
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_channels_follow_request_map() {
        let spi1 = SpiInstance::Spi1.default_dma_channels();
        assert_eq!((spi1.tx, spi1.rx), (3, 2));
        let spi2 = SpiInstance::Spi2.default_dma_channels();
        assert_eq!((spi2.tx, spi2.rx), (5, 4));
    }

    #[test]
    fn dr_address() {
        assert_eq!(SpiMmio::new(SpiInstance::Spi1).dr_addr(), 0x4001_300C);
    }
}
