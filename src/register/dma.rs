//! DMA1 Controller Register Definitions
//!
//! One shared interrupt status/clear pair (`ISR`/`IFCR`) with a 4-bit field
//! per channel, followed by a 20-byte block per channel holding the control
//! word, item counter and the two address registers. Channels are numbered
//! from 1, matching the reference manual.

use super::{DMA1_BASE, read_reg, write_reg};

// =============================================================================
// Register Offsets
// =============================================================================

/// Interrupt status register offset
pub const ISR_OFFSET: usize = 0x00;
/// Interrupt flag clear register offset
pub const IFCR_OFFSET: usize = 0x04;
/// Offset of channel 1's register block
pub const CHANNEL_OFFSET: usize = 0x08;
/// Distance between consecutive channel blocks
pub const CHANNEL_STRIDE: usize = 0x14;
/// Channel configuration register offset within a channel block
pub const CCR_OFFSET: usize = 0x00;
/// Channel item counter offset within a channel block
pub const CNDTR_OFFSET: usize = 0x04;
/// Channel peripheral address offset within a channel block
pub const CPAR_OFFSET: usize = 0x08;
/// Channel memory address offset within a channel block
pub const CMAR_OFFSET: usize = 0x0C;

// =============================================================================
// ISR / IFCR per-channel field (shift by `flag_shift(channel)`)
// =============================================================================

/// Global interrupt flag
pub const ISR_GIF: u32 = 1 << 0;
/// Transfer complete flag
pub const ISR_TCIF: u32 = 1 << 1;
/// Half transfer flag
pub const ISR_HTIF: u32 = 1 << 2;
/// Transfer error flag
pub const ISR_TEIF: u32 = 1 << 3;
/// Event flags that carry meaning to a channel client
pub const ISR_EVENT_MASK: u32 = ISR_TCIF | ISR_HTIF | ISR_TEIF;
/// Every flag of one channel field
pub const ISR_CHANNEL_MASK: u32 = 0xF;

/// Bit position of a channel's field in `ISR`/`IFCR`
#[inline(always)]
#[must_use]
pub const fn flag_shift(channel: u8) -> u32 {
    4 * (channel as u32 - 1)
}

// =============================================================================
// Channel Configuration Register (CCR) Bits
// =============================================================================

/// Channel enable
pub const CCR_EN: u32 = 1 << 0;
/// Transfer complete interrupt enable
pub const CCR_TCIE: u32 = 1 << 1;
/// Half transfer interrupt enable
pub const CCR_HTIE: u32 = 1 << 2;
/// Transfer error interrupt enable
pub const CCR_TEIE: u32 = 1 << 3;
/// Direction: 1 = read from memory, write to peripheral
pub const CCR_DIR: u32 = 1 << 4;
/// Circular mode
pub const CCR_CIRC: u32 = 1 << 5;
/// Peripheral address increment
pub const CCR_PINC: u32 = 1 << 6;
/// Memory address increment
pub const CCR_MINC: u32 = 1 << 7;
/// Peripheral size field shift (0 = 8, 1 = 16, 2 = 32 bits)
pub const CCR_PSIZE_SHIFT: u32 = 8;
/// Memory size field shift
pub const CCR_MSIZE_SHIFT: u32 = 10;
/// Priority level field shift
pub const CCR_PL_SHIFT: u32 = 12;

// =============================================================================
// Register View
// =============================================================================

/// Register view of a DMA controller
///
/// `channel` arguments are 1-based and must already be validated by the
/// caller.
pub trait DmaRegisters {
    /// Read the consolidated interrupt status register
    fn isr(&self) -> u32;
    /// Clear exactly the flags set in `mask`
    fn write_ifcr(&self, mask: u32);
    /// Read a channel's configuration register
    fn ccr(&self, channel: u8) -> u32;
    /// Write a channel's configuration register
    fn write_ccr(&self, channel: u8, value: u32);
    /// Read a channel's remaining item count
    fn cndtr(&self, channel: u8) -> u32;
    /// Write a channel's item count (only effective while disabled)
    fn write_cndtr(&self, channel: u8, value: u32);
    /// Write a channel's peripheral address
    fn write_cpar(&self, channel: u8, addr: usize);
    /// Write a channel's memory address
    fn write_cmar(&self, channel: u8, addr: usize);
}

impl<T: DmaRegisters + ?Sized> DmaRegisters for &T {
    fn isr(&self) -> u32 {
        (**self).isr()
    }
    fn write_ifcr(&self, mask: u32) {
        (**self).write_ifcr(mask);
    }
    fn ccr(&self, channel: u8) -> u32 {
        (**self).ccr(channel)
    }
    fn write_ccr(&self, channel: u8, value: u32) {
        (**self).write_ccr(channel, value);
    }
    fn cndtr(&self, channel: u8) -> u32 {
        (**self).cndtr(channel)
    }
    fn write_cndtr(&self, channel: u8, value: u32) {
        (**self).write_cndtr(channel, value);
    }
    fn write_cpar(&self, channel: u8, addr: usize) {
        (**self).write_cpar(channel, addr);
    }
    fn write_cmar(&self, channel: u8, addr: usize) {
        (**self).write_cmar(channel, addr);
    }
}

/// Memory-mapped DMA1 controller
#[derive(Debug, Clone, Copy)]
pub struct Dma1 {
    base: usize,
}

impl Dma1 {
    /// DMA1 at its fixed address
    pub const fn new() -> Self {
        Self { base: DMA1_BASE }
    }

    #[inline(always)]
    fn channel_reg(&self, channel: u8, offset: usize) -> usize {
        self.base + CHANNEL_OFFSET + CHANNEL_STRIDE * usize::from(channel.saturating_sub(1)) + offset
    }
}

impl Default for Dma1 {
    fn default() -> Self {
        Self::new()
    }
}

impl DmaRegisters for Dma1 {
    super::mmio_ro!(isr, ISR_OFFSET, "interrupt status register");
    super::mmio_wo!(write_ifcr, IFCR_OFFSET, "interrupt flag clear register");

    fn ccr(&self, channel: u8) -> u32 {
        // SAFETY: channel block lies inside the DMA1 register window
        unsafe { read_reg(self.channel_reg(channel, CCR_OFFSET)) }
    }

    fn write_ccr(&self, channel: u8, value: u32) {
        // SAFETY: channel block lies inside the DMA1 register window
        unsafe { write_reg(self.channel_reg(channel, CCR_OFFSET), value) }
    }

    fn cndtr(&self, channel: u8) -> u32 {
        // SAFETY: channel block lies inside the DMA1 register window
        unsafe { read_reg(self.channel_reg(channel, CNDTR_OFFSET)) }
    }

    fn write_cndtr(&self, channel: u8, value: u32) {
        // SAFETY: channel block lies inside the DMA1 register window
        unsafe { write_reg(self.channel_reg(channel, CNDTR_OFFSET), value) }
    }

    fn write_cpar(&self, channel: u8, addr: usize) {
        // SAFETY: channel block lies inside the DMA1 register window
        unsafe { write_reg(self.channel_reg(channel, CPAR_OFFSET), addr as u32) }
    }

    fn write_cmar(&self, channel: u8, addr: usize) {
        // SAFETY: channel block lies inside the DMA1 register window
        unsafe { write_reg(self.channel_reg(channel, CMAR_OFFSET), addr as u32) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_fields_are_four_bits_apart() {
        assert_eq!(flag_shift(1), 0);
        assert_eq!(flag_shift(2), 4);
        assert_eq!(flag_shift(5), 16);
        assert_eq!(ISR_TEIF << flag_shift(3), 1 << 11);
    }

    #[test]
    fn channel_blocks_follow_reference_layout() {
        let dma = Dma1::new();
        assert_eq!(dma.channel_reg(1, CCR_OFFSET), 0x4002_0008);
        assert_eq!(dma.channel_reg(2, CNDTR_OFFSET), 0x4002_0020);
        assert_eq!(dma.channel_reg(5, CMAR_OFFSET), 0x4002_0064);
    }
}
