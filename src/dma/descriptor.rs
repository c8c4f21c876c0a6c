//! Transfer descriptors
//!
//! A [`TransferDescriptor`] is the value handed to [`DmaRouter::start`]:
//! how items move, how wide they are and which events should interrupt.
//! The router copies it into the channel's control word; nothing retains
//! the descriptor afterwards.
//!
//! [`DmaRouter::start`]: super::DmaRouter::start

use super::DmaEvents;
use crate::register::dma::{
    CCR_CIRC, CCR_DIR, CCR_HTIE, CCR_MINC, CCR_MSIZE_SHIFT, CCR_PINC, CCR_PL_SHIFT,
    CCR_PSIZE_SHIFT, CCR_TCIE, CCR_TEIE,
};

/// Transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    /// Peripheral data register into memory
    PeripheralToMemory,
    /// Memory into peripheral data register
    MemoryToPeripheral,
}

/// Width of one item on both sides of the transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ItemWidth {
    /// 8-bit items
    #[default]
    Byte,
    /// 16-bit items
    HalfWord,
    /// 32-bit items
    Word,
}

impl ItemWidth {
    /// Size of one item in bytes
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            ItemWidth::Byte => 1,
            ItemWidth::HalfWord => 2,
            ItemWidth::Word => 4,
        }
    }

    const fn size_field(self) -> u32 {
        match self {
            ItemWidth::Byte => 0,
            ItemWidth::HalfWord => 1,
            ItemWidth::Word => 2,
        }
    }
}

/// Channel arbitration priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaPriority {
    /// Low
    Low,
    /// Medium
    Medium,
    /// High
    #[default]
    High,
    /// Very high
    VeryHigh,
}

/// Shape of one DMA transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferDescriptor {
    /// Which side is the source
    pub direction: Direction,
    /// Item width (peripheral and memory sides alike)
    pub width: ItemWidth,
    /// Step the memory address after each item
    pub memory_increment: bool,
    /// Step the peripheral address after each item
    pub peripheral_increment: bool,
    /// Reload the counter and restart at the end
    pub circular: bool,
    /// Arbitration priority
    pub priority: DmaPriority,
    /// Events that raise the channel interrupt
    pub interrupts: DmaEvents,
}

impl TransferDescriptor {
    /// Byte-wide transfer in `direction` with an incrementing memory
    /// address and no interrupts
    pub const fn new(direction: Direction) -> Self {
        Self {
            direction,
            width: ItemWidth::Byte,
            memory_increment: true,
            peripheral_increment: false,
            circular: false,
            priority: DmaPriority::High,
            interrupts: DmaEvents::empty(),
        }
    }

    /// Memory into a peripheral data register
    pub const fn memory_to_peripheral() -> Self {
        Self::new(Direction::MemoryToPeripheral)
    }

    /// Peripheral data register into memory
    pub const fn peripheral_to_memory() -> Self {
        Self::new(Direction::PeripheralToMemory)
    }

    /// Set the item width
    #[must_use]
    pub const fn with_width(mut self, width: ItemWidth) -> Self {
        self.width = width;
        self
    }

    /// Enable or disable the memory address increment
    #[must_use]
    pub const fn with_memory_increment(mut self, enabled: bool) -> Self {
        self.memory_increment = enabled;
        self
    }

    /// Enable or disable circular mode
    #[must_use]
    pub const fn with_circular(mut self, enabled: bool) -> Self {
        self.circular = enabled;
        self
    }

    /// Set the arbitration priority
    #[must_use]
    pub const fn with_priority(mut self, priority: DmaPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the events that interrupt
    #[must_use]
    pub const fn with_interrupts(mut self, interrupts: DmaEvents) -> Self {
        self.interrupts = interrupts;
        self
    }

    /// Channel control word, without the enable bit
    #[must_use]
    pub fn control_word(&self) -> u32 {
        let mut ccr = (self.width.size_field() << CCR_PSIZE_SHIFT)
            | (self.width.size_field() << CCR_MSIZE_SHIFT)
            | ((self.priority as u32) << CCR_PL_SHIFT);

        if self.direction == Direction::MemoryToPeripheral {
            ccr |= CCR_DIR;
        }
        if self.memory_increment {
            ccr |= CCR_MINC;
        }
        if self.peripheral_increment {
            ccr |= CCR_PINC;
        }
        if self.circular {
            ccr |= CCR_CIRC;
        }
        if self.interrupts.contains(DmaEvents::COMPLETE) {
            ccr |= CCR_TCIE;
        }
        if self.interrupts.contains(DmaEvents::HALF) {
            ccr |= CCR_HTIE;
        }
        if self.interrupts.contains(DmaEvents::ERROR) {
            ccr |= CCR_TEIE;
        }
        ccr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::register::dma::CCR_EN;

    #[test]
    fn tx_burst_control_word() {
        let desc = TransferDescriptor::memory_to_peripheral()
            .with_interrupts(DmaEvents::COMPLETE | DmaEvents::ERROR);
        let ccr = desc.control_word();
        assert_eq!(ccr & CCR_DIR, CCR_DIR);
        assert_eq!(ccr & CCR_MINC, CCR_MINC);
        assert_eq!(ccr & (CCR_TCIE | CCR_TEIE), CCR_TCIE | CCR_TEIE);
        assert_eq!(ccr & CCR_HTIE, 0);
        assert_eq!(ccr & CCR_EN, 0);
        assert_eq!((ccr >> CCR_PL_SHIFT) & 0x3, 2);
    }

    #[test]
    fn circular_halfword_receive() {
        let desc = TransferDescriptor::peripheral_to_memory()
            .with_width(ItemWidth::HalfWord)
            .with_circular(true)
            .with_priority(DmaPriority::VeryHigh);
        let ccr = desc.control_word();
        assert_eq!(ccr & CCR_DIR, 0);
        assert_eq!(ccr & CCR_CIRC, CCR_CIRC);
        assert_eq!((ccr >> CCR_PSIZE_SHIFT) & 0x3, 1);
        assert_eq!((ccr >> CCR_MSIZE_SHIFT) & 0x3, 1);
        assert_eq!((ccr >> CCR_PL_SHIFT) & 0x3, 3);
    }

    #[test]
    fn fixed_address_source() {
        let desc = TransferDescriptor::memory_to_peripheral().with_memory_increment(false);
        assert_eq!(desc.control_word() & CCR_MINC, 0);
    }
}
