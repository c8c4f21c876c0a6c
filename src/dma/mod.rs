//! DMA channel routing
//!
//! The [`DmaRouter`] owns the DMA1 channel pool. Peripheral engines attach
//! themselves as the [`DmaClient`] of the channels they use, arm those
//! channels with a [`TransferDescriptor`], and receive [`DmaEvents`] when
//! the shared interrupt lines fire.
//!
//! Channels are numbered from 1 as in the reference manual. Ownership is
//! static: one client per channel, decided when the engines are bound.

mod descriptor;
mod router;

pub use descriptor::{Direction, DmaPriority, ItemWidth, TransferDescriptor};
pub use router::DmaRouter;

use crate::hal::Interrupt;
use core::ops::RangeInclusive;

bitflags::bitflags! {
    /// Channel events delivered to a [`DmaClient`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DmaEvents: u8 {
        /// All items transferred (or the circular buffer wrapped)
        const COMPLETE = 1 << 0;
        /// Half of the items transferred
        const HALF = 1 << 1;
        /// Bus error; the channel has been disabled by hardware
        const ERROR = 1 << 2;
    }
}

/// Receiver of channel events
///
/// Called from the DMA interrupt handler. `events` is never empty.
pub trait DmaClient {
    /// Handle the events that fired on `channel`
    fn on_dma_event(&self, channel: u8, events: DmaEvents);
}

/// Transmit/receive channel pair used by one peripheral
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaChannels {
    /// Memory-to-peripheral channel
    pub tx: u8,
    /// Peripheral-to-memory channel
    pub rx: u8,
}

impl DmaChannels {
    /// Create a channel pair
    pub const fn new(tx: u8, rx: u8) -> Self {
        Self { tx, rx }
    }
}

/// Data path of one transfer direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum XferEngine {
    /// One item per peripheral interrupt
    #[default]
    Irq,
    /// Moved by a DMA channel
    Dma,
}

/// Shared DMA interrupt lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqLine {
    /// Channel 1
    Ch1,
    /// Channels 2 and 3
    Ch2To3,
    /// Channels 4 and 5
    #[cfg(not(feature = "stm32f072"))]
    Ch4To5,
    /// Channels 4 to 7
    #[cfg(feature = "stm32f072")]
    Ch4To7,
}

impl IrqLine {
    /// Every line of the controller
    #[cfg(not(feature = "stm32f072"))]
    pub const ALL: [IrqLine; 3] = [IrqLine::Ch1, IrqLine::Ch2To3, IrqLine::Ch4To5];

    /// Every line of the controller
    #[cfg(feature = "stm32f072")]
    pub const ALL: [IrqLine; 3] = [IrqLine::Ch1, IrqLine::Ch2To3, IrqLine::Ch4To7];

    /// Channels multiplexed on this line
    #[must_use]
    pub const fn channels(self) -> RangeInclusive<u8> {
        match self {
            IrqLine::Ch1 => 1..=1,
            IrqLine::Ch2To3 => 2..=3,
            #[cfg(not(feature = "stm32f072"))]
            IrqLine::Ch4To5 => 4..=5,
            #[cfg(feature = "stm32f072")]
            IrqLine::Ch4To7 => 4..=7,
        }
    }

    /// Vector table entry
    #[must_use]
    pub const fn interrupt(self) -> Interrupt {
        match self {
            IrqLine::Ch1 => Interrupt::Dma1Ch1,
            IrqLine::Ch2To3 => Interrupt::Dma1Ch2To3,
            #[cfg(not(feature = "stm32f072"))]
            IrqLine::Ch4To5 => Interrupt::Dma1Ch4To5,
            #[cfg(feature = "stm32f072")]
            IrqLine::Ch4To7 => Interrupt::Dma1Ch4To7,
        }
    }

    /// Line serving `channel`
    #[must_use]
    pub fn of(channel: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|line| line.channels().contains(&channel))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_cover_every_channel_once() {
        for channel in 1..=crate::constants::DMA_CHANNELS as u8 {
            let covering = IrqLine::ALL
                .iter()
                .filter(|line| line.channels().contains(&channel))
                .count();
            assert_eq!(covering, 1, "channel {channel}");
        }
    }

    #[test]
    fn line_lookup() {
        assert_eq!(IrqLine::of(1), Some(IrqLine::Ch1));
        assert_eq!(IrqLine::of(3), Some(IrqLine::Ch2To3));
        assert_eq!(IrqLine::of(0), None);
    }

    #[test]
    fn events_are_independent_bits() {
        let events = DmaEvents::COMPLETE | DmaEvents::ERROR;
        assert!(events.contains(DmaEvents::ERROR));
        assert!(!events.contains(DmaEvents::HALF));
    }
}
