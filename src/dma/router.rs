//! DMA channel router
//!
//! Owns the channel slots and the controller registers. Arming a channel is
//! always disable → clear flags → program → enable, so re-arming a running
//! channel is a clean restart and never reports the superseded run.

use super::{DmaClient, DmaEvents, IrqLine, TransferDescriptor};
use crate::constants::DMA_CHANNELS;
use crate::error::{DmaError, DmaResult};
use crate::hal::{ClockGate, InterruptController, Peripheral, Priority};
use crate::register::dma::{
    CCR_EN, ISR_CHANNEL_MASK, ISR_EVENT_MASK, ISR_GIF, ISR_HTIF, ISR_TCIF, ISR_TEIF, flag_shift,
};
use crate::register::DmaRegisters;
use crate::sync::CriticalSectionCell;

#[cfg(feature = "log")]
use log::{trace, warn};

type Slots<'a> = [Option<&'a dyn DmaClient>; DMA_CHANNELS];

/// DMA channel pool with per-channel event routing
///
/// `'a` is the lifetime of the attached clients; for interrupt-driven use
/// both the router and its clients are typically `'static`.
///
/// # Example
///
/// ```ignore
/// static DMA: DmaRouter<'static, Dma1> = DmaRouter::new(Dma1::new());
///
/// DMA.initialize(&mut Rcc::new(), &mut Nvic::new(), Priority::P1);
///
/// #[interrupt]
/// fn DMA1_CH2_3() {
///     DMA.on_interrupt(IrqLine::Ch2To3);
/// }
/// ```
pub struct DmaRouter<'a, D: DmaRegisters> {
    regs: D,
    slots: CriticalSectionCell<Slots<'a>>,
}

impl<'a, D: DmaRegisters> DmaRouter<'a, D> {
    /// Create a router with every slot empty
    pub const fn new(regs: D) -> Self {
        Self {
            regs,
            slots: CriticalSectionCell::new([None; DMA_CHANNELS]),
        }
    }

    /// Drop every attachment, clock the controller and unmask its lines
    pub fn initialize<C, I>(&self, clocks: &mut C, irqs: &mut I, priority: Priority)
    where
        C: ClockGate,
        I: InterruptController,
    {
        self.slots.with(|slots| *slots = [None; DMA_CHANNELS]);
        clocks.enable(Peripheral::Dma1);
        for line in IrqLine::ALL {
            irqs.enable(line.interrupt(), priority);
        }
    }

    /// Validate a 1-based channel number, returning its slot index
    #[inline]
    fn slot(channel: u8) -> DmaResult<usize> {
        match usize::from(channel) {
            n @ 1..=DMA_CHANNELS => Ok(n - 1),
            _ => Err(DmaError::InvalidChannel),
        }
    }

    /// Route `channel`'s events to `client`, replacing any previous client
    pub fn attach(&self, channel: u8, client: &'a dyn DmaClient) -> DmaResult<()> {
        let idx = Self::slot(channel)?;
        self.slots.with(|slots| slots[idx] = Some(client));
        Ok(())
    }

    /// Stop routing `channel`'s events
    pub fn detach(&self, channel: u8) -> DmaResult<()> {
        let idx = Self::slot(channel)?;
        self.slots.with(|slots| slots[idx] = None);
        Ok(())
    }

    /// Whether a client is attached to `channel`
    pub fn is_attached(&self, channel: u8) -> bool {
        Self::slot(channel).is_ok_and(|idx| self.slots.with(|slots| slots[idx].is_some()))
    }

    /// Arm `channel` to move `count` items from `src` to `dst`
    ///
    /// Which of `src`/`dst` is the peripheral register follows
    /// `descriptor.direction`. A running channel is stopped first and its
    /// pending flags are discarded.
    pub fn start(
        &self,
        channel: u8,
        src: usize,
        dst: usize,
        count: u16,
        descriptor: &TransferDescriptor,
    ) -> DmaResult<()> {
        Self::slot(channel)?;
        self.disable(channel);
        self.clear_flags(channel);

        let (peripheral, memory) = match descriptor.direction {
            super::Direction::MemoryToPeripheral => (dst, src),
            super::Direction::PeripheralToMemory => (src, dst),
        };
        self.regs.write_cpar(channel, peripheral);
        self.regs.write_cmar(channel, memory);
        self.regs.write_cndtr(channel, u32::from(count));
        self.regs
            .write_ccr(channel, descriptor.control_word() | CCR_EN);

        #[cfg(feature = "log")]
        trace!("dma ch{channel} armed: {count} items");
        Ok(())
    }

    /// Disable `channel` and discard its pending flags
    ///
    /// Never invokes the client. Stopping a stopped channel is a no-op.
    pub fn stop(&self, channel: u8) -> DmaResult<()> {
        Self::slot(channel)?;
        self.disable(channel);
        self.clear_flags(channel);
        Ok(())
    }

    /// Whether `channel`'s enable bit is set
    pub fn is_enabled(&self, channel: u8) -> bool {
        Self::slot(channel).is_ok_and(|_| self.regs.ccr(channel) & CCR_EN != 0)
    }

    /// Overwrite `channel`'s item counter
    ///
    /// The controller only latches the new count while the channel is
    /// disabled.
    pub fn set_length(&self, channel: u8, count: u16) -> DmaResult<()> {
        Self::slot(channel)?;
        self.regs.write_cndtr(channel, u32::from(count));
        Ok(())
    }

    /// Items `channel` still has to move
    pub fn remaining(&self, channel: u8) -> DmaResult<u16> {
        Self::slot(channel)?;
        Ok((self.regs.cndtr(channel) & 0xFFFF) as u16)
    }

    /// Demultiplex one shared interrupt line
    ///
    /// Call from the line's interrupt handler. `ISR` is sampled once for
    /// the whole line.
    pub fn on_interrupt(&self, line: IrqLine) {
        let isr = self.regs.isr();
        for channel in line.channels() {
            self.dispatch(channel, isr);
        }
    }

    fn dispatch(&self, channel: u8, isr: u32) {
        let Ok(idx) = Self::slot(channel) else {
            return;
        };
        let shift = flag_shift(channel);
        let pending = (isr >> shift) & ISR_EVENT_MASK;
        if pending == 0 {
            return;
        }
        self.regs.write_ifcr((pending | ISR_GIF) << shift);

        let events = Self::events_from_flags(pending);

        #[cfg(feature = "log")]
        if events.contains(DmaEvents::ERROR) {
            warn!("dma ch{channel} transfer error");
        }

        // Copy the client out so it can re-arm channels from its handler
        let client = self.slots.with(|slots| slots[idx]);
        if let Some(client) = client {
            client.on_dma_event(channel, events);
        }
    }

    fn events_from_flags(flags: u32) -> DmaEvents {
        let mut events = DmaEvents::empty();
        events.set(DmaEvents::COMPLETE, flags & ISR_TCIF != 0);
        events.set(DmaEvents::HALF, flags & ISR_HTIF != 0);
        events.set(DmaEvents::ERROR, flags & ISR_TEIF != 0);
        events
    }

    #[inline]
    fn disable(&self, channel: u8) {
        let ccr = self.regs.ccr(channel);
        if ccr & CCR_EN != 0 {
            self.regs.write_ccr(channel, ccr & !CCR_EN);
        }
    }

    #[inline]
    fn clear_flags(&self, channel: u8) {
        self.regs
            .write_ifcr(ISR_CHANNEL_MASK << flag_shift(channel));
    }
}

// =============================================================================
// Tests
// =============================================================================
