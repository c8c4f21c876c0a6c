//! Serial-link engine
//!
//! Transmit drains a byte ring either one byte per TXE interrupt or in DMA
//! bursts over the longest contiguous run of the ring. Receive either
//! pushes each byte into a second ring (RXNE interrupt) or lets a circular
//! DMA channel fill that ring's storage, handing new bytes to the user on
//! every idle-line interrupt.
//!
//! In DMA receive mode the amount of new data is derived from the
//! channel's remaining-item counter:
//!
//! ```text
//! delta = last >= now ? last - now : last + size - now
//! ```

use crate::constants::DMA_MAX_ITEMS;
use crate::dma::{DmaEvents, DmaRouter, TransferDescriptor, XferEngine};
use crate::error::{ConfigError, ConfigResult, DmaError, SerialError};
use crate::hal::{ClockGate, InterruptController};
use crate::register::usart::{
    CR1_IDLEIE, CR1_RE, CR1_RXNEIE, CR1_TCIE, CR1_TE, CR1_TXEIE, CR1_UE, CR3_DMAR, CR3_DMAT,
    CR3_EIE, ICR_IDLECF, ICR_TCCF, ISR_ERROR_MASK, ISR_FE, ISR_IDLE, ISR_NE, ISR_ORE, ISR_PE,
    ISR_RXNE, ISR_TC, ISR_TXE,
};
use crate::register::{DmaRegisters, UsartRegisters};
use crate::serial::{RingBuffer, SerialConfig};

#[cfg(feature = "log")]
use log::{debug, warn};

/// Serial-link engine with `TX`/`RX`-byte rings
///
/// Once [`init`](Self::init) has armed a DMA channel on the engine's
/// storage the engine must not move; keep it in a `static`
/// [`SharedSerial`](crate::sync::SharedSerial).
pub struct SerialEngine<'a, R: UsartRegisters, D: DmaRegisters, const TX: usize, const RX: usize> {
    regs: R,
    router: &'a DmaRouter<'a, D>,
    config: SerialConfig,
    tx_ring: RingBuffer<TX>,
    rx_ring: RingBuffer<RX>,
    /// Items of the running TX burst, 0 when none
    tx_burst: usize,
    /// Remaining-count observed at the last idle event
    rx_last: usize,
    on_rx_chunk: Option<&'a dyn Fn(&[u8])>,
    on_tx_done: Option<&'a dyn Fn()>,
    on_error: Option<&'a dyn Fn(SerialError, u32)>,
}

impl<'a, R, D, const TX: usize, const RX: usize> SerialEngine<'a, R, D, TX, RX>
where
    R: UsartRegisters,
    D: DmaRegisters,
{
    /// Create an engine with empty rings
    pub const fn new(regs: R, router: &'a DmaRouter<'a, D>, config: SerialConfig) -> Self {
        Self {
            regs,
            router,
            config,
            tx_ring: RingBuffer::new(),
            rx_ring: RingBuffer::new(),
            tx_burst: 0,
            rx_last: RX,
            on_rx_chunk: None,
            on_tx_done: None,
            on_error: None,
        }
    }

    /// Program the frame format and baud rate, arm receive and enable
    ///
    /// With DMA in either direction the configured channels must already be
    /// attached to the router.
    pub fn init<C, I>(&mut self, clocks: &mut C, irqs: &mut I) -> ConfigResult<()>
    where
        C: ClockGate,
        I: InterruptController,
    {
        let brr = self.config.brr()?;
        let tx_dma = self.config.tx_engine == XferEngine::Dma;
        let rx_dma = self.config.rx_engine == XferEngine::Dma;
        if tx_dma || rx_dma {
            let attached = self.config.dma.is_some_and(|c| {
                (!tx_dma || self.router.is_attached(c.tx))
                    && (!rx_dma || self.router.is_attached(c.rx))
            });
            if !attached || (rx_dma && RX > DMA_MAX_ITEMS) {
                return Err(ConfigError::DmaUnavailable);
            }
        }

        let instance = self.regs.instance();
        clocks.enable(instance.peripheral());
        self.regs.write_cr1(0);
        self.regs.write_brr(brr);
        self.regs.write_cr2(self.config.cr2_stop());

        let mut cr3 = CR3_EIE;
        if tx_dma {
            cr3 |= CR3_DMAT;
        }
        if rx_dma {
            cr3 |= CR3_DMAR;
        }
        self.regs.write_cr3(cr3);

        self.tx_ring.clear();
        self.rx_ring.clear();
        self.tx_burst = 0;

        let mut cr1 = self.config.cr1_format() | CR1_TE | CR1_RE;
        if rx_dma {
            self.arm_rx().map_err(|_| ConfigError::DmaUnavailable)?;
            cr1 |= CR1_IDLEIE;
        } else {
            cr1 |= CR1_RXNEIE;
        }
        self.regs.write_cr1(cr1);

        irqs.enable(instance.interrupt(), self.config.irq_priority);
        self.regs.write_cr1(cr1 | CR1_UE);

        #[cfg(feature = "log")]
        debug!("serial up: {} baud, brr=0x{brr:04x}", self.config.baud_rate);
        Ok(())
    }

    /// Register the callback for DMA-received chunks
    ///
    /// The slice is only valid for the duration of the call.
    pub fn set_rx_callback(&mut self, callback: &'a dyn Fn(&[u8])) {
        self.on_rx_chunk = Some(callback);
    }

    /// Register the callback run when the transmit side drains
    pub fn set_tx_done_callback(&mut self, callback: &'a dyn Fn()) {
        self.on_tx_done = Some(callback);
    }

    /// Register the line error callback, called with the raw status
    pub fn set_error_callback(&mut self, callback: &'a dyn Fn(SerialError, u32)) {
        self.on_error = Some(callback);
    }

    /// Engine configuration
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    /// Router the engine arms channels on
    pub fn router(&self) -> &'a DmaRouter<'a, D> {
        self.router
    }

    /// Bytes queued for transmission, including a running burst
    pub fn tx_pending(&self) -> usize {
        self.tx_ring.available()
    }

    /// Bytes buffered for [`read`](Self::read)
    pub fn rx_available(&self) -> usize {
        self.rx_ring.available()
    }

    /// Queue as much of `data` as fits and start moving it
    ///
    /// Returns the number of bytes queued.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let queued = self.tx_ring.push_slice(data);
        if queued > 0 {
            self.kick();
        }
        queued
    }

    /// Move up to `out.len()` received bytes into `out`
    ///
    /// Always 0 when receive runs over DMA; those bytes go to the RX
    /// callback instead.
    pub fn read(&mut self, out: &mut [u8]) -> usize {
        if self.config.rx_engine == XferEngine::Dma {
            return 0;
        }
        self.rx_ring.pop_into(out)
    }

    /// Whether every queued byte has left the shift register
    pub fn is_tx_idle(&self) -> bool {
        if !self.tx_ring.is_empty() || self.tx_burst != 0 {
            return false;
        }
        if let Some(channels) = self.config.dma
            && self.config.tx_engine == XferEngine::Dma
            && self.router.is_enabled(channels.tx)
        {
            return false;
        }
        self.regs.isr() & ISR_TC != 0
    }

    /// Peripheral interrupt entry
    pub fn on_interrupt(&mut self) {
        let isr = self.regs.isr();
        let cr1 = self.regs.cr1();

        let errors = isr & ISR_ERROR_MASK;
        if errors != 0 {
            self.regs.write_icr(errors);
            if let Some(error) = Self::error_from(errors) {
                self.report(error, isr);
            }
        }

        if isr & ISR_RXNE != 0 && cr1 & CR1_RXNEIE != 0 {
            let byte = self.regs.read_rdr();
            if !self.rx_ring.push(byte) {
                #[cfg(feature = "log")]
                warn!("serial rx ring full, byte dropped");
            }
        }

        if isr & ISR_IDLE != 0 && cr1 & CR1_IDLEIE != 0 {
            self.regs.write_icr(ICR_IDLECF);
            self.deliver_rx_window();
        }

        if isr & ISR_TXE != 0 && cr1 & CR1_TXEIE != 0 {
            match self.tx_ring.pop() {
                Some(byte) => self.regs.write_tdr(byte),
                None => self.regs.modify_cr1(|v| (v & !CR1_TXEIE) | CR1_TCIE),
            }
        }

        if isr & ISR_TC != 0 && cr1 & CR1_TCIE != 0 {
            self.regs.write_icr(ICR_TCCF);
            self.regs.modify_cr1(|v| v & !CR1_TCIE);
            self.notify_tx_done();
        }
    }

    /// DMA channel event entry
    pub fn on_dma_event(&mut self, channel: u8, events: DmaEvents) {
        let Some(channels) = self.config.dma else {
            return;
        };

        if channel == channels.tx && self.config.tx_engine == XferEngine::Dma {
            let _ = self.router.stop(channels.tx);
            if events.contains(DmaEvents::ERROR) {
                self.report(SerialError::Dma, 0);
            }
            // A failed burst is dropped rather than retried
            self.tx_ring.advance_tail(self.tx_burst);
            self.tx_burst = 0;
            if self.tx_ring.is_empty() {
                self.notify_tx_done();
            } else {
                self.kick();
            }
        } else if channel == channels.rx
            && self.config.rx_engine == XferEngine::Dma
            && events.contains(DmaEvents::ERROR)
        {
            self.report(SerialError::Dma, 0);
            if self.arm_rx().is_err() {
                #[cfg(feature = "log")]
                warn!("serial rx channel could not be re-armed");
            }
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn kick(&mut self) {
        match self.config.tx_engine {
            XferEngine::Irq => {
                if !self.tx_ring.is_empty() {
                    self.regs.modify_cr1(|v| (v & !CR1_TCIE) | CR1_TXEIE);
                }
            }
            XferEngine::Dma => self.kick_dma(),
        }
    }

    fn kick_dma(&mut self) {
        if self.tx_burst != 0 {
            return;
        }
        let Some(channels) = self.config.dma else {
            return;
        };
        let run = self.tx_ring.contiguous();
        if run.is_empty() {
            return;
        }
        let len = run.len().min(DMA_MAX_ITEMS);
        let src = run.as_ptr() as usize;
        let desc = TransferDescriptor::memory_to_peripheral()
            .with_priority(self.config.dma_priority)
            .with_interrupts(DmaEvents::COMPLETE | DmaEvents::ERROR);

        self.regs.write_icr(ICR_TCCF);
        if self
            .router
            .start(channels.tx, src, self.regs.tdr_addr(), len as u16, &desc)
            .is_ok()
        {
            self.tx_burst = len;
        }
    }

    fn arm_rx(&mut self) -> Result<(), DmaError> {
        let channel = self.config.dma.ok_or(DmaError::InvalidChannel)?.rx;
        // The circular window is the whole ring
        let count = u16::try_from(RX).map_err(|_| DmaError::InvalidCount)?;
        let desc = TransferDescriptor::peripheral_to_memory()
            .with_circular(true)
            .with_priority(self.config.dma_priority)
            .with_interrupts(DmaEvents::ERROR);
        let dst = self.rx_ring.storage_ptr() as usize;
        self.router
            .start(channel, self.regs.rdr_addr(), dst, count, &desc)?;
        self.rx_last = RX;
        Ok(())
    }

    fn deliver_rx_window(&mut self) {
        let Some(channels) = self.config.dma else {
            return;
        };
        let Ok(now) = self.router.remaining(channels.rx) else {
            return;
        };
        // The counter reloads on wrap; 0 is only seen mid-reload
        let now = match usize::from(now) {
            0 => RX,
            n => n.min(RX),
        };
        let last = self.rx_last;
        let delta = if last >= now { last - now } else { last + RX - now };
        self.rx_last = now;
        if delta == 0 {
            return;
        }

        let start = (RX - last) % RX;
        let storage = self.rx_ring.storage();
        let first_len = delta.min(RX - start);
        if let Some(callback) = self.on_rx_chunk {
            callback(&storage[start..start + first_len]);
            if delta > first_len {
                callback(&storage[..delta - first_len]);
            }
        }
    }

    fn error_from(errors: u32) -> Option<SerialError> {
        if errors & ISR_ORE != 0 {
            Some(SerialError::Overrun)
        } else if errors & ISR_NE != 0 {
            Some(SerialError::Noise)
        } else if errors & ISR_FE != 0 {
            Some(SerialError::Framing)
        } else if errors & ISR_PE != 0 {
            Some(SerialError::Parity)
        } else {
            None
        }
    }

    fn report(&self, error: SerialError, isr: u32) {
        #[cfg(feature = "log")]
        warn!("serial error: {} (isr=0x{isr:08x})", error.as_str());
        if let Some(callback) = self.on_error {
            callback(error, isr);
        }
    }

    fn notify_tx_done(&self) {
        if let Some(callback) = self.on_tx_done {
            callback();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
