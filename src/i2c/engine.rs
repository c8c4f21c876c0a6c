//! Two-wire transaction engine
//!
//! Drives one master write, read or write-then-read as a chunked state
//! machine. Each chunk is at most 255 bytes (the width of `NBYTES`); longer
//! phases continue with RELOAD, the last chunk of the transaction ends with
//! AUTOEND, and a write followed by a read turns around with a repeated
//! START instead of releasing the bus.
//!
//! Bytes move either one per interrupt or through the DMA channel of that
//! direction. In DMA mode the engine only hears about chunk boundaries
//! (`TCR`/`TC`) and DMA errors.

use crate::constants::{I2C_MAX_ADDRESS, I2C_MAX_CHUNK};
use crate::dma::{DmaEvents, DmaRouter, ItemWidth, TransferDescriptor};
use crate::error::{ConfigResult, I2cError, I2cResult};
use crate::hal::{ClockGate, InterruptController};
use crate::i2c::I2cConfig;
use crate::register::i2c::{
    CR1_ANFOFF, CR1_DNF_MASK, CR1_DNF_SHIFT, CR1_ENGINE_IRQS, CR1_ERRIE, CR1_NACKIE, CR1_PE,
    CR1_RXDMAEN, CR1_RXIE, CR1_STOPIE, CR1_TCIE, CR1_TXDMAEN, CR1_TXIE, CR2_AUTOEND,
    CR2_CHUNK_FIELDS, CR2_NBYTES_SHIFT, CR2_RD_WRN, CR2_RELOAD, CR2_START, CR2_STOP, ICR_ALL,
    ISR_ARLO, ISR_BERR, ISR_ERROR_MASK, ISR_ERRORS, ISR_NACKF, ISR_OVR, ISR_RXNE, ISR_STOPF,
    ISR_TC, ISR_TCR, ISR_TIMEOUT, ISR_TXIS, OAR1_EN,
};
use crate::register::{DmaRegisters, I2cRegisters};

#[cfg(feature = "log")]
use log::{debug, warn};

/// Transaction phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cPhase {
    /// Never started
    #[default]
    Idle,
    /// Sending the write buffer
    Write,
    /// Turning the bus around with a repeated START
    RestartForRead,
    /// Filling the read buffer
    Read,
    /// Finished successfully
    Done,
    /// Finished with an error
    Error,
}

impl I2cPhase {
    /// Whether a transaction is in flight
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(
            self,
            I2cPhase::Write | I2cPhase::RestartForRead | I2cPhase::Read
        )
    }
}

/// Which directions move through DMA
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DmaSelect {
    /// Write phase uses the TX channel
    pub tx: bool,
    /// Read phase uses the RX channel
    pub rx: bool,
}

impl DmaSelect {
    /// Interrupt-driven in both directions
    pub const NONE: Self = Self { tx: false, rx: false };
    /// DMA for the write phase only
    pub const TX: Self = Self { tx: true, rx: false };
    /// DMA for the read phase only
    pub const RX: Self = Self { tx: false, rx: true };
    /// DMA in both directions
    pub const BOTH: Self = Self { tx: true, rx: true };
}

/// Two-wire master transaction engine
///
/// One transaction at a time. Feed it the peripheral interrupt through
/// [`on_interrupt`](Self::on_interrupt) and, when DMA is used, the channel
/// events through [`on_dma_event`](Self::on_dma_event); both are normally
/// wired by [`SharedI2c`](crate::sync::SharedI2c).
pub struct I2cEngine<'a, R: I2cRegisters, D: DmaRegisters> {
    regs: R,
    router: &'a DmaRouter<'a, D>,
    config: I2cConfig,
    address: u8,
    write: &'a [u8],
    write_pos: usize,
    read: Option<&'a mut [u8]>,
    read_pos: usize,
    /// Bytes of the current chunk not yet moved
    chunk_left: usize,
    phase: I2cPhase,
    dma: DmaSelect,
    outcome: Option<I2cResult<()>>,
    on_complete: Option<&'a dyn Fn(I2cResult<()>)>,
}

impl<'a, R: I2cRegisters, D: DmaRegisters> I2cEngine<'a, R, D> {
    /// Create an idle engine
    pub const fn new(regs: R, router: &'a DmaRouter<'a, D>, config: I2cConfig) -> Self {
        Self {
            regs,
            router,
            config,
            address: 0,
            write: &[],
            write_pos: 0,
            read: None,
            read_pos: 0,
            chunk_left: 0,
            phase: I2cPhase::Idle,
            dma: DmaSelect::NONE,
            outcome: None,
            on_complete: None,
        }
    }

    /// Clock the block, program filters/own address/timing and enable it
    pub fn init<C, I>(&mut self, clocks: &mut C, irqs: &mut I) -> ConfigResult<()>
    where
        C: ClockGate,
        I: InterruptController,
    {
        self.config.validate()?;
        let instance = self.regs.instance();
        clocks.enable(instance.peripheral());

        self.regs.modify_cr1(|v| v & !CR1_PE);
        let mut cr1 = self.regs.cr1() & !(CR1_ANFOFF | CR1_DNF_MASK);
        if !self.config.analog_filter {
            cr1 |= CR1_ANFOFF;
        }
        cr1 |= u32::from(self.config.digital_filter & 0xF) << CR1_DNF_SHIFT;
        self.regs.write_cr1(cr1);

        self.regs.write_oar1(
            self.config
                .own_address
                .map_or(0, |addr| OAR1_EN | (u32::from(addr) << 1)),
        );
        self.regs.write_timingr(self.config.timing);
        self.regs.write_icr(ICR_ALL);

        irqs.enable(instance.interrupt(), self.config.irq_priority);
        self.regs.modify_cr1(|v| v | CR1_PE);
        self.phase = I2cPhase::Idle;
        Ok(())
    }

    /// Register the completion callback
    ///
    /// Runs from interrupt context with the transaction outcome.
    pub fn set_callback(&mut self, callback: &'a dyn Fn(I2cResult<()>)) {
        self.on_complete = Some(callback);
    }

    /// Engine configuration
    pub fn config(&self) -> &I2cConfig {
        &self.config
    }

    /// Router the engine arms channels on
    pub fn router(&self) -> &'a DmaRouter<'a, D> {
        self.router
    }

    /// Current phase
    pub fn phase(&self) -> I2cPhase {
        self.phase
    }

    /// Whether a transaction is in flight
    pub fn is_busy(&self) -> bool {
        self.phase.is_active()
    }

    /// Outcome of the last transaction, once it has finished
    pub fn outcome(&self) -> Option<I2cResult<()>> {
        self.outcome
    }

    /// Bytes of the write buffer sent so far
    pub fn bytes_written(&self) -> usize {
        self.write_pos
    }

    /// Bytes of the read buffer filled so far
    pub fn bytes_read(&self) -> usize {
        self.read_pos
    }

    /// Read buffer of the current/last transaction
    pub fn received(&self) -> &[u8] {
        self.read.as_deref().unwrap_or(&[])
    }

    /// Start a transaction
    ///
    /// Writes `write` (if not empty), then reads into `read` (if not empty)
    /// after a repeated START. Fails with [`I2cError::Param`] if a
    /// transaction is in flight, both buffers are empty, `address` exceeds 7
    /// bits, or a requested DMA direction has no attached channel; nothing is
    /// touched in that case.
    pub fn start(
        &mut self,
        address: u8,
        write: &'a [u8],
        read: &'a mut [u8],
        dma: DmaSelect,
    ) -> I2cResult<()> {
        if self.is_busy()
            || address > I2C_MAX_ADDRESS
            || (write.is_empty() && read.is_empty())
        {
            return Err(I2cError::Param);
        }
        if (dma.tx && !self.channel_ready(self.config.dma.map(|c| c.tx)))
            || (dma.rx && !self.channel_ready(self.config.dma.map(|c| c.rx)))
        {
            return Err(I2cError::Param);
        }

        self.regs.write_icr(ICR_ALL);
        self.address = address;
        self.write = write;
        self.write_pos = 0;
        self.read = if read.is_empty() { None } else { Some(read) };
        self.read_pos = 0;
        self.dma = dma;
        self.outcome = None;
        self.phase = if self.write.is_empty() {
            I2cPhase::Read
        } else {
            I2cPhase::Write
        };

        let mut irqs = CR1_TCIE | CR1_STOPIE | CR1_NACKIE | CR1_ERRIE;
        if !dma.tx {
            irqs |= CR1_TXIE;
        }
        if !dma.rx {
            irqs |= CR1_RXIE;
        }
        self.regs
            .modify_cr1(|v| (v & !(CR1_ENGINE_IRQS | CR1_TXDMAEN | CR1_RXDMAEN)) | irqs);

        #[cfg(feature = "log")]
        debug!(
            "i2c start addr=0x{address:02x} w={} r={}",
            self.write.len(),
            self.read_len()
        );

        if let Err(e) = self.program_chunk(true) {
            self.finish(Err(e));
            return Err(e);
        }
        Ok(())
    }

    /// Write `data` to `address`
    pub fn write(&mut self, address: u8, data: &'a [u8], dma: DmaSelect) -> I2cResult<()> {
        self.start(address, data, &mut [], dma)
    }

    /// Read `buffer.len()` bytes from `address`
    pub fn read(&mut self, address: u8, buffer: &'a mut [u8], dma: DmaSelect) -> I2cResult<()> {
        self.start(address, &[], buffer, dma)
    }

    /// Write `data`, then read into `buffer` after a repeated START
    pub fn write_read(
        &mut self,
        address: u8,
        data: &'a [u8],
        buffer: &'a mut [u8],
        dma: DmaSelect,
    ) -> I2cResult<()> {
        self.start(address, data, buffer, dma)
    }

    /// Peripheral interrupt entry
    pub fn on_interrupt(&mut self) {
        let isr = self.regs.isr();

        if !self.is_busy() {
            // STOPF from a forced STOP, or flags left over from the last run
            let stray = isr & (ISR_STOPF | ISR_ERROR_MASK);
            if stray != 0 {
                self.regs.write_icr(stray);
            }
            return;
        }

        if let Some(error) = Self::error_from(isr) {
            self.regs.write_icr(isr & ISR_ERROR_MASK);
            self.regs.modify_cr2(|v| v | CR2_STOP);
            if isr & ISR_STOPF != 0 {
                self.regs.write_icr(ISR_STOPF);
            }
            self.finish(Err(error));
            return;
        }

        if isr & ISR_TXIS != 0 && self.phase == I2cPhase::Write && !self.dma.tx {
            self.send_byte();
        }

        if isr & ISR_RXNE != 0 && self.phase == I2cPhase::Read && !self.dma.rx {
            self.receive_byte();
        }

        if isr & ISR_TCR != 0 {
            self.account_dma_chunk();
            if let Err(e) = self.program_chunk(false) {
                self.finish(Err(e));
                return;
            }
        }

        if isr & ISR_TC != 0 {
            self.account_dma_chunk();
            if self.phase == I2cPhase::Write && self.read_len() > 0 {
                self.phase = I2cPhase::RestartForRead;
                #[cfg(feature = "log")]
                debug!("i2c restart for read");
                if let Err(e) = self.program_chunk(true) {
                    self.finish(Err(e));
                    return;
                }
                self.phase = I2cPhase::Read;
            } else {
                self.regs.modify_cr2(|v| v | CR2_STOP);
            }
        }

        if isr & ISR_STOPF != 0 {
            self.regs.write_icr(ISR_STOPF);
            self.account_dma_chunk();
            self.finish(Ok(()));
        }
    }

    /// DMA channel event entry
    ///
    /// Only errors matter: chunk progress is tracked from `TCR`/`TC`.
    pub fn on_dma_event(&mut self, channel: u8, events: DmaEvents) {
        if !self.is_busy() || !events.contains(DmaEvents::ERROR) {
            return;
        }
        let Some(channels) = self.config.dma else {
            return;
        };
        let ours = (self.dma.tx && channel == channels.tx) || (self.dma.rx && channel == channels.rx);
        if ours {
            self.regs.modify_cr2(|v| v | CR2_STOP);
            self.finish(Err(I2cError::Dma));
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn channel_ready(&self, channel: Option<u8>) -> bool {
        channel.is_some_and(|ch| self.router.is_attached(ch))
    }

    fn read_len(&self) -> usize {
        self.read.as_ref().map_or(0, |r| r.len())
    }

    fn reading(&self) -> bool {
        matches!(self.phase, I2cPhase::Read | I2cPhase::RestartForRead)
    }

    fn error_from(isr: u32) -> Option<I2cError> {
        let flag = ISR_ERRORS.into_iter().find(|flag| isr & flag != 0)?;
        Some(match flag {
            ISR_NACKF => I2cError::Nack,
            ISR_BERR => I2cError::Bus,
            ISR_ARLO => I2cError::ArbitrationLost,
            ISR_OVR => I2cError::Overrun,
            ISR_TIMEOUT => I2cError::Timeout,
            _ => I2cError::Bus,
        })
    }

    fn send_byte(&mut self) {
        if self.chunk_left == 0 {
            return;
        }
        if let Some(&byte) = self.write.get(self.write_pos) {
            self.regs.write_txdr(byte);
            self.write_pos += 1;
            self.chunk_left -= 1;
        }
    }

    fn receive_byte(&mut self) {
        if self.chunk_left == 0 {
            return;
        }
        let byte = self.regs.read_rxdr();
        if let Some(slot) = self
            .read
            .as_deref_mut()
            .and_then(|buf| buf.get_mut(self.read_pos))
        {
            *slot = byte;
            self.read_pos += 1;
            self.chunk_left -= 1;
        }
    }

    /// A DMA-moved chunk is complete once the peripheral reports its end
    fn account_dma_chunk(&mut self) {
        match self.phase {
            I2cPhase::Write if self.dma.tx => self.write_pos += self.chunk_left,
            I2cPhase::Read if self.dma.rx => self.read_pos += self.chunk_left,
            _ => return,
        }
        self.chunk_left = 0;
    }

    /// Program the next chunk of the current phase
    ///
    /// `start` issues a (repeated) START; without it the chunk continues a
    /// reload.
    fn program_chunk(&mut self, start: bool) -> I2cResult<()> {
        let reading = self.reading();
        let remaining = if reading {
            self.read_len() - self.read_pos
        } else {
            self.write.len() - self.write_pos
        };
        let chunk = remaining.min(I2C_MAX_CHUNK);
        let reload = remaining > chunk;
        let autoend = !reload && (reading || self.read_len() == 0);

        // Arm DMA before the peripheral starts requesting data
        if reading && self.dma.rx {
            self.arm_rx(chunk)?;
        } else if !reading && self.dma.tx {
            self.arm_tx(chunk)?;
        }
        self.chunk_left = chunk;

        let mut cr2 = self.regs.cr2() & !(CR2_CHUNK_FIELDS | CR2_START | CR2_STOP);
        cr2 |= (u32::from(self.address) << 1) | ((chunk as u32) << CR2_NBYTES_SHIFT);
        if reading {
            cr2 |= CR2_RD_WRN;
        }
        if reload {
            cr2 |= CR2_RELOAD;
        }
        if autoend {
            cr2 |= CR2_AUTOEND;
        }
        if start {
            cr2 |= CR2_START;
        }
        self.regs.write_cr2(cr2);
        Ok(())
    }

    fn descriptor(&self, base: TransferDescriptor) -> TransferDescriptor {
        base.with_width(ItemWidth::Byte)
            .with_priority(self.config.dma_priority)
            .with_interrupts(DmaEvents::ERROR)
    }

    fn arm_tx(&mut self, chunk: usize) -> I2cResult<()> {
        let channel = self.config.dma.ok_or(I2cError::Dma)?.tx;
        let src = self.write[self.write_pos..].as_ptr() as usize;
        let desc = self.descriptor(TransferDescriptor::memory_to_peripheral());
        self.router
            .start(channel, src, self.regs.txdr_addr(), chunk as u16, &desc)
            .map_err(|_| I2cError::Dma)?;
        self.regs.modify_cr1(|v| v | CR1_TXDMAEN);
        Ok(())
    }

    fn arm_rx(&mut self, chunk: usize) -> I2cResult<()> {
        let channel = self.config.dma.ok_or(I2cError::Dma)?.rx;
        let pos = self.read_pos;
        let dst = self
            .read
            .as_deref_mut()
            .map(|buf| buf[pos..].as_mut_ptr() as usize)
            .ok_or(I2cError::Dma)?;
        let desc = self.descriptor(TransferDescriptor::peripheral_to_memory());
        self.router
            .start(channel, self.regs.rxdr_addr(), dst, chunk as u16, &desc)
            .map_err(|_| I2cError::Dma)?;
        self.regs.modify_cr1(|v| v | CR1_RXDMAEN);
        Ok(())
    }

    fn finish(&mut self, outcome: I2cResult<()>) {
        self.regs
            .modify_cr1(|v| v & !(CR1_ENGINE_IRQS | CR1_TXDMAEN | CR1_RXDMAEN));
        if let Some(channels) = self.config.dma {
            if self.dma.tx {
                let _ = self.router.stop(channels.tx);
            }
            if self.dma.rx {
                let _ = self.router.stop(channels.rx);
            }
        }

        self.phase = if outcome.is_ok() {
            I2cPhase::Done
        } else {
            I2cPhase::Error
        };
        self.outcome = Some(outcome);

        #[cfg(feature = "log")]
        if let Err(e) = outcome {
            warn!("i2c transaction to 0x{:02x} failed: {}", self.address, e.as_str());
        }

        if let Some(callback) = self.on_complete {
            callback(outcome);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
