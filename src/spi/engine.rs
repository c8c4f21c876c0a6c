//! Synchronous-bus transaction engine
//!
//! Full-duplex master transfers of `count` items. Without DMA both data
//! interrupts are enabled and the handler moves one item each way per
//! interrupt. With DMA both directions get a channel, because the bus
//! clocks both together: a missing transmit buffer is replaced by a dummy
//! source and a missing receive buffer by a throwaway sink.
//!
//! A write-then-read transaction holds chip-select across two phases and
//! reports a single completion.

use core::sync::atomic::AtomicU16;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::constants::{BUSY_SPIN_LIMIT, DMA_MAX_ITEMS, SPI_DUMMY_WORD};
use crate::dma::{DmaEvents, DmaRouter, ItemWidth, TransferDescriptor};
use crate::error::{RequestError, RequestResult, SpiError};
use crate::hal::{ClockGate, InterruptController};
use crate::register::spi::{
    CR1_SPE, CR2_DMA_MASK, CR2_ERRIE, CR2_IRQ_MASK, CR2_RXDMAEN, CR2_RXNEIE, CR2_TXDMAEN,
    CR2_TXEIE, SR_BSY, SR_CRCERR, SR_ERROR_MASK, SR_MODF, SR_OVR, SR_RXNE, SR_TXE,
};
use crate::register::{DmaRegisters, SpiRegisters};
use crate::spi::{DataSize, NssMode, SpiConfig};

#[cfg(feature = "log")]
use log::{debug, warn};

/// DMA source when no transmit buffer is supplied
static DUMMY_TX: u16 = SPI_DUMMY_WORD;

/// DMA sink when no receive buffer is supplied; contents are never read
static DISCARD_RX: AtomicU16 = AtomicU16::new(0);

/// Chip-select placeholder for hardware NSS
#[derive(Debug, Clone, Copy, Default)]
pub struct NoChipSelect;

impl ErrorType for NoChipSelect {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoChipSelect {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Phase of the current transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiPhase {
    /// Single transfer, or the command phase of a write-then-read
    #[default]
    First,
    /// Response phase of a write-then-read
    Second,
}

/// Synchronous-bus master transaction engine
pub struct SpiEngine<'a, R: SpiRegisters, D: DmaRegisters, CS: OutputPin = NoChipSelect> {
    regs: R,
    router: &'a DmaRouter<'a, D>,
    config: SpiConfig,
    cs: CS,
    cs_asserted: bool,

    tx: Option<&'a [u8]>,
    rx: Option<&'a mut [u8]>,
    count: usize,
    tx_pos: usize,
    rx_pos: usize,
    busy: bool,

    phase: SpiPhase,
    multi_phase: bool,
    /// Response phase of a write-then-read: buffer and item count
    response: Option<(&'a mut [u8], usize)>,

    tx_active: bool,
    rx_active: bool,
    tx_done: bool,
    rx_done: bool,

    on_complete: Option<&'a dyn Fn()>,
    on_error: Option<&'a dyn Fn(SpiError, u32)>,
}

impl<'a, R: SpiRegisters, D: DmaRegisters, CS: OutputPin> SpiEngine<'a, R, D, CS> {
    /// Create an idle engine
    ///
    /// `cs` is driven low while a transaction runs in software NSS mode;
    /// pass [`NoChipSelect`] for hardware NSS.
    pub const fn new(regs: R, router: &'a DmaRouter<'a, D>, config: SpiConfig, cs: CS) -> Self {
        Self {
            regs,
            router,
            config,
            cs,
            cs_asserted: false,
            tx: None,
            rx: None,
            count: 0,
            tx_pos: 0,
            rx_pos: 0,
            busy: false,
            phase: SpiPhase::First,
            multi_phase: false,
            response: None,
            tx_active: false,
            rx_active: false,
            tx_done: false,
            rx_done: false,
            on_complete: None,
            on_error: None,
        }
    }

    /// Clock the block, program the frame format and enable it
    pub fn init<C, I>(&mut self, clocks: &mut C, irqs: &mut I)
    where
        C: ClockGate,
        I: InterruptController,
    {
        let instance = self.regs.instance();
        clocks.enable(instance.peripheral());
        self.regs.write_cr1(self.config.cr1());
        self.regs.write_cr2(self.config.cr2());
        self.release_cs();
        irqs.enable(instance.interrupt(), self.config.irq_priority);
        self.regs.write_cr1(self.config.cr1() | CR1_SPE);
    }

    /// Register the completion callback
    pub fn set_complete_callback(&mut self, callback: &'a dyn Fn()) {
        self.on_complete = Some(callback);
    }

    /// Register the error callback, called with the error and raw status
    pub fn set_error_callback(&mut self, callback: &'a dyn Fn(SpiError, u32)) {
        self.on_error = Some(callback);
    }

    /// Engine configuration
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    /// Router the engine arms channels on
    pub fn router(&self) -> &'a DmaRouter<'a, D> {
        self.router
    }

    /// Whether a transaction is in flight
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Current phase
    pub fn phase(&self) -> SpiPhase {
        self.phase
    }

    /// Items sent in the current phase
    pub fn items_sent(&self) -> usize {
        self.tx_pos
    }

    /// Items received in the current phase
    pub fn items_received(&self) -> usize {
        self.rx_pos
    }

    /// Start a transfer of `count` items
    ///
    /// Without `tx` a dummy pattern is clocked out; without `rx` received
    /// items are discarded. Buffers hold `count` items (two bytes each,
    /// little-endian, for 16-bit frames).
    pub fn start(
        &mut self,
        tx: Option<&'a [u8]>,
        rx: Option<&'a mut [u8]>,
        count: usize,
    ) -> RequestResult<()> {
        self.check_request(tx.map(<[u8]>::len), rx.as_ref().map(|r| r.len()), count)?;
        self.multi_phase = false;
        self.response = None;
        self.begin(tx, rx, count)
    }

    /// Exchange `tx` for as many received items
    pub fn transfer(&mut self, tx: &'a [u8], rx: &'a mut [u8]) -> RequestResult<()> {
        let count = tx.len() / self.config.data_size.bytes();
        self.start(Some(tx), Some(rx), count)
    }

    /// Send `tx`, discarding what comes back
    pub fn write(&mut self, tx: &'a [u8]) -> RequestResult<()> {
        let count = tx.len() / self.config.data_size.bytes();
        self.start(Some(tx), None, count)
    }

    /// Fill `rx` while clocking out the dummy pattern
    pub fn read(&mut self, rx: &'a mut [u8]) -> RequestResult<()> {
        let count = rx.len() / self.config.data_size.bytes();
        self.start(None, Some(rx), count)
    }

    /// Send `n1` items of `tx`, then read `n2` items into `rx` under one
    /// chip-select assertion
    ///
    /// Requires software NSS: hardware NSS would pulse between the phases.
    pub fn start_write_then_read(
        &mut self,
        tx: &'a [u8],
        n1: usize,
        rx: &'a mut [u8],
        n2: usize,
    ) -> RequestResult<()> {
        if self.config.nss != NssMode::Software {
            return Err(RequestError::HardwareChipSelect);
        }
        self.check_request(Some(tx.len()), None, n1)?;
        self.check_request(None, Some(rx.len()), n2)?;
        self.multi_phase = true;
        self.response = Some((rx, n2));
        self.begin(Some(tx), None, n1)
    }

    /// Cancel the transaction in flight without a callback
    ///
    /// No-op when idle.
    pub fn abort(&mut self) {
        if !self.busy {
            return;
        }
        self.regs
            .modify_cr2(|v| v & !(CR2_IRQ_MASK | CR2_ERRIE | CR2_DMA_MASK));
        self.stop_channels();
        self.regs.drain();
        self.wait_not_busy();
        self.release_cs();
        self.reset();
        #[cfg(feature = "log")]
        debug!("spi transfer aborted");
    }

    /// Peripheral interrupt entry
    pub fn on_interrupt(&mut self) {
        let mut sr = self.regs.sr();

        if sr & SR_ERROR_MASK != 0 {
            self.regs.clear_errors(sr);
            if self.busy
                && let Some(error) = Self::error_from(sr)
            {
                self.report(error, sr);
            }
            sr = self.regs.sr();
        }

        if !self.busy || self.config.uses_dma() {
            return;
        }

        if sr & SR_RXNE != 0 && self.rx_pos < self.count {
            self.receive_item();
        }

        if sr & SR_TXE != 0 && self.regs.cr2() & CR2_TXEIE != 0 && self.tx_pos < self.count {
            self.send_item();
            if self.tx_pos == self.count {
                self.regs.modify_cr2(|v| v & !CR2_TXEIE);
            }
        }

        if self.tx_pos >= self.count && self.rx_pos >= self.count {
            self.regs.modify_cr2(|v| v & !(CR2_IRQ_MASK | CR2_ERRIE));
            self.finish();
        }
    }

    /// DMA channel event entry
    pub fn on_dma_event(&mut self, channel: u8, events: DmaEvents) {
        if !self.busy || !self.config.uses_dma() {
            return;
        }
        let Some(channels) = self.config.dma else {
            return;
        };

        let is_tx = channel == channels.tx;
        if !is_tx && channel != channels.rx {
            return;
        }

        if events.contains(DmaEvents::ERROR) {
            self.report(SpiError::Dma, 0);
            if is_tx {
                self.tx_active = false;
            } else {
                self.rx_active = false;
            }
        } else if events.contains(DmaEvents::COMPLETE) {
            if is_tx {
                self.tx_done = true;
            } else {
                self.rx_done = true;
            }
        }

        if (!self.tx_active || self.tx_done) && (!self.rx_active || self.rx_done) {
            self.finish();
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn check_request(
        &self,
        tx_len: Option<usize>,
        rx_len: Option<usize>,
        count: usize,
    ) -> RequestResult<()> {
        if self.busy {
            return Err(RequestError::Busy);
        }
        let Some(needed) = count.checked_mul(self.config.data_size.bytes()) else {
            return Err(RequestError::InvalidLength);
        };
        let short = |len: Option<usize>| len.is_some_and(|len| len < needed);
        if count == 0 || short(tx_len) || short(rx_len) {
            return Err(RequestError::InvalidLength);
        }
        if self.config.uses_dma() {
            if count > DMA_MAX_ITEMS {
                return Err(RequestError::InvalidLength);
            }
            let attached = self
                .config
                .dma
                .is_some_and(|c| self.router.is_attached(c.tx) && self.router.is_attached(c.rx));
            if !attached {
                return Err(RequestError::DmaUnavailable);
            }
        }
        Ok(())
    }

    fn begin(
        &mut self,
        tx: Option<&'a [u8]>,
        rx: Option<&'a mut [u8]>,
        count: usize,
    ) -> RequestResult<()> {
        self.busy = true;
        self.phase = SpiPhase::First;
        self.assert_cs();
        if let Err(e) = self.start_phase(tx, rx, count) {
            self.release_cs();
            self.reset();
            return Err(e);
        }
        Ok(())
    }

    fn start_phase(
        &mut self,
        tx: Option<&'a [u8]>,
        rx: Option<&'a mut [u8]>,
        count: usize,
    ) -> RequestResult<()> {
        self.tx = tx;
        self.rx = rx;
        self.count = count;
        self.tx_pos = 0;
        self.rx_pos = 0;
        self.tx_done = false;
        self.rx_done = false;
        self.regs.drain();

        #[cfg(feature = "log")]
        debug!("spi {:?} phase: {count} items", self.phase);

        if self.config.uses_dma() {
            self.arm_dma()
        } else {
            self.tx_active = false;
            self.rx_active = false;
            self.regs
                .modify_cr2(|v| v | CR2_RXNEIE | CR2_TXEIE | CR2_ERRIE);
            Ok(())
        }
    }

    fn arm_dma(&mut self) -> RequestResult<()> {
        let channels = self.config.dma.ok_or(RequestError::DmaUnavailable)?;
        let width = match self.config.data_size {
            DataSize::Eight => ItemWidth::Byte,
            DataSize::Sixteen => ItemWidth::HalfWord,
        };
        let shape = |desc: TransferDescriptor| {
            desc.with_width(width)
                .with_priority(self.config.dma_priority)
                .with_interrupts(DmaEvents::COMPLETE | DmaEvents::ERROR)
        };
        let count = self.count as u16;
        let dr = self.regs.dr_addr();

        let (dst, rx_increment) = match self.rx.as_deref_mut() {
            Some(buf) => (buf.as_mut_ptr() as usize, true),
            None => (DISCARD_RX.as_ptr() as usize, false),
        };
        let (src, tx_increment) = match self.tx {
            Some(buf) => (buf.as_ptr() as usize, true),
            None => (core::ptr::addr_of!(DUMMY_TX) as usize, false),
        };

        // Receive side first so no item clocked in is missed
        self.regs.modify_cr2(|v| v | CR2_RXDMAEN | CR2_ERRIE);
        self.router
            .start(
                channels.rx,
                dr,
                dst,
                count,
                &shape(TransferDescriptor::peripheral_to_memory())
                    .with_memory_increment(rx_increment),
            )
            .map_err(|_| RequestError::DmaUnavailable)?;
        self.router
            .start(
                channels.tx,
                src,
                dr,
                count,
                &shape(TransferDescriptor::memory_to_peripheral())
                    .with_memory_increment(tx_increment),
            )
            .map_err(|_| RequestError::DmaUnavailable)?;
        self.rx_active = true;
        self.tx_active = true;
        self.regs.modify_cr2(|v| v | CR2_TXDMAEN);
        Ok(())
    }

    fn send_item(&mut self) {
        let index = self.tx_pos;
        match self.config.data_size {
            DataSize::Eight => {
                let byte = self
                    .tx
                    .and_then(|buf| buf.get(index).copied())
                    .unwrap_or(SPI_DUMMY_WORD as u8);
                self.regs.write_dr8(byte);
            }
            DataSize::Sixteen => {
                let word = self
                    .tx
                    .and_then(|buf| buf.get(2 * index..2 * index + 2))
                    .map_or(SPI_DUMMY_WORD, |b| u16::from_le_bytes([b[0], b[1]]));
                self.regs.write_dr16(word);
            }
        }
        self.tx_pos += 1;
    }

    fn receive_item(&mut self) {
        let index = self.rx_pos;
        match self.config.data_size {
            DataSize::Eight => {
                let byte = self.regs.read_dr8();
                if let Some(slot) = self.rx.as_deref_mut().and_then(|buf| buf.get_mut(index)) {
                    *slot = byte;
                }
            }
            DataSize::Sixteen => {
                let word = self.regs.read_dr16();
                if let Some(slot) = self
                    .rx
                    .as_deref_mut()
                    .and_then(|buf| buf.get_mut(2 * index..2 * index + 2))
                {
                    slot.copy_from_slice(&word.to_le_bytes());
                }
            }
        }
        self.rx_pos += 1;
    }

    fn error_from(sr: u32) -> Option<SpiError> {
        if sr & SR_MODF != 0 {
            Some(SpiError::ModeFault)
        } else if sr & SR_OVR != 0 {
            Some(SpiError::Overrun)
        } else if sr & SR_CRCERR != 0 {
            Some(SpiError::Crc)
        } else {
            None
        }
    }

    fn report(&self, error: SpiError, sr: u32) {
        #[cfg(feature = "log")]
        warn!("spi error: {} (sr=0x{sr:04x})", error.as_str());
        if let Some(callback) = self.on_error {
            callback(error, sr);
        }
    }

    fn finish(&mut self) {
        self.wait_not_busy();
        self.regs.modify_cr2(|v| v & !(CR2_DMA_MASK | CR2_ERRIE));
        self.stop_channels();

        if self.multi_phase
            && self.phase == SpiPhase::First
            && let Some((rx, count)) = self.response.take()
        {
            self.phase = SpiPhase::Second;
            if self.start_phase(None, Some(rx), count).is_ok() {
                return;
            }
            self.report(SpiError::Dma, 0);
        }

        self.release_cs();
        self.reset();
        if let Some(callback) = self.on_complete {
            callback();
        }
    }

    fn stop_channels(&mut self) {
        if let Some(channels) = self.config.dma
            && self.config.uses_dma()
        {
            let _ = self.router.stop(channels.tx);
            let _ = self.router.stop(channels.rx);
        }
        self.tx_active = false;
        self.rx_active = false;
    }

    fn wait_not_busy(&self) {
        for _ in 0..BUSY_SPIN_LIMIT {
            if self.regs.sr() & SR_BSY == 0 {
                return;
            }
            core::hint::spin_loop();
        }
        #[cfg(feature = "log")]
        warn!("spi busy flag stuck");
    }

    fn assert_cs(&mut self) {
        if self.config.nss == NssMode::Software && !self.cs_asserted {
            let _ = self.cs.set_low();
            self.cs_asserted = true;
        }
    }

    fn release_cs(&mut self) {
        if self.config.nss == NssMode::Software && self.cs_asserted {
            let _ = self.cs.set_high();
            self.cs_asserted = false;
        }
    }

    fn reset(&mut self) {
        self.busy = false;
        self.phase = SpiPhase::First;
        self.multi_phase = false;
        self.response = None;
        self.tx = None;
        self.count = 0;
        self.tx_done = false;
        self.rx_done = false;
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::dma::{DmaChannels, XferEngine};
    use crate::register::dma::CCR_MINC;
    use crate::register::spi::SpiInstance;
    use crate::testing::{MockDma, MockPin, MockSpi};
    use core::cell::Cell;
    use std::vec;

    fn run<R: SpiRegisters, D: DmaRegisters, CS: OutputPin>(
        engine: &mut SpiEngine<'_, R, D, CS>,
        max: usize,
    ) {
        for _ in 0..max {
            if !engine.is_busy() {
                return;
            }
            engine.on_interrupt();
        }
    }

    #[test]
    fn irq_transfer_frames_chip_select_once() {
        let done = Cell::new(0u32);
        let on_done = || done.set(done.get() + 1);
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        spi.script_miso(&[0x11, 0x22, 0x33]);
        let pin = MockPin::new();
        let tx = [0xA0u8, 0xB0, 0xC0];
        let mut rx = [0u8; 3];

        let mut engine = SpiEngine::new(&spi, &router, SpiConfig::new(), &pin);
        engine.set_complete_callback(&on_done);
        engine.transfer(&tx, &mut rx).unwrap();
        assert_eq!(pin.levels(), vec![false]);
        assert_eq!(spi.cr2() & (CR2_RXNEIE | CR2_TXEIE), CR2_RXNEIE | CR2_TXEIE);

        run(&mut engine, 10);

        assert!(!engine.is_busy());
        assert_eq!(done.get(), 1);
        assert_eq!(spi.mosi(), vec![0xA0, 0xB0, 0xC0]);
        assert_eq!(pin.levels(), vec![false, true]);
        assert_eq!(spi.cr2() & (CR2_RXNEIE | CR2_TXEIE), 0);
        assert_eq!(engine.items_sent(), 3);
        assert_eq!(engine.items_received(), 3);
        assert_eq!(rx, [0x11, 0x22, 0x33]);
    }

    #[test]
    fn read_without_tx_buffer_clocks_dummy_bytes() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi2);
        spi.script_miso(&[5, 6]);
        let mut rx = [0u8; 2];

        let mut engine = SpiEngine::new(&spi, &router, SpiConfig::new(), NoChipSelect);
        engine.read(&mut rx).unwrap();
        run(&mut engine, 10);

        assert_eq!(spi.mosi(), vec![0xFF, 0xFF]);
        assert_eq!(rx, [5, 6]);
    }

    #[test]
    fn sixteen_bit_items_pack_little_endian() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        spi.script_miso(&[0xBEEF]);
        let tx = 0x1234u16.to_le_bytes();
        let mut rx = [0u8; 2];

        let config = SpiConfig::new().with_data_size(DataSize::Sixteen);
        let mut engine = SpiEngine::new(&spi, &router, config, NoChipSelect);
        engine.transfer(&tx, &mut rx).unwrap();
        run(&mut engine, 10);

        assert_eq!(spi.mosi(), vec![0x1234]);
        assert_eq!(u16::from_le_bytes(rx), 0xBEEF);
    }

    #[test]
    fn write_then_read_holds_chip_select_across_phases() {
        let done = Cell::new(0u32);
        let on_done = || done.set(done.get() + 1);
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        spi.script_miso(&[0x00, 0x00, 0xC1, 0xC2]);
        let pin = MockPin::new();
        let command = [0x9F, 0x01];
        let mut response = [0u8; 2];

        let mut engine = SpiEngine::new(&spi, &router, SpiConfig::new(), &pin);
        engine.set_complete_callback(&on_done);
        engine
            .start_write_then_read(&command, 2, &mut response, 2)
            .unwrap();

        run(&mut engine, 3);
        assert_eq!(engine.phase(), SpiPhase::Second);
        assert_eq!(done.get(), 0);

        run(&mut engine, 10);
        assert_eq!(done.get(), 1);
        assert_eq!(pin.levels(), vec![false, true]);
        assert_eq!(spi.mosi(), vec![0x9F, 0x01, 0xFF, 0xFF]);
        assert_eq!(response, [0xC1, 0xC2]);
    }

    #[test]
    fn write_then_read_refuses_hardware_nss() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        let command = [1u8];
        let mut response = [0u8; 1];
        let config = SpiConfig::new().with_nss(NssMode::Hardware { pulse: false });

        let mut engine = SpiEngine::new(&spi, &router, config, NoChipSelect);
        assert_eq!(
            engine.start_write_then_read(&command, 1, &mut response, 1),
            Err(RequestError::HardwareChipSelect)
        );
        assert!(!engine.is_busy());
        assert_eq!(spi.cr2(), 0);
    }

    #[test]
    fn start_rejects_bad_requests() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        let pin = MockPin::new();
        let tx = [1u8, 2];
        let mut engine = SpiEngine::new(&spi, &router, SpiConfig::new(), &pin);

        assert_eq!(engine.start(Some(&tx), None, 0), Err(RequestError::InvalidLength));
        assert_eq!(engine.start(Some(&tx), None, 3), Err(RequestError::InvalidLength));
        engine.write(&tx).unwrap();
        assert_eq!(engine.write(&tx), Err(RequestError::Busy));
        assert_eq!(pin.levels(), vec![false]);
    }

    #[test]
    fn oversized_item_count_is_rejected() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        let tx = [1u8, 2];
        let config = SpiConfig::new().with_data_size(DataSize::Sixteen);
        let mut engine = SpiEngine::new(&spi, &router, config, NoChipSelect);

        assert_eq!(
            engine.start(Some(&tx), None, usize::MAX),
            Err(RequestError::InvalidLength)
        );
        assert!(!engine.is_busy());
        assert_eq!(spi.cr2(), 0);
    }

    #[test]
    fn dma_requires_attached_channels() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        let tx = [1u8];
        let config = SpiConfig::new()
            .with_engines(XferEngine::Dma, XferEngine::Irq)
            .with_dma_channels(DmaChannels::new(3, 2));

        let mut engine = SpiEngine::new(&spi, &router, config, NoChipSelect);
        assert_eq!(engine.write(&tx), Err(RequestError::DmaUnavailable));
        assert_eq!(dma.channel(3).starts, 0);
    }

    #[test]
    fn abort_is_silent_and_idempotent() {
        let done = Cell::new(0u32);
        let on_done = || done.set(done.get() + 1);
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        let pin = MockPin::new();
        let tx = [1u8, 2, 3];

        let mut engine = SpiEngine::new(&spi, &router, SpiConfig::new(), &pin);
        engine.set_complete_callback(&on_done);
        engine.abort();
        assert!(pin.levels().is_empty());

        engine.write(&tx).unwrap();
        engine.on_interrupt();
        engine.abort();
        engine.abort();

        assert!(!engine.is_busy());
        assert_eq!(done.get(), 0);
        assert_eq!(pin.levels(), vec![false, true]);
        assert_eq!(spi.cr2() & (CR2_IRQ_MASK | CR2_ERRIE), 0);
        assert!(engine.write(&tx).is_ok());
    }

    #[test]
    fn errors_are_reported_with_raw_status() {
        let seen = Cell::new(None);
        let on_error = |e: SpiError, sr: u32| seen.set(Some((e, sr & SR_ERROR_MASK)));
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi1);
        let tx = [1u8, 2];

        let mut engine = SpiEngine::new(&spi, &router, SpiConfig::new(), NoChipSelect);
        engine.set_error_callback(&on_error);
        engine.write(&tx).unwrap();
        spi.raise(SR_OVR | SR_CRCERR);
        engine.on_interrupt();

        assert_eq!(seen.get(), Some((SpiError::Overrun, SR_OVR | SR_CRCERR)));
        assert_eq!(spi.sr() & SR_ERROR_MASK, 0);
        assert!(engine.is_busy());
    }

    #[test]
    fn dma_start_arms_both_directions() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let client = crate::testing::RecordingClient::new();
        router.attach(2, &client).unwrap();
        router.attach(3, &client).unwrap();
        let spi = MockSpi::new(SpiInstance::Spi1);
        let tx = [1u8, 2, 3, 4];
        let config = SpiConfig::new()
            .with_engines(XferEngine::Dma, XferEngine::Irq)
            .with_dma_channels(SpiInstance::Spi1.default_dma_channels());

        let mut engine = SpiEngine::new(&spi, &router, config, NoChipSelect);
        engine.write(&tx).unwrap();

        let tx_ch = dma.channel(3);
        assert_eq!(tx_ch.cmar, tx.as_ptr() as usize);
        assert_eq!(tx_ch.cndtr, 4);
        assert_eq!(tx_ch.ccr & CCR_MINC, CCR_MINC);
        let rx_ch = dma.channel(2);
        assert_eq!(rx_ch.cndtr, 4);
        assert_eq!(rx_ch.ccr & CCR_MINC, 0);
        assert_eq!(spi.cr2() & CR2_DMA_MASK, CR2_DMA_MASK);

        engine.on_dma_event(3, DmaEvents::COMPLETE);
        assert!(engine.is_busy());
        engine.on_dma_event(2, DmaEvents::COMPLETE);
        assert!(!engine.is_busy());
        assert_eq!(spi.cr2() & CR2_DMA_MASK, 0);
        assert!(!router.is_enabled(2));
        assert!(!router.is_enabled(3));
    }

    #[test]
    fn dma_write_then_read_re_arms_both_channels() {
        let done = Cell::new(0u32);
        let on_done = || done.set(done.get() + 1);
        let client = crate::testing::RecordingClient::new();
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        router.attach(2, &client).unwrap();
        router.attach(3, &client).unwrap();
        let spi = MockSpi::new(SpiInstance::Spi1);
        let pin = MockPin::new();
        let command = [0x03u8, 0x00];
        let mut response = [0u8; 4];
        let response_addr = response.as_ptr() as usize;
        let config = SpiConfig::new()
            .with_engines(XferEngine::Dma, XferEngine::Dma)
            .with_dma_channels(SpiInstance::Spi1.default_dma_channels());

        let mut engine = SpiEngine::new(&spi, &router, config, &pin);
        engine.set_complete_callback(&on_done);
        engine
            .start_write_then_read(&command, 2, &mut response, 4)
            .unwrap();

        let tx_ch = dma.channel(3);
        assert_eq!(tx_ch.cmar, command.as_ptr() as usize);
        assert_eq!(tx_ch.cndtr, 2);
        assert_eq!(dma.channel(2).cndtr, 2);
        assert_eq!(dma.channel(2).ccr & CCR_MINC, 0);

        engine.on_dma_event(3, DmaEvents::COMPLETE);
        engine.on_dma_event(2, DmaEvents::COMPLETE);
        assert_eq!(engine.phase(), SpiPhase::Second);
        assert!(engine.is_busy());
        assert_eq!(done.get(), 0);
        assert_eq!(pin.levels(), vec![false]);

        let rx_ch = dma.channel(2);
        assert_eq!(rx_ch.cmar, response_addr);
        assert_eq!(rx_ch.cndtr, 4);
        assert_eq!(rx_ch.ccr & CCR_MINC, CCR_MINC);
        assert_eq!(rx_ch.starts, 2);
        let tx_ch = dma.channel(3);
        assert_eq!(tx_ch.cmar, core::ptr::addr_of!(DUMMY_TX) as usize);
        assert_eq!(tx_ch.cndtr, 4);
        assert_eq!(tx_ch.ccr & CCR_MINC, 0);
        assert_eq!(tx_ch.starts, 2);
        assert_eq!(spi.cr2() & CR2_DMA_MASK, CR2_DMA_MASK);

        engine.on_dma_event(3, DmaEvents::COMPLETE);
        engine.on_dma_event(2, DmaEvents::COMPLETE);
        assert!(!engine.is_busy());
        assert_eq!(done.get(), 1);
        assert_eq!(pin.levels(), vec![false, true]);
        assert!(!router.is_enabled(2));
        assert!(!router.is_enabled(3));
    }
}
