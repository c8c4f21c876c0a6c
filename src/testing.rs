//! Testing utilities and mock implementations
//!
//! Register-level mocks for the DMA controller and the three communication
//! blocks, plus clock/interrupt/delay/pin doubles. The mocks model just
//! enough hardware behavior (write-exact flag clears, self-clearing bits,
//! FIFOs) for the engines to be driven from host tests.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::{Cell, RefCell};
use core::convert::Infallible;
use std::collections::VecDeque;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::constants::DMA_CHANNELS;
use crate::dma::{DmaClient, DmaEvents};
use crate::hal::{ClockGate, Interrupt, InterruptController, Peripheral, Priority};
use crate::register::dma::{CCR_EN, ISR_GIF, flag_shift};
use crate::register::i2c::{
    CR2_START, CR2_STOP, I2cInstance, ISR_RXNE as I2C_RXNE, ISR_TC as I2C_TC,
    ISR_TCR as I2C_TCR, ISR_TXIS, RXDR_OFFSET, TXDR_OFFSET,
};
use crate::register::spi::{
    DR_OFFSET, SR_CRCERR, SR_MODF, SR_OVR, SR_RXNE as SPI_RXNE, SR_TXE as SPI_TXE, SpiInstance,
};
use crate::register::usart::{
    ISR_RXNE as USART_RXNE, ISR_TC as USART_TC, ISR_TXE as USART_TXE, RDR_OFFSET, TDR_OFFSET,
    UsartInstance,
};
use crate::register::{DmaRegisters, I2cRegisters, SpiRegisters, UsartRegisters};

// =============================================================================
// Mock DMA Controller
// =============================================================================

/// Register snapshot of one mock channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockChannel {
    pub ccr: u32,
    pub cndtr: u32,
    pub cpar: usize,
    pub cmar: usize,
    /// Number of times the enable bit went from 0 to 1
    pub starts: u32,
    /// Last programmed item count (circular reload value)
    pub reload: u32,
}

#[derive(Debug, Default)]
struct DmaState {
    isr: u32,
    ifcr_writes: Vec<u32>,
    channels: [MockChannel; DMA_CHANNELS],
}

/// Mock DMA1 controller
///
/// `ISR` is only changed by [`raise`](Self::raise) and write-exact `IFCR`
/// clears. [`feed`](Self::feed) plays the part of a peripheral-to-memory
/// channel by writing into the programmed memory address.
#[derive(Debug, Default)]
pub struct MockDma {
    state: RefCell<DmaState>,
    isr_reads: Cell<u32>,
}

impl MockDma {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set event flags (and the global flag) of `channel`
    pub fn raise(&self, channel: u8, flags: u32) {
        self.state.borrow_mut().isr |= (flags | ISR_GIF) << flag_shift(channel);
    }

    /// Copy of `channel`'s registers
    pub fn channel(&self, channel: u8) -> MockChannel {
        self.state.borrow().channels[usize::from(channel) - 1]
    }

    /// Number of `ISR` reads made through the register trait
    pub fn isr_reads(&self) -> u32 {
        self.isr_reads.get()
    }

    /// Every value written to `IFCR`, in order
    pub fn ifcr_writes(&self) -> Vec<u32> {
        self.state.borrow().ifcr_writes.clone()
    }

    /// Deliver `bytes` through `channel` into its memory buffer
    ///
    /// Decrements the item counter per byte and reloads it at zero like a
    /// circular channel.
    pub fn feed(&self, channel: u8, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        let ch = &mut state.channels[usize::from(channel) - 1];
        for &byte in bytes {
            let offset = (ch.reload - ch.cndtr) as usize;
            // SAFETY: tests program cmar with a live buffer of `reload` bytes
            unsafe { ((ch.cmar + offset) as *mut u8).write_volatile(byte) };
            ch.cndtr -= 1;
            if ch.cndtr == 0 {
                ch.cndtr = ch.reload;
            }
        }
    }

    /// The `cndtr` bytes a memory-to-peripheral channel would send
    pub fn source_bytes(&self, channel: u8) -> Vec<u8> {
        let ch = self.channel(channel);
        // SAFETY: tests program cmar with a live buffer of at least cndtr bytes
        unsafe { std::slice::from_raw_parts(ch.cmar as *const u8, ch.cndtr as usize) }.to_vec()
    }
}

impl DmaRegisters for MockDma {
    fn isr(&self) -> u32 {
        self.isr_reads.set(self.isr_reads.get() + 1);
        self.state.borrow().isr
    }

    fn write_ifcr(&self, mask: u32) {
        let mut state = self.state.borrow_mut();
        state.isr &= !mask;
        state.ifcr_writes.push(mask);
    }

    fn ccr(&self, channel: u8) -> u32 {
        self.channel(channel).ccr
    }

    fn write_ccr(&self, channel: u8, value: u32) {
        let mut state = self.state.borrow_mut();
        let ch = &mut state.channels[usize::from(channel) - 1];
        if value & CCR_EN != 0 && ch.ccr & CCR_EN == 0 {
            ch.starts += 1;
        }
        ch.ccr = value;
    }

    fn cndtr(&self, channel: u8) -> u32 {
        self.channel(channel).cndtr
    }

    fn write_cndtr(&self, channel: u8, value: u32) {
        let mut state = self.state.borrow_mut();
        let ch = &mut state.channels[usize::from(channel) - 1];
        ch.cndtr = value;
        ch.reload = value;
    }

    fn write_cpar(&self, channel: u8, addr: usize) {
        self.state.borrow_mut().channels[usize::from(channel) - 1].cpar = addr;
    }

    fn write_cmar(&self, channel: u8, addr: usize) {
        self.state.borrow_mut().channels[usize::from(channel) - 1].cmar = addr;
    }
}

// =============================================================================
// Mock Two-Wire Block
// =============================================================================

#[derive(Debug, Default)]
struct I2cState {
    cr1: u32,
    cr2: u32,
    oar1: u32,
    timingr: u32,
    isr: u32,
    rx: VecDeque<u8>,
    tx: Vec<u8>,
    programs: Vec<u32>,
    stops: u32,
}

/// Mock I2C block
///
/// START/STOP are self-clearing; any `CR2` write clears `TC`/`TCR` as the
/// hardware does when a new chunk is programmed or STOP is issued.
#[derive(Debug)]
pub struct MockI2c {
    instance: I2cInstance,
    state: RefCell<I2cState>,
}

impl MockI2c {
    pub fn new(instance: I2cInstance) -> Self {
        Self {
            instance,
            state: RefCell::new(I2cState::default()),
        }
    }

    /// Set status flags
    pub fn raise(&self, bits: u32) {
        self.state.borrow_mut().isr |= bits;
    }

    /// Queue a byte for `RXDR`
    pub fn push_rx(&self, byte: u8) {
        self.state.borrow_mut().rx.push_back(byte);
    }

    /// `CR2` values written to program a chunk (STOP requests excluded)
    pub fn cr2_programs(&self) -> Vec<u32> {
        self.state.borrow().programs.clone()
    }

    /// Bytes written to `TXDR`
    pub fn transmitted(&self) -> Vec<u8> {
        self.state.borrow().tx.clone()
    }

    /// Number of STOP requests
    pub fn stop_count(&self) -> u32 {
        self.state.borrow().stops
    }

    pub fn oar1(&self) -> u32 {
        self.state.borrow().oar1
    }

    pub fn timingr(&self) -> u32 {
        self.state.borrow().timingr
    }
}

impl I2cRegisters for MockI2c {
    fn instance(&self) -> I2cInstance {
        self.instance
    }

    fn cr1(&self) -> u32 {
        self.state.borrow().cr1
    }

    fn write_cr1(&self, value: u32) {
        self.state.borrow_mut().cr1 = value;
    }

    fn cr2(&self) -> u32 {
        self.state.borrow().cr2
    }

    fn write_cr2(&self, value: u32) {
        let mut state = self.state.borrow_mut();
        if value & CR2_STOP != 0 {
            state.stops += 1;
        } else {
            state.programs.push(value);
        }
        state.isr &= !(I2C_TC | I2C_TCR);
        state.cr2 = value & !(CR2_START | CR2_STOP);
    }

    fn write_oar1(&self, value: u32) {
        self.state.borrow_mut().oar1 = value;
    }

    fn write_timingr(&self, value: u32) {
        self.state.borrow_mut().timingr = value;
    }

    fn isr(&self) -> u32 {
        self.state.borrow().isr
    }

    fn write_icr(&self, mask: u32) {
        self.state.borrow_mut().isr &= !mask;
    }

    fn read_rxdr(&self) -> u8 {
        let mut state = self.state.borrow_mut();
        let byte = state.rx.pop_front().unwrap_or(0);
        if state.rx.is_empty() {
            state.isr &= !I2C_RXNE;
        }
        byte
    }

    fn write_txdr(&self, byte: u8) {
        let mut state = self.state.borrow_mut();
        state.tx.push(byte);
        state.isr &= !ISR_TXIS;
    }

    fn rxdr_addr(&self) -> usize {
        self.instance.base() + RXDR_OFFSET
    }

    fn txdr_addr(&self) -> usize {
        self.instance.base() + TXDR_OFFSET
    }
}

// =============================================================================
// Mock Synchronous-Bus Block
// =============================================================================

#[derive(Debug, Default)]
struct SpiState {
    cr1: u32,
    cr2: u32,
    /// Error and busy flags; TXE/RXNE are derived
    flags: u32,
    miso: VecDeque<u16>,
    rx_fifo: VecDeque<u16>,
    mosi: Vec<u16>,
}

/// Mock SPI block
///
/// Every item written to `DR` clocks in the next scripted MISO item (0 once
/// the script runs out). TXE is always set; RXNE follows the receive FIFO.
#[derive(Debug)]
pub struct MockSpi {
    instance: SpiInstance,
    state: RefCell<SpiState>,
}

impl MockSpi {
    pub fn new(instance: SpiInstance) -> Self {
        Self {
            instance,
            state: RefCell::new(SpiState::default()),
        }
    }

    /// Items the slave will answer with, in order
    pub fn script_miso(&self, items: &[u16]) {
        self.state.borrow_mut().miso.extend(items.iter().copied());
    }

    /// Items written to `DR`
    pub fn mosi(&self) -> Vec<u16> {
        self.state.borrow().mosi.clone()
    }

    /// Set error or busy flags
    pub fn raise(&self, bits: u32) {
        self.state.borrow_mut().flags |= bits;
    }

    fn clock(&self, item: u16) {
        let mut state = self.state.borrow_mut();
        state.mosi.push(item);
        let answer = state.miso.pop_front().unwrap_or(0);
        state.rx_fifo.push_back(answer);
    }

    fn pop(&self) -> u16 {
        let mut state = self.state.borrow_mut();
        state.flags &= !SR_OVR;
        state.rx_fifo.pop_front().unwrap_or(0)
    }
}

impl SpiRegisters for MockSpi {
    fn instance(&self) -> SpiInstance {
        self.instance
    }

    fn cr1(&self) -> u32 {
        self.state.borrow().cr1
    }

    fn write_cr1(&self, value: u32) {
        let mut state = self.state.borrow_mut();
        state.cr1 = value;
        state.flags &= !SR_MODF;
    }

    fn cr2(&self) -> u32 {
        self.state.borrow().cr2
    }

    fn write_cr2(&self, value: u32) {
        self.state.borrow_mut().cr2 = value;
    }

    fn sr(&self) -> u32 {
        let state = self.state.borrow();
        let rxne = if state.rx_fifo.is_empty() { 0 } else { SPI_RXNE };
        state.flags | SPI_TXE | rxne
    }

    fn write_sr(&self, value: u32) {
        if value & SR_CRCERR == 0 {
            self.state.borrow_mut().flags &= !SR_CRCERR;
        }
    }

    fn read_dr8(&self) -> u8 {
        self.pop() as u8
    }

    fn read_dr16(&self) -> u16 {
        self.pop()
    }

    fn write_dr8(&self, value: u8) {
        self.clock(u16::from(value));
    }

    fn write_dr16(&self, value: u16) {
        self.clock(value);
    }

    fn dr_addr(&self) -> usize {
        self.instance.base() + DR_OFFSET
    }
}

// =============================================================================
// Mock Serial Block
// =============================================================================

#[derive(Debug, Default)]
struct UsartState {
    cr1: u32,
    cr2: u32,
    cr3: u32,
    brr: u32,
    /// Raised flags; TXE/TC/RXNE are derived
    flags: u32,
    rdr: VecDeque<u8>,
    sent: Vec<u8>,
    loopback: bool,
}

/// Mock USART block
///
/// The transmitter is always ready (TXE and TC set). With loopback on,
/// every byte written to `TDR` becomes readable from `RDR`.
#[derive(Debug)]
pub struct MockUsart {
    instance: UsartInstance,
    state: RefCell<UsartState>,
}

impl MockUsart {
    pub fn new(instance: UsartInstance) -> Self {
        Self {
            instance,
            state: RefCell::new(UsartState::default()),
        }
    }

    pub fn set_loopback(&self, on: bool) {
        self.state.borrow_mut().loopback = on;
    }

    /// Set status flags
    pub fn raise(&self, bits: u32) {
        self.state.borrow_mut().flags |= bits;
    }

    pub fn brr(&self) -> u32 {
        self.state.borrow().brr
    }

    /// Bytes written to `TDR`
    pub fn sent(&self) -> Vec<u8> {
        self.state.borrow().sent.clone()
    }
}

impl UsartRegisters for MockUsart {
    fn instance(&self) -> UsartInstance {
        self.instance
    }

    fn cr1(&self) -> u32 {
        self.state.borrow().cr1
    }

    fn write_cr1(&self, value: u32) {
        self.state.borrow_mut().cr1 = value;
    }

    fn cr2(&self) -> u32 {
        self.state.borrow().cr2
    }

    fn write_cr2(&self, value: u32) {
        self.state.borrow_mut().cr2 = value;
    }

    fn cr3(&self) -> u32 {
        self.state.borrow().cr3
    }

    fn write_cr3(&self, value: u32) {
        self.state.borrow_mut().cr3 = value;
    }

    fn write_brr(&self, value: u32) {
        self.state.borrow_mut().brr = value;
    }

    fn isr(&self) -> u32 {
        let state = self.state.borrow();
        let rxne = if state.rdr.is_empty() { 0 } else { USART_RXNE };
        state.flags | USART_TXE | USART_TC | rxne
    }

    fn write_icr(&self, mask: u32) {
        self.state.borrow_mut().flags &= !mask;
    }

    fn read_rdr(&self) -> u8 {
        self.state.borrow_mut().rdr.pop_front().unwrap_or(0)
    }

    fn write_tdr(&self, byte: u8) {
        let mut state = self.state.borrow_mut();
        state.sent.push(byte);
        if state.loopback {
            state.rdr.push_back(byte);
        }
    }

    fn rdr_addr(&self) -> usize {
        self.instance.base() + RDR_OFFSET
    }

    fn tdr_addr(&self) -> usize {
        self.instance.base() + TDR_OFFSET
    }
}

// =============================================================================
// Mock Clocks / Interrupts
// =============================================================================

/// Records clock enables
#[derive(Debug, Default)]
pub struct MockClocks {
    enabled: Vec<Peripheral>,
}

impl MockClocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> Vec<Peripheral> {
        self.enabled.clone()
    }
}

impl ClockGate for MockClocks {
    fn enable(&mut self, peripheral: Peripheral) {
        self.enabled.push(peripheral);
    }
}

/// Records unmasked interrupt lines with their priority
#[derive(Debug, Default)]
pub struct MockNvic {
    enabled: Vec<(Interrupt, Priority)>,
}

impl MockNvic {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enabled(&self) -> Vec<(Interrupt, Priority)> {
        self.enabled.clone()
    }
}

impl InterruptController for MockNvic {
    fn enable(&mut self, irq: Interrupt, priority: Priority) {
        self.enabled.push((irq, priority));
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Mock delay for testing without actual timing
///
/// Records delays for verification without actually waiting.
#[derive(Debug, Default)]
pub struct MockDelay {
    /// Total nanoseconds delayed
    total_ns: u64,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total nanoseconds that were "delayed"
    pub fn total_ns(&self) -> u64 {
        self.total_ns
    }

    /// Total microseconds that were "delayed"
    pub fn elapsed_us(&self) -> u64 {
        self.total_ns / 1_000
    }
}

impl embedded_hal::delay::DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += u64::from(ns);
    }
}

// =============================================================================
// Mock Chip Select / DMA Client
// =============================================================================

/// Output pin that records every level it is driven to
#[derive(Debug, Default)]
pub struct MockPin {
    levels: RefCell<Vec<bool>>,
}

impl MockPin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels driven so far (`false` = low)
    pub fn levels(&self) -> Vec<bool> {
        self.levels.borrow().clone()
    }
}

impl ErrorType for &MockPin {
    type Error = Infallible;
}

impl OutputPin for &MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.levels.borrow_mut().push(true);
        Ok(())
    }
}

/// DMA client that records the events it receives
#[derive(Debug, Default)]
pub struct RecordingClient {
    events: RefCell<Vec<(u8, DmaEvents)>>,
}

impl RecordingClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(u8, DmaEvents)> {
        self.events.borrow().clone()
    }
}

impl DmaClient for RecordingClient {
    fn on_dma_event(&self, channel: u8, events: DmaEvents) {
        self.events.borrow_mut().push((channel, events));
    }
}
