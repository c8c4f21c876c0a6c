//! ISR-safe engine wrappers using critical sections.
//!
//! Each wrapper owns one engine in a [`CriticalSectionCell`] and is the
//! [`DmaClient`] the router calls for that engine's channels. Typical use is
//! a `static` wrapper, `bind()` once at start-up, and `on_interrupt()` from
//! the peripheral's vector.
//!
//! Engine callbacks run inside the wrapper's critical section; they must not
//! call back into the same wrapper.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;

use super::primitives::CriticalSectionCell;
use crate::constants::WAIT_POLL_INTERVAL_US;
use crate::dma::{DmaClient, DmaEvents};
use crate::error::{DmaResult, I2cError, I2cResult, RequestError, RequestResult, SerialError};
use crate::i2c::{DmaSelect, I2cEngine};
use crate::register::{DmaRegisters, I2cRegisters, SpiRegisters, UsartRegisters};
use crate::serial::SerialEngine;
use crate::spi::SpiEngine;

/// Poll `done` every [`WAIT_POLL_INTERVAL_US`] until it yields or the
/// budget runs out
fn poll_until<T, F, Dl>(delay: &mut Dl, timeout_us: u32, mut done: F) -> Option<T>
where
    F: FnMut() -> Option<T>,
    Dl: DelayNs,
{
    let mut waited = 0u32;
    loop {
        if let Some(value) = done() {
            return Some(value);
        }
        if waited >= timeout_us {
            return None;
        }
        delay.delay_us(WAIT_POLL_INTERVAL_US);
        waited = waited.saturating_add(WAIT_POLL_INTERVAL_US);
    }
}

// =============================================================================
// Two-Wire
// =============================================================================

/// ISR-safe two-wire engine
///
/// # Example
///
/// ```ignore
/// static DMA: DmaRouter<'static, Dma1> = DmaRouter::new(Dma1::new());
/// static I2C: SharedI2c<'static, I2cMmio, Dma1> = SharedI2c::new(I2cEngine::new(
///     I2cMmio::new(I2cInstance::I2c1),
///     &DMA,
///     I2cConfig::new().with_dma_channels(I2cInstance::I2c1.default_dma_channels()),
/// ));
///
/// I2C.bind().unwrap();
/// I2C.with(|i2c| i2c.init(&mut Rcc::new(), &mut Nvic::new())).unwrap();
///
/// static CMD: [u8; 1] = [0x0F];
/// I2C.write(0x68, &CMD, DmaSelect::TX).unwrap();
/// I2C.wait_done(&mut delay, 1_000)?;
///
/// #[interrupt]
/// fn I2C1() {
///     I2C.on_interrupt();
/// }
/// ```
pub struct SharedI2c<'a, R: I2cRegisters, D: DmaRegisters> {
    inner: CriticalSectionCell<I2cEngine<'a, R, D>>,
}

impl<'a, R: I2cRegisters, D: DmaRegisters> SharedI2c<'a, R, D> {
    /// Wrap an engine (const, suitable for static initialization).
    pub const fn new(engine: I2cEngine<'a, R, D>) -> Self {
        Self {
            inner: CriticalSectionCell::new(engine),
        }
    }

    /// Execute a closure with exclusive access to the engine.
    #[inline]
    pub fn with<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut I2cEngine<'a, R, D>) -> T,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut I2cEngine<'a, R, D>) -> T,
    {
        self.inner.try_with(f)
    }

    /// Peripheral interrupt entry
    pub fn on_interrupt(&self) {
        self.with(|engine| engine.on_interrupt());
    }

    /// Start a transaction, see [`I2cEngine::start`]
    pub fn start(
        &self,
        address: u8,
        write: &'a [u8],
        read: &'a mut [u8],
        dma: DmaSelect,
    ) -> I2cResult<()> {
        self.with(|engine| engine.start(address, write, read, dma))
    }

    /// Write `data` to `address`
    pub fn write(&self, address: u8, data: &'a [u8], dma: DmaSelect) -> I2cResult<()> {
        self.with(|engine| engine.write(address, data, dma))
    }

    /// Read into `buffer` from `address`
    pub fn read(&self, address: u8, buffer: &'a mut [u8], dma: DmaSelect) -> I2cResult<()> {
        self.with(|engine| engine.read(address, buffer, dma))
    }

    /// Write `data`, then read into `buffer` after a repeated START
    pub fn write_read(
        &self,
        address: u8,
        data: &'a [u8],
        buffer: &'a mut [u8],
        dma: DmaSelect,
    ) -> I2cResult<()> {
        self.with(|engine| engine.write_read(address, data, buffer, dma))
    }

    /// Whether a transaction is in flight
    pub fn is_busy(&self) -> bool {
        self.with(|engine| engine.is_busy())
    }

    /// Wait up to `timeout_us` for the transaction to finish
    ///
    /// Returns its outcome, or [`I2cError::Timeout`] when the budget runs
    /// out. The transaction itself keeps running.
    pub fn wait_done<Dl: DelayNs>(&self, delay: &mut Dl, timeout_us: u32) -> I2cResult<()> {
        poll_until(delay, timeout_us, || {
            self.with(|engine| if engine.is_busy() { None } else { engine.outcome() })
        })
        .unwrap_or(Err(I2cError::Timeout))
    }
}

impl<'a, R: I2cRegisters + 'a, D: DmaRegisters + 'a> SharedI2c<'a, R, D> {
    /// Attach this engine to its configured DMA channels
    ///
    /// No-op without a configured channel pair.
    pub fn bind(&'a self) -> DmaResult<()> {
        let (router, channels) = self.with(|engine| (engine.router(), engine.config().dma));
        if let Some(channels) = channels {
            router.attach(channels.tx, self)?;
            router.attach(channels.rx, self)?;
        }
        Ok(())
    }
}

impl<R: I2cRegisters, D: DmaRegisters> DmaClient for SharedI2c<'_, R, D> {
    fn on_dma_event(&self, channel: u8, events: DmaEvents) {
        self.with(|engine| engine.on_dma_event(channel, events));
    }
}

// =============================================================================
// Synchronous Bus
// =============================================================================

/// ISR-safe synchronous-bus engine
pub struct SharedSpi<'a, R: SpiRegisters, D: DmaRegisters, CS: OutputPin> {
    inner: CriticalSectionCell<SpiEngine<'a, R, D, CS>>,
}

impl<'a, R: SpiRegisters, D: DmaRegisters, CS: OutputPin> SharedSpi<'a, R, D, CS> {
    /// Wrap an engine (const, suitable for static initialization).
    pub const fn new(engine: SpiEngine<'a, R, D, CS>) -> Self {
        Self {
            inner: CriticalSectionCell::new(engine),
        }
    }

    /// Execute a closure with exclusive access to the engine.
    #[inline]
    pub fn with<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut SpiEngine<'a, R, D, CS>) -> T,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SpiEngine<'a, R, D, CS>) -> T,
    {
        self.inner.try_with(f)
    }

    /// Peripheral interrupt entry
    pub fn on_interrupt(&self) {
        self.with(|engine| engine.on_interrupt());
    }

    /// Start a transfer, see [`SpiEngine::start`]
    pub fn start(
        &self,
        tx: Option<&'a [u8]>,
        rx: Option<&'a mut [u8]>,
        count: usize,
    ) -> RequestResult<()> {
        self.with(|engine| engine.start(tx, rx, count))
    }

    /// Exchange `tx` for as many received items
    pub fn transfer(&self, tx: &'a [u8], rx: &'a mut [u8]) -> RequestResult<()> {
        self.with(|engine| engine.transfer(tx, rx))
    }

    /// Command then response under one chip-select assertion
    pub fn start_write_then_read(
        &self,
        tx: &'a [u8],
        n1: usize,
        rx: &'a mut [u8],
        n2: usize,
    ) -> RequestResult<()> {
        self.with(|engine| engine.start_write_then_read(tx, n1, rx, n2))
    }

    /// Cancel the transaction in flight without a callback
    pub fn abort(&self) {
        self.with(|engine| engine.abort());
    }

    /// Whether a transaction is in flight
    pub fn is_busy(&self) -> bool {
        self.with(|engine| engine.is_busy())
    }

    /// Wait up to `timeout_us` for the engine to go idle
    pub fn wait<Dl: DelayNs>(&self, delay: &mut Dl, timeout_us: u32) -> RequestResult<()> {
        poll_until(delay, timeout_us, || (!self.is_busy()).then_some(()))
            .ok_or(RequestError::Timeout)
    }
}

impl<'a, R, D, CS> SharedSpi<'a, R, D, CS>
where
    R: SpiRegisters + 'a,
    D: DmaRegisters + 'a,
    CS: OutputPin + 'a,
{
    /// Attach this engine to its configured DMA channels
    pub fn bind(&'a self) -> DmaResult<()> {
        let (router, channels) = self.with(|engine| (engine.router(), engine.config().dma));
        if let Some(channels) = channels {
            router.attach(channels.tx, self)?;
            router.attach(channels.rx, self)?;
        }
        Ok(())
    }
}

impl<R: SpiRegisters, D: DmaRegisters, CS: OutputPin> DmaClient for SharedSpi<'_, R, D, CS> {
    fn on_dma_event(&self, channel: u8, events: DmaEvents) {
        self.with(|engine| engine.on_dma_event(channel, events));
    }
}

// =============================================================================
// Serial Link
// =============================================================================

/// ISR-safe serial-link engine
///
/// Implements [`embedded_io::Write`] through a shared reference.
pub struct SharedSerial<'a, R: UsartRegisters, D: DmaRegisters, const TX: usize, const RX: usize> {
    inner: CriticalSectionCell<SerialEngine<'a, R, D, TX, RX>>,
}

impl<'a, R, D, const TX: usize, const RX: usize> SharedSerial<'a, R, D, TX, RX>
where
    R: UsartRegisters,
    D: DmaRegisters,
{
    /// Wrap an engine (const, suitable for static initialization).
    pub const fn new(engine: SerialEngine<'a, R, D, TX, RX>) -> Self {
        Self {
            inner: CriticalSectionCell::new(engine),
        }
    }

    /// Execute a closure with exclusive access to the engine.
    #[inline]
    pub fn with<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&mut SerialEngine<'a, R, D, TX, RX>) -> T,
    {
        self.inner.with(f)
    }

    /// Try to execute a closure, returning `None` if already borrowed.
    #[inline]
    pub fn try_with<T, F>(&self, f: F) -> Option<T>
    where
        F: FnOnce(&mut SerialEngine<'a, R, D, TX, RX>) -> T,
    {
        self.inner.try_with(f)
    }

    /// Peripheral interrupt entry
    pub fn on_interrupt(&self) {
        self.with(|engine| engine.on_interrupt());
    }

    /// Queue all of `data`, spinning while the transmit ring is full
    ///
    /// The lock is released between attempts so the mover can drain the
    /// ring. Must not be called from a context that blocks the serial
    /// interrupts.
    pub fn write(&self, data: &[u8]) -> usize {
        let mut rest = data;
        while !rest.is_empty() {
            let queued = self.with(|engine| engine.write(rest));
            rest = &rest[queued..];
            if queued == 0 {
                core::hint::spin_loop();
            }
        }
        data.len()
    }

    /// Move buffered received bytes into `out`
    pub fn read(&self, out: &mut [u8]) -> usize {
        self.with(|engine| engine.read(out))
    }

    /// Spin until every queued byte has left the shift register
    pub fn flush(&self) {
        while !self.with(|engine| engine.is_tx_idle()) {
            core::hint::spin_loop();
        }
    }
}

impl<'a, R, D, const TX: usize, const RX: usize> SharedSerial<'a, R, D, TX, RX>
where
    R: UsartRegisters + 'a,
    D: DmaRegisters + 'a,
{
    /// Attach this engine to its configured DMA channels
    pub fn bind(&'a self) -> DmaResult<()> {
        let (router, channels) = self.with(|engine| (engine.router(), engine.config().dma));
        if let Some(channels) = channels {
            router.attach(channels.tx, self)?;
            router.attach(channels.rx, self)?;
        }
        Ok(())
    }
}

impl<R, D, const TX: usize, const RX: usize> DmaClient for SharedSerial<'_, R, D, TX, RX>
where
    R: UsartRegisters,
    D: DmaRegisters,
{
    fn on_dma_event(&self, channel: u8, events: DmaEvents) {
        self.with(|engine| engine.on_dma_event(channel, events));
    }
}

impl<R, D, const TX: usize, const RX: usize> embedded_io::ErrorType
    for &SharedSerial<'_, R, D, TX, RX>
where
    R: UsartRegisters,
    D: DmaRegisters,
{
    type Error = SerialError;
}

impl<R, D, const TX: usize, const RX: usize> embedded_io::Write for &SharedSerial<'_, R, D, TX, RX>
where
    R: UsartRegisters,
    D: DmaRegisters,
{
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(SharedSerial::write(self, buf))
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        SharedSerial::flush(self);
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::dma::{DmaChannels, DmaRouter, IrqLine, XferEngine};
    use crate::i2c::{I2cConfig, I2cInstance, I2cPhase};
    use crate::register::dma::{ISR_TCIF, ISR_TEIF};
    use crate::register::i2c::{CR1_TXDMAEN, CR2_NBYTES_MASK, CR2_NBYTES_SHIFT, ISR_STOPF, ISR_TCR};
    use crate::serial::{SerialConfig, UsartInstance};
    use crate::spi::{NoChipSelect, SpiConfig, SpiInstance};
    use crate::testing::{MockClocks, MockDelay, MockDma, MockI2c, MockNvic, MockSpi, MockUsart};
    use std::vec::Vec;

    #[test]
    fn i2c_bind_attaches_configured_channels() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let i2c = MockI2c::new(I2cInstance::I2c2);
        let config = I2cConfig::new().with_dma_channels(I2cInstance::I2c2.default_dma_channels());
        let shared = SharedI2c::new(I2cEngine::new(&i2c, &router, config));

        shared.bind().unwrap();
        assert!(router.is_attached(4));
        assert!(router.is_attached(5));
        assert!(!router.is_attached(2));
    }

    #[test]
    fn i2c_dma_write_re_arms_each_chunk() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let i2c = MockI2c::new(I2cInstance::I2c1);
        let config = I2cConfig::new().with_dma_channels(DmaChannels::new(2, 3));
        let shared = SharedI2c::new(I2cEngine::new(&i2c, &router, config));
        shared.bind().unwrap();
        let data: Vec<u8> = (0..300u32).map(|i| i as u8).collect();

        shared.write(0x3C, &data, DmaSelect::TX).unwrap();
        assert_eq!(dma.channel(2).cndtr, 255);
        assert_eq!(dma.channel(2).cmar, data.as_ptr() as usize);
        assert_eq!(i2c.cr1() & CR1_TXDMAEN, CR1_TXDMAEN);

        i2c.raise(ISR_TCR);
        shared.on_interrupt();
        assert_eq!(dma.channel(2).cndtr, 45);
        assert_eq!(dma.channel(2).cmar, data[255..].as_ptr() as usize);
        assert_eq!(dma.channel(2).starts, 2);
        let programs = i2c.cr2_programs();
        assert_eq!((programs[1] & CR2_NBYTES_MASK) >> CR2_NBYTES_SHIFT, 45);

        i2c.raise(ISR_STOPF);
        shared.on_interrupt();
        assert_eq!(shared.wait_done(&mut MockDelay::new(), 100), Ok(()));
        assert_eq!(shared.with(|e| e.bytes_written()), 300);
        assert_eq!(i2c.cr1() & CR1_TXDMAEN, 0);
    }

    #[test]
    fn i2c_dma_error_finishes_without_waiting_for_stop() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let i2c = MockI2c::new(I2cInstance::I2c1);
        let config = I2cConfig::new().with_dma_channels(DmaChannels::new(2, 3));
        let shared = SharedI2c::new(I2cEngine::new(&i2c, &router, config));
        shared.bind().unwrap();
        let mut rx = [0u8; 8];

        shared.read(0x3C, &mut rx, DmaSelect::RX).unwrap();
        assert_eq!(dma.channel(3).cndtr, 8);

        dma.raise(3, ISR_TEIF);
        router.on_interrupt(IrqLine::Ch2To3);

        assert_eq!(shared.with(|e| e.phase()), I2cPhase::Error);
        assert_eq!(shared.wait_done(&mut MockDelay::new(), 0), Err(I2cError::Dma));
        assert_eq!(i2c.stop_count(), 1);
        assert!(!router.is_enabled(3));
    }

    #[test]
    fn i2c_wait_done_times_out_on_budget() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let i2c = MockI2c::new(I2cInstance::I2c1);
        let shared = SharedI2c::new(I2cEngine::new(&i2c, &router, I2cConfig::new()));
        let data = [1u8];
        shared.write(0x10, &data, DmaSelect::NONE).unwrap();

        let mut delay = MockDelay::new();
        assert_eq!(shared.wait_done(&mut delay, 50), Err(I2cError::Timeout));
        assert_eq!(delay.elapsed_us(), 50);
        assert!(shared.is_busy());
    }

    #[test]
    fn spi_dma_completion_arrives_through_router() {
        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let spi = MockSpi::new(SpiInstance::Spi2);
        let config = SpiConfig::new()
            .with_engines(XferEngine::Dma, XferEngine::Dma)
            .with_dma_channels(SpiInstance::Spi2.default_dma_channels());
        let shared = SharedSpi::new(SpiEngine::new(&spi, &router, config, NoChipSelect));
        shared.bind().unwrap();
        let tx = [1u8, 2, 3];
        let mut rx = [0u8; 3];

        shared.transfer(&tx, &mut rx).unwrap();
        assert_eq!(shared.wait(&mut MockDelay::new(), 20), Err(RequestError::Timeout));

        dma.raise(4, ISR_TCIF);
        dma.raise(5, ISR_TCIF);
        router.on_interrupt(IrqLine::of(4).unwrap());

        assert_eq!(shared.wait(&mut MockDelay::new(), 0), Ok(()));
    }

    #[test]
    fn serial_write_and_read_through_shared_wrapper() {
        use embedded_io::Write as _;

        let dma = MockDma::new();
        let router = DmaRouter::new(&dma);
        let usart = MockUsart::new(UsartInstance::Usart1);
        usart.set_loopback(true);
        let shared: SharedSerial<'_, _, _, 32, 32> =
            SharedSerial::new(SerialEngine::new(&usart, &router, SerialConfig::new()));
        shared.bind().unwrap();
        shared
            .with(|e| e.init(&mut MockClocks::new(), &mut MockNvic::new()))
            .unwrap();

        let mut port = &shared;
        port.write_all(b"ping").unwrap();
        assert_eq!(shared.with(|e| e.tx_pending()), 4);

        for _ in 0..8 {
            shared.on_interrupt();
        }
        shared.flush();

        let mut out = [0u8; 8];
        let n = shared.read(&mut out);
        assert_eq!(&out[..n], b"ping");
    }
}
