//! I2C (v2) Register Definitions
//!
//! The STM32F0 I2C block drives START/address/STOP sequencing in hardware
//! from `CR2`; software supplies the byte count per chunk (`NBYTES`, at most
//! 255) together with the RELOAD/AUTOEND continuation flags.

use super::{I2C1_BASE, I2C2_BASE, read_reg8, write_reg8};
use crate::dma::DmaChannels;
use crate::hal::{Interrupt, Peripheral};

// =============================================================================
// Register Offsets
// =============================================================================

/// Control register 1
pub const CR1_OFFSET: usize = 0x00;
/// Control register 2
pub const CR2_OFFSET: usize = 0x04;
/// Own address register 1
pub const OAR1_OFFSET: usize = 0x08;
/// Timing register
pub const TIMINGR_OFFSET: usize = 0x10;
/// Interrupt and status register
pub const ISR_OFFSET: usize = 0x18;
/// Interrupt clear register
pub const ICR_OFFSET: usize = 0x1C;
/// Receive data register
pub const RXDR_OFFSET: usize = 0x24;
/// Transmit data register
pub const TXDR_OFFSET: usize = 0x28;

// =============================================================================
// CR1 Bits
// =============================================================================

/// Peripheral enable
pub const CR1_PE: u32 = 1 << 0;
/// TX interrupt enable
pub const CR1_TXIE: u32 = 1 << 1;
/// RX interrupt enable
pub const CR1_RXIE: u32 = 1 << 2;
/// NACK received interrupt enable
pub const CR1_NACKIE: u32 = 1 << 4;
/// STOP detection interrupt enable
pub const CR1_STOPIE: u32 = 1 << 5;
/// Transfer complete interrupt enable (covers TC and TCR)
pub const CR1_TCIE: u32 = 1 << 6;
/// Error interrupts enable
pub const CR1_ERRIE: u32 = 1 << 7;
/// Digital noise filter shift
pub const CR1_DNF_SHIFT: u32 = 8;
/// Digital noise filter mask
pub const CR1_DNF_MASK: u32 = 0xF << 8;
/// Analog noise filter off
pub const CR1_ANFOFF: u32 = 1 << 12;
/// DMA transmission requests enable
pub const CR1_TXDMAEN: u32 = 1 << 14;
/// DMA reception requests enable
pub const CR1_RXDMAEN: u32 = 1 << 15;
/// Interrupts used by the transaction engine
pub const CR1_ENGINE_IRQS: u32 =
    CR1_TXIE | CR1_RXIE | CR1_NACKIE | CR1_STOPIE | CR1_TCIE | CR1_ERRIE;

// =============================================================================
// CR2 Fields
// =============================================================================

/// 7-bit slave address field (address sits in bits 7:1)
pub const CR2_SADD_MASK: u32 = 0x3FF;
/// Transfer direction: 1 = read
pub const CR2_RD_WRN: u32 = 1 << 10;
/// START generation (self-clearing)
pub const CR2_START: u32 = 1 << 13;
/// STOP generation (self-clearing)
pub const CR2_STOP: u32 = 1 << 14;
/// Byte count shift
pub const CR2_NBYTES_SHIFT: u32 = 16;
/// Byte count mask
pub const CR2_NBYTES_MASK: u32 = 0xFF << 16;
/// More chunks follow without releasing the bus
pub const CR2_RELOAD: u32 = 1 << 24;
/// STOP automatically after the current chunk
pub const CR2_AUTOEND: u32 = 1 << 25;
/// Fields rewritten on every chunk program
pub const CR2_CHUNK_FIELDS: u32 =
    CR2_SADD_MASK | CR2_RD_WRN | CR2_NBYTES_MASK | CR2_RELOAD | CR2_AUTOEND;

// =============================================================================
// ISR / ICR Bits
// =============================================================================

/// Transmit data register empty
pub const ISR_TXE: u32 = 1 << 0;
/// Transmit interrupt status: next byte wanted
pub const ISR_TXIS: u32 = 1 << 1;
/// Receive data register not empty
pub const ISR_RXNE: u32 = 1 << 2;
/// NACK received
pub const ISR_NACKF: u32 = 1 << 4;
/// STOP detected
pub const ISR_STOPF: u32 = 1 << 5;
/// Transfer complete (AUTOEND = 0, RELOAD = 0)
pub const ISR_TC: u32 = 1 << 6;
/// Transfer complete reload (chunk done, RELOAD = 1)
pub const ISR_TCR: u32 = 1 << 7;
/// Bus error
pub const ISR_BERR: u32 = 1 << 8;
/// Arbitration lost
pub const ISR_ARLO: u32 = 1 << 9;
/// Overrun/underrun
pub const ISR_OVR: u32 = 1 << 10;
/// Timeout or tLOW detection
pub const ISR_TIMEOUT: u32 = 1 << 12;
/// Bus busy
pub const ISR_BUSY: u32 = 1 << 15;
/// Error conditions, highest priority first
pub const ISR_ERRORS: [u32; 5] = [ISR_NACKF, ISR_BERR, ISR_ARLO, ISR_OVR, ISR_TIMEOUT];
/// Every error flag
pub const ISR_ERROR_MASK: u32 = ISR_NACKF | ISR_BERR | ISR_ARLO | ISR_OVR | ISR_TIMEOUT;

/// Every clearable flag in ICR
pub const ICR_ALL: u32 = (1 << 3) | ISR_ERROR_MASK | ISR_STOPF | (1 << 13);

// =============================================================================
// OAR1 / TIMINGR
// =============================================================================

/// Own address 1 enable
pub const OAR1_EN: u32 = 1 << 15;
/// TIMINGR for 100 kHz from a 48 MHz kernel clock
pub const TIMING_100K_48MHZ: u32 = 0x0030_3D5B;
/// TIMINGR for 400 kHz from a 48 MHz kernel clock
pub const TIMING_400K_48MHZ: u32 = 0x0010_0106;

// =============================================================================
// Instances
// =============================================================================

/// I2C peripheral instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cInstance {
    /// I2C1
    I2c1,
    /// I2C2
    I2c2,
}

impl I2cInstance {
    /// Register block base address
    #[must_use]
    pub const fn base(self) -> usize {
        match self {
            I2cInstance::I2c1 => I2C1_BASE,
            I2cInstance::I2c2 => I2C2_BASE,
        }
    }

    /// Clock domain
    #[must_use]
    pub const fn peripheral(self) -> Peripheral {
        match self {
            I2cInstance::I2c1 => Peripheral::I2c1,
            I2cInstance::I2c2 => Peripheral::I2c2,
        }
    }

    /// Interrupt line
    #[must_use]
    pub const fn interrupt(self) -> Interrupt {
        match self {
            I2cInstance::I2c1 => Interrupt::I2c1,
            I2cInstance::I2c2 => Interrupt::I2c2,
        }
    }

    /// DMA request mapping on DMA1
    #[must_use]
    pub const fn default_dma_channels(self) -> DmaChannels {
        match self {
            I2cInstance::I2c1 => DmaChannels::new(2, 3),
            I2cInstance::I2c2 => DmaChannels::new(4, 5),
        }
    }
}

// =============================================================================
// Register View
// =============================================================================

/// Register view of an I2C block
pub trait I2cRegisters {
    /// Which instance this view addresses
    fn instance(&self) -> I2cInstance;
    /// Read control register 1
    fn cr1(&self) -> u32;
    /// Write control register 1
    fn write_cr1(&self, value: u32);
    /// Read control register 2
    fn cr2(&self) -> u32;
    /// Write control register 2 (START/STOP bits trigger bus actions)
    fn write_cr2(&self, value: u32);
    /// Write own address register 1
    fn write_oar1(&self, value: u32);
    /// Write timing register
    fn write_timingr(&self, value: u32);
    /// Read interrupt and status register
    fn isr(&self) -> u32;
    /// Clear exactly the flags set in `mask`
    fn write_icr(&self, mask: u32);
    /// Pop a received byte (clears RXNE)
    fn read_rxdr(&self) -> u8;
    /// Push a byte to transmit (clears TXIS)
    fn write_txdr(&self, byte: u8);
    /// Bus address of RXDR for DMA
    fn rxdr_addr(&self) -> usize;
    /// Bus address of TXDR for DMA
    fn txdr_addr(&self) -> usize;

    /// Read-modify-write control register 1
    #[inline]
    fn modify_cr1<F: FnOnce(u32) -> u32>(&self, f: F) {
        self.write_cr1(f(self.cr1()));
    }

    /// Read-modify-write control register 2
    #[inline]
    fn modify_cr2<F: FnOnce(u32) -> u32>(&self, f: F) {
        self.write_cr2(f(self.cr2()));
    }
}

impl<T: I2cRegisters + ?Sized> I2cRegisters for &T {
    fn instance(&self) -> I2cInstance {
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
    fn write_oar1(&self, value: u32) {
        (**self).write_oar1(value);
    }
    fn write_timingr(&self, value: u32) {
        (**self).write_timingr(value);
    }
    fn isr(&self) -> u32 {
        (**self).isr()
    }
    fn write_icr(&self, mask: u32) {
        (**self).write_icr(mask);
    }
    fn read_rxdr(&self) -> u8 {
        (**self).read_rxdr()
    }
    fn write_txdr(&self, byte: u8) {
        (**self).write_txdr(byte);
    }
    fn rxdr_addr(&self) -> usize {
        (**self).rxdr_addr()
    }
    fn txdr_addr(&self) -> usize {
        (**self).txdr_addr()
    }
}

/// Memory-mapped I2C block
#[derive(Debug, Clone, Copy)]
pub struct I2cMmio {
    instance: I2cInstance,
    base: usize,
}

impl I2cMmio {
    /// View of the given instance's registers
    pub const fn new(instance: I2cInstance) -> Self {
        Self {
            instance,
            base: instance.base(),
        }
    }
}

impl I2cRegisters for I2cMmio {
    fn instance(&self) -> I2cInstance {
        self.instance
    }

    super::mmio_rw!(cr1, write_cr1, CR1_OFFSET, "control register 1");
    super::mmio_rw!(cr2, write_cr2, CR2_OFFSET, "control register 2");
    super::mmio_wo!(write_oar1, OAR1_OFFSET, "own address register 1");
    super::mmio_wo!(write_timingr, TIMINGR_OFFSET, "timing register");
    super::mmio_ro!(isr, ISR_OFFSET, "interrupt and status register");
    super::mmio_wo!(write_icr, ICR_OFFSET, "interrupt clear register");

    fn read_rxdr(&self) -> u8 {
        // SAFETY: RXDR lies inside this instance's register window
        unsafe { read_reg8(self.base + RXDR_OFFSET) }
    }

    fn write_txdr(&self, byte: u8) {
        // SAFETY: TXDR lies inside this instance's register window
        unsafe { write_reg8(self.base + TXDR_OFFSET, byte) }
    }

    fn rxdr_addr(&self) -> usize {
        self.base + RXDR_OFFSET
    }

    fn txdr_addr(&self) -> usize {
        self.base + TXDR_OFFSET
    }
}
