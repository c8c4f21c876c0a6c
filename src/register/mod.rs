//! Memory-mapped register views for the STM32F0 communication blocks
//!
//! Each peripheral block is described by a trait ([`DmaRegisters`],
//! [`I2cRegisters`], [`SpiRegisters`], [`UsartRegisters`]) whose methods map
//! one-to-one onto register reads and writes. The MMIO implementations in
//! the submodules perform volatile accesses; the engines only ever talk to
//! the trait, so tests substitute in-memory mocks.
//!
//! Flag-clear registers (`IFCR`, `ICR`) are write-exact: a write clears
//! precisely the bits set in the value and leaves every other pending flag
//! untouched. Clears are never done by read-modify-write of a status
//! register.

pub mod dma;
pub mod i2c;
pub mod spi;
pub mod usart;

pub use dma::{Dma1, DmaRegisters};
pub use i2c::{I2cInstance, I2cMmio, I2cRegisters};
pub use spi::{SpiInstance, SpiMmio, SpiRegisters};
pub use usart::{UsartInstance, UsartMmio, UsartRegisters};

// =============================================================================
// Peripheral Base Addresses
// =============================================================================

/// DMA1 controller base address
pub const DMA1_BASE: usize = 0x4002_0000;

/// RCC base address
pub const RCC_BASE: usize = 0x4002_1000;

/// I2C1 base address
pub const I2C1_BASE: usize = 0x4000_5400;

/// I2C2 base address
pub const I2C2_BASE: usize = 0x4000_5800;

/// SPI1 base address
pub const SPI1_BASE: usize = 0x4001_3000;

/// SPI2 base address
pub const SPI2_BASE: usize = 0x4000_3800;

/// USART1 base address
pub const USART1_BASE: usize = 0x4001_3800;

/// USART2 base address
pub const USART2_BASE: usize = 0x4000_4400;

/// NVIC interrupt set-enable register
pub const NVIC_ISER: usize = 0xE000_E100;

/// NVIC interrupt priority registers (word access only on Cortex-M0)
pub const NVIC_IPR_BASE: usize = 0xE000_E400;

// =============================================================================
// Volatile Access
// =============================================================================

/// Read a 32-bit register at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn read_reg(addr: usize) -> u32 {
    unsafe { core::ptr::read_volatile(addr as *const u32) }
}

/// Write a 32-bit value to a register at the given address
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn write_reg(addr: usize, value: u32) {
    unsafe { core::ptr::write_volatile(addr as *mut u32, value) }
}

/// Read a register with a 16-bit access
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn read_reg16(addr: usize) -> u16 {
    unsafe { core::ptr::read_volatile(addr as *const u16) }
}

/// Write a register with a 16-bit access
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn write_reg16(addr: usize, value: u16) {
    unsafe { core::ptr::write_volatile(addr as *mut u16, value) }
}

/// Read a register with an 8-bit access
///
/// Needed for data registers whose FIFO pops by access width.
///
/// # Safety
/// The caller must ensure the address is valid.
#[inline(always)]
pub unsafe fn read_reg8(addr: usize) -> u8 {
    unsafe { core::ptr::read_volatile(addr as *const u8) }
}

/// Write a register with an 8-bit access
///
/// # Safety
/// The caller must ensure the address is valid.
#[inline(always)]
pub unsafe fn write_reg8(addr: usize, value: u8) {
    unsafe { core::ptr::write_volatile(addr as *mut u8, value) }
}

/// Modify a register using a read-modify-write operation
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn modify_reg<F>(addr: usize, f: F)
where
    F: FnOnce(u32) -> u32,
{
    // SAFETY: caller guarantees address validity
    let value = unsafe { read_reg(addr) };
    unsafe { write_reg(addr, f(value)) }
}

/// Set bits in a register (read-modify-write)
///
/// # Safety
/// The caller must ensure the address is valid and properly aligned.
#[inline(always)]
pub unsafe fn set_bits(addr: usize, bits: u32) {
    // SAFETY: caller guarantees address validity
    unsafe { modify_reg(addr, |v| v | bits) }
}

// =============================================================================
// Register Access Macros
// =============================================================================

/// Generate read/write trait methods for a register at `self.base + offset`.
///
/// # Example
/// ```ignore
/// impl I2cRegisters for I2cMmio {
///     mmio_rw!(cr1, write_cr1, CR1_OFFSET, "Control register 1");
/// }
/// ```
macro_rules! mmio_rw {
    ($read_fn:ident, $write_fn:ident, $offset:expr, $doc:expr) => {
        #[doc = concat!("Read ", $doc)]
        #[inline(always)]
        fn $read_fn(&self) -> u32 {
            // SAFETY: base is a valid peripheral block for this instance
            unsafe { $crate::register::read_reg(self.base + $offset) }
        }

        #[doc = concat!("Write ", $doc)]
        #[inline(always)]
        fn $write_fn(&self, value: u32) {
            // SAFETY: base is a valid peripheral block for this instance
            unsafe { $crate::register::write_reg(self.base + $offset, value) }
        }
    };
}

/// Generate a read-only trait method for a register.
macro_rules! mmio_ro {
    ($read_fn:ident, $offset:expr, $doc:expr) => {
        #[doc = concat!("Read ", $doc)]
        #[inline(always)]
        fn $read_fn(&self) -> u32 {
            // SAFETY: base is a valid peripheral block for this instance
            unsafe { $crate::register::read_reg(self.base + $offset) }
        }
    };
}

/// Generate a write-only trait method for a register.
macro_rules! mmio_wo {
    ($write_fn:ident, $offset:expr, $doc:expr) => {
        #[doc = concat!("Write ", $doc)]
        #[inline(always)]
        fn $write_fn(&self, value: u32) {
            // SAFETY: base is a valid peripheral block for this instance
            unsafe { $crate::register::write_reg(self.base + $offset, value) }
        }
    };
}

pub(crate) use mmio_ro;
pub(crate) use mmio_rw;
pub(crate) use mmio_wo;
