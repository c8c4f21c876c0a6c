//! Centralized Constants
//!
//! Numeric limits and defaults shared by the transaction engines.
//!
//! Hardware register bit definitions remain in their respective modules
//! (`register/dma.rs`, `register/i2c.rs`, etc.) as they are specific to
//! those hardware blocks.

// =============================================================================
// DMA
// =============================================================================

/// Number of channels on the DMA1 controller
#[cfg(not(feature = "stm32f072"))]
pub const DMA_CHANNELS: usize = 5;

/// Number of channels on the DMA1 controller
#[cfg(feature = "stm32f072")]
pub const DMA_CHANNELS: usize = 7;

/// Largest item count a single DMA program can carry (CNDTR is 16 bits)
pub const DMA_MAX_ITEMS: usize = 0xFFFF;

// =============================================================================
// Two-Wire
// =============================================================================

/// Largest chunk expressible in the NBYTES field
pub const I2C_MAX_CHUNK: usize = 255;

/// Largest 7-bit bus address
pub const I2C_MAX_ADDRESS: u8 = 0x7F;

// =============================================================================
// Synchronous Bus
// =============================================================================

/// Pattern clocked out when no transmit buffer is supplied (8-bit items)
pub const SPI_DUMMY_BYTE: u8 = 0xFF;

/// Pattern clocked out when no transmit buffer is supplied (16-bit items)
pub const SPI_DUMMY_WORD: u16 = 0xFFFF;

// =============================================================================
// Timing
// =============================================================================

/// Upper bound on status polls while waiting for a busy flag in ISR context
pub const BUSY_SPIN_LIMIT: u32 = 100_000;

/// Interval between completion polls in the bounded wait helpers
pub const WAIT_POLL_INTERVAL_US: u32 = 10;

/// Default peripheral clock frequency (HSI48 / PLL at 48 MHz)
pub const DEFAULT_PCLK_HZ: u32 = 48_000_000;

/// Default serial baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;
