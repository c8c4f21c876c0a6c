//! Error types for the STM32F0 transaction engines
//!
//! Errors are organized by domain:
//! - [`DmaError`]: DMA router parameter failures
//! - [`I2cError`]: Two-wire transaction outcomes and start failures
//! - [`SpiError`]: Synchronous-bus conditions reported through the error callback
//! - [`SerialError`]: Serial-link line conditions reported through the error callback
//! - [`RequestError`]: Synchronous rejections of a synchronous-bus request
//! - [`ConfigError`]: Initialization and configuration failures
//!
//! The unified [`Error`] enum wraps all domain errors.

// =============================================================================
// Configuration Errors
// =============================================================================

/// Configuration and initialization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Baud rate is zero or cannot be reached from the peripheral clock
    InvalidBaudRate,
    /// Peripheral clock frequency is zero
    InvalidClock,
    /// Own/target bus address does not fit in 7 bits
    InvalidAddress,
    /// A direction selects DMA but no channel pair is configured and attached
    DmaUnavailable,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ConfigError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            ConfigError::InvalidBaudRate => "invalid baud rate",
            ConfigError::InvalidClock => "invalid peripheral clock",
            ConfigError::InvalidAddress => "invalid bus address",
            ConfigError::DmaUnavailable => "DMA channels not configured or attached",
        }
    }
}

// =============================================================================
// DMA Errors
// =============================================================================

/// DMA router errors
///
/// The router never interprets hardware event flags; these only cover
/// invalid requests made to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DmaError {
    /// Channel number outside the controller's channel range
    InvalidChannel,
    /// Item count does not fit the 16-bit transfer counter
    InvalidCount,
}

impl core::fmt::Display for DmaError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl DmaError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            DmaError::InvalidChannel => "invalid DMA channel",
            DmaError::InvalidCount => "DMA item count exceeds the transfer counter",
        }
    }
}

// =============================================================================
// I2C Errors
// =============================================================================

/// Two-wire transaction errors
///
/// `Param` is only ever returned synchronously from a start request; the
/// others are delivered as the transaction outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum I2cError {
    /// Address or data byte not acknowledged
    Nack,
    /// Misplaced START or STOP detected on the bus
    Bus,
    /// Arbitration lost to another master
    ArbitrationLost,
    /// Data overrun or underrun
    Overrun,
    /// Bus timeout, or a bounded wait expired
    Timeout,
    /// Invalid request (busy engine, empty transfer, bad address, no DMA channel)
    Param,
    /// DMA transfer error on one of the engine's channels
    Dma,
}

impl core::fmt::Display for I2cError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl I2cError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            I2cError::Nack => "not acknowledged",
            I2cError::Bus => "bus error",
            I2cError::ArbitrationLost => "arbitration lost",
            I2cError::Overrun => "overrun",
            I2cError::Timeout => "timeout",
            I2cError::Param => "invalid parameter",
            I2cError::Dma => "DMA transfer error",
        }
    }
}

impl embedded_hal::i2c::Error for I2cError {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        use embedded_hal::i2c::{ErrorKind, NoAcknowledgeSource};
        match self {
            I2cError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown),
            I2cError::Bus => ErrorKind::Bus,
            I2cError::ArbitrationLost => ErrorKind::ArbitrationLoss,
            I2cError::Overrun => ErrorKind::Overrun,
            I2cError::Timeout | I2cError::Param | I2cError::Dma => ErrorKind::Other,
        }
    }
}

// =============================================================================
// SPI Errors
// =============================================================================

/// Synchronous-bus error conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiError {
    /// Master mode fault (NSS pulled low by another master)
    ModeFault,
    /// Receive overrun
    Overrun,
    /// CRC mismatch
    Crc,
    /// DMA transfer error on one of the engine's channels
    Dma,
}

impl core::fmt::Display for SpiError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SpiError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SpiError::ModeFault => "mode fault",
            SpiError::Overrun => "overrun",
            SpiError::Crc => "CRC error",
            SpiError::Dma => "DMA transfer error",
        }
    }
}

/// Synchronous rejection of a synchronous-bus request
///
/// Nothing is committed to hardware when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RequestError {
    /// A transaction is already in flight
    Busy,
    /// Zero item count, or a buffer shorter than the item count
    InvalidLength,
    /// DMA requested but the channel pair is not configured and attached
    DmaUnavailable,
    /// Operation needs software chip-select
    HardwareChipSelect,
    /// A bounded wait expired
    Timeout,
}

impl core::fmt::Display for RequestError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl RequestError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestError::Busy => "engine busy",
            RequestError::InvalidLength => "invalid transfer length",
            RequestError::DmaUnavailable => "DMA channels unavailable",
            RequestError::HardwareChipSelect => "requires software chip-select",
            RequestError::Timeout => "timeout",
        }
    }
}

// =============================================================================
// Serial Errors
// =============================================================================

/// Serial-link line errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SerialError {
    /// Receive overrun
    Overrun,
    /// Noise detected on a received frame
    Noise,
    /// Framing error (missing stop bit)
    Framing,
    /// Parity mismatch
    Parity,
    /// DMA transfer error on one of the engine's channels
    Dma,
}

impl core::fmt::Display for SerialError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl SerialError {
    /// Returns a human-readable description of the error
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            SerialError::Overrun => "overrun",
            SerialError::Noise => "noise",
            SerialError::Framing => "framing error",
            SerialError::Parity => "parity error",
            SerialError::Dma => "DMA transfer error",
        }
    }
}

impl embedded_io::Error for SerialError {
    fn kind(&self) -> embedded_io::ErrorKind {
        embedded_io::ErrorKind::Other
    }
}

// =============================================================================
// Unified Error Type
// =============================================================================

/// Unified error type wrapping all domain errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Configuration error
    Config(ConfigError),
    /// DMA router error
    Dma(DmaError),
    /// Two-wire error
    I2c(I2cError),
    /// Synchronous-bus error
    Spi(SpiError),
    /// Synchronous-bus request rejected
    Request(RequestError),
    /// Serial-link error
    Serial(SerialError),
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Config(e) => write!(f, "config: {e}"),
            Error::Dma(e) => write!(f, "dma: {e}"),
            Error::I2c(e) => write!(f, "i2c: {e}"),
            Error::Spi(e) => write!(f, "spi: {e}"),
            Error::Request(e) => write!(f, "request: {e}"),
            Error::Serial(e) => write!(f, "serial: {e}"),
        }
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Error::Config(e)
    }
}

impl From<DmaError> for Error {
    fn from(e: DmaError) -> Self {
        Error::Dma(e)
    }
}

impl From<I2cError> for Error {
    fn from(e: I2cError) -> Self {
        Error::I2c(e)
    }
}

impl From<SpiError> for Error {
    fn from(e: SpiError) -> Self {
        Error::Spi(e)
    }
}

impl From<RequestError> for Error {
    fn from(e: RequestError) -> Self {
        Error::Request(e)
    }
}

impl From<SerialError> for Error {
    fn from(e: SerialError) -> Self {
        Error::Serial(e)
    }
}

/// Result type alias using the unified Error
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Result type for configuration operations
pub type ConfigResult<T> = core::result::Result<T, ConfigError>;

/// Result type for DMA router operations
pub type DmaResult<T> = core::result::Result<T, DmaError>;

/// Result type for two-wire operations
pub type I2cResult<T> = core::result::Result<T, I2cError>;

/// Result type for synchronous-bus transfer outcomes
pub type SpiResult<T> = core::result::Result<T, SpiError>;

/// Result type for synchronous-bus requests
pub type RequestResult<T> = core::result::Result<T, RequestError>;

/// Result type for serial-link operations
pub type SerialResult<T> = core::result::Result<T, SerialError>;

// =============================================================================
// Tests
// =============================================================================
