//! Configuration for the serial-link engine

use crate::constants::{DEFAULT_BAUD_RATE, DEFAULT_PCLK_HZ};
use crate::dma::{DmaChannels, DmaPriority, XferEngine};
use crate::error::{ConfigError, ConfigResult};
use crate::hal::Priority;
use crate::register::usart::{CR1_M, CR1_OVER8, CR1_PCE, CR1_PS, CR2_STOP_SHIFT};

/// Data bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WordLength {
    /// 8 bits (including parity when enabled)
    #[default]
    Eight,
    /// 9 bits (including parity when enabled)
    Nine,
}

/// Parity mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Parity {
    /// No parity bit
    #[default]
    None,
    /// Even parity
    Even,
    /// Odd parity
    Odd,
}

/// Stop bits per frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StopBits {
    /// One stop bit
    #[default]
    One,
    /// Two stop bits
    Two,
}

/// Receiver oversampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Oversampling {
    /// 16 samples per bit
    #[default]
    By16,
    /// 8 samples per bit, for higher baud rates
    By8,
}

/// Serial-link engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SerialConfig {
    /// Baud rate
    pub baud_rate: u32,
    /// Peripheral kernel clock in Hz
    pub pclk_hz: u32,
    /// Word length
    pub word_length: WordLength,
    /// Parity
    pub parity: Parity,
    /// Stop bits
    pub stop_bits: StopBits,
    /// Oversampling
    pub oversampling: Oversampling,
    /// Transmit data path
    pub tx_engine: XferEngine,
    /// Receive data path
    pub rx_engine: XferEngine,
    /// DMA arbitration priority
    pub dma_priority: DmaPriority,
    /// DMA channel pair
    pub dma: Option<DmaChannels>,
    /// Interrupt priority of the peripheral line
    pub irq_priority: Priority,
}

impl SerialConfig {
    /// 115200 8N1 at 48 MHz, interrupt-driven both ways
    pub const fn new() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            pclk_hz: DEFAULT_PCLK_HZ,
            word_length: WordLength::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            oversampling: Oversampling::By16,
            tx_engine: XferEngine::Irq,
            rx_engine: XferEngine::Irq,
            dma_priority: DmaPriority::Medium,
            dma: None,
            irq_priority: Priority::P2,
        }
    }

    /// Set the baud rate
    #[must_use]
    pub const fn with_baud_rate(mut self, baud: u32) -> Self {
        self.baud_rate = baud;
        self
    }

    /// Set the peripheral clock
    #[must_use]
    pub const fn with_pclk(mut self, hz: u32) -> Self {
        self.pclk_hz = hz;
        self
    }

    /// Set the word length
    #[must_use]
    pub const fn with_word_length(mut self, length: WordLength) -> Self {
        self.word_length = length;
        self
    }

    /// Set the parity
    #[must_use]
    pub const fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    /// Set the stop bits
    #[must_use]
    pub const fn with_stop_bits(mut self, stop: StopBits) -> Self {
        self.stop_bits = stop;
        self
    }

    /// Set the oversampling
    #[must_use]
    pub const fn with_oversampling(mut self, oversampling: Oversampling) -> Self {
        self.oversampling = oversampling;
        self
    }

    /// Set the per-direction data paths
    #[must_use]
    pub const fn with_engines(mut self, tx: XferEngine, rx: XferEngine) -> Self {
        self.tx_engine = tx;
        self.rx_engine = rx;
        self
    }

    /// Set the DMA channel pair
    #[must_use]
    pub const fn with_dma_channels(mut self, channels: DmaChannels) -> Self {
        self.dma = Some(channels);
        self
    }

    /// Set the DMA arbitration priority
    #[must_use]
    pub const fn with_dma_priority(mut self, priority: DmaPriority) -> Self {
        self.dma_priority = priority;
        self
    }

    /// Set the interrupt priority
    #[must_use]
    pub const fn with_irq_priority(mut self, priority: Priority) -> Self {
        self.irq_priority = priority;
        self
    }

    /// Baud rate register value
    ///
    /// With 16× oversampling BRR is the rounded divisor. With 8× the
    /// fraction is expressed in eighths and shifted down one bit.
    pub fn brr(&self) -> ConfigResult<u32> {
        if self.pclk_hz == 0 {
            return Err(ConfigError::InvalidClock);
        }
        if self.baud_rate == 0 {
            return Err(ConfigError::InvalidBaudRate);
        }
        let pclk = u64::from(self.pclk_hz);
        let baud = u64::from(self.baud_rate);

        let brr = match self.oversampling {
            Oversampling::By16 => (pclk + baud / 2) / baud,
            Oversampling::By8 => {
                let div = (100 * pclk + 4 * baud) / (8 * baud);
                let mantissa = div / 100;
                let fraction = (div - 100 * mantissa) * 8 / 100;
                (mantissa << 4) | (fraction & 0x7)
            }
        };
        if !(16..=0xFFFF).contains(&brr) {
            return Err(ConfigError::InvalidBaudRate);
        }
        Ok(brr as u32)
    }

    /// CR1 frame format bits
    #[must_use]
    pub const fn cr1_format(&self) -> u32 {
        let mut cr1 = 0;
        if matches!(self.word_length, WordLength::Nine) {
            cr1 |= CR1_M;
        }
        match self.parity {
            Parity::None => {}
            Parity::Even => cr1 |= CR1_PCE,
            Parity::Odd => cr1 |= CR1_PCE | CR1_PS,
        }
        if matches!(self.oversampling, Oversampling::By8) {
            cr1 |= CR1_OVER8;
        }
        cr1
    }

    /// CR2 stop-bit field
    #[must_use]
    pub const fn cr2_stop(&self) -> u32 {
        match self.stop_bits {
            StopBits::One => 0,
            StopBits::Two => 2 << CR2_STOP_SHIFT,
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brr_by16_rounds_divisor() {
        // 48 MHz / 115200 = 416.67
        assert_eq!(SerialConfig::new().brr(), Ok(417));
        let config = SerialConfig::new().with_baud_rate(9600);
        assert_eq!(config.brr(), Ok(5000));
    }

    #[test]
    fn brr_by8_packs_fraction() {
        let config = SerialConfig::new()
            .with_baud_rate(115_200)
            .with_oversampling(Oversampling::By8);
        // div = (4_800_000_000 + 460_800) / 921_600 = 5208
        // mantissa 52, fraction (8 * 8) / 100 = 0
        assert_eq!(config.brr(), Ok(52 << 4));

        let config = config.with_baud_rate(1_000_000);
        // div = 600, mantissa 6, fraction 0
        assert_eq!(config.brr(), Ok(6 << 4));
    }

    #[test]
    fn brr_rejects_unreachable_rates() {
        assert_eq!(
            SerialConfig::new().with_baud_rate(0).brr(),
            Err(ConfigError::InvalidBaudRate)
        );
        assert_eq!(
            SerialConfig::new().with_baud_rate(6_000_000).brr(),
            Err(ConfigError::InvalidBaudRate)
        );
        assert_eq!(
            SerialConfig::new().with_pclk(0).brr(),
            Err(ConfigError::InvalidClock)
        );
    }

    #[test]
    fn frame_format_bits() {
        let config = SerialConfig::new()
            .with_word_length(WordLength::Nine)
            .with_parity(Parity::Odd)
            .with_stop_bits(StopBits::Two);
        assert_eq!(config.cr1_format(), CR1_M | CR1_PCE | CR1_PS);
        assert_eq!(config.cr2_stop(), 2 << CR2_STOP_SHIFT);
        assert_eq!(SerialConfig::default().cr1_format(), 0);
    }
}
