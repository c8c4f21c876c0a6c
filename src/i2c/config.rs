//! Configuration for the two-wire engine

use crate::constants::I2C_MAX_ADDRESS;
use crate::dma::{DmaChannels, DmaPriority};
use crate::error::{ConfigError, ConfigResult};
use crate::hal::Priority;
use crate::register::i2c::{TIMING_100K_48MHZ, TIMING_400K_48MHZ};

/// Bus speed presets for a 48 MHz kernel clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BusSpeed {
    /// 100 kHz standard mode
    #[default]
    Standard,
    /// 400 kHz fast mode
    Fast,
}

impl BusSpeed {
    /// TIMINGR value for this speed
    #[must_use]
    pub const fn timing(self) -> u32 {
        match self {
            BusSpeed::Standard => TIMING_100K_48MHZ,
            BusSpeed::Fast => TIMING_400K_48MHZ,
        }
    }
}

/// Two-wire engine configuration
///
/// # Example
///
/// ```ignore
/// let config = I2cConfig::new()
///     .with_speed(BusSpeed::Fast)
///     .with_dma_channels(I2cInstance::I2c1.default_dma_channels());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Raw TIMINGR value
    pub timing: u32,
    /// Own 7-bit address, if the block should answer as a target
    pub own_address: Option<u8>,
    /// Analog noise filter enabled
    pub analog_filter: bool,
    /// Digital noise filter length in kernel clocks (0..=15)
    pub digital_filter: u8,
    /// DMA channel pair, if DMA may be used
    pub dma: Option<DmaChannels>,
    /// DMA arbitration priority
    pub dma_priority: DmaPriority,
    /// Interrupt priority of the peripheral line
    pub irq_priority: Priority,
}

impl I2cConfig {
    /// 100 kHz, filters at reset defaults, no DMA
    pub const fn new() -> Self {
        Self {
            timing: TIMING_100K_48MHZ,
            own_address: None,
            analog_filter: true,
            digital_filter: 0,
            dma: None,
            dma_priority: DmaPriority::High,
            irq_priority: Priority::P2,
        }
    }

    /// Use a speed preset
    #[must_use]
    pub const fn with_speed(mut self, speed: BusSpeed) -> Self {
        self.timing = speed.timing();
        self
    }

    /// Use a raw TIMINGR value
    #[must_use]
    pub const fn with_timing(mut self, timing: u32) -> Self {
        self.timing = timing;
        self
    }

    /// Set the own address
    #[must_use]
    pub const fn with_own_address(mut self, address: u8) -> Self {
        self.own_address = Some(address);
        self
    }

    /// Enable or disable the analog filter
    #[must_use]
    pub const fn with_analog_filter(mut self, enabled: bool) -> Self {
        self.analog_filter = enabled;
        self
    }

    /// Set the digital filter length (clamped to 15)
    #[must_use]
    pub const fn with_digital_filter(mut self, clocks: u8) -> Self {
        self.digital_filter = if clocks > 15 { 15 } else { clocks };
        self
    }

    /// Allow DMA on the given channel pair
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

    /// Check the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        match self.own_address {
            Some(addr) if addr > I2C_MAX_ADDRESS => Err(ConfigError::InvalidAddress),
            _ => Ok(()),
        }
    }
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = I2cConfig::new()
            .with_speed(BusSpeed::Fast)
            .with_own_address(0x12)
            .with_digital_filter(40)
            .with_dma_channels(DmaChannels::new(4, 5));

        assert_eq!(config.timing, 0x0010_0106);
        assert_eq!(config.own_address, Some(0x12));
        assert_eq!(config.digital_filter, 15);
        assert_eq!(config.dma, Some(DmaChannels::new(4, 5)));
    }

    #[test]
    fn eight_bit_own_address_is_rejected() {
        let config = I2cConfig::new().with_own_address(0x80);
        assert_eq!(config.validate(), Err(ConfigError::InvalidAddress));
        assert!(I2cConfig::default().validate().is_ok());
    }
}
