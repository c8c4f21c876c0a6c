//! Configuration for the synchronous-bus engine

use crate::dma::{DmaChannels, DmaPriority, XferEngine};
use crate::hal::Priority;
use crate::register::spi::{
    CR1_BR_SHIFT, CR1_CPHA, CR1_CPOL, CR1_LSBFIRST, CR1_MSTR, CR1_SSI, CR1_SSM, CR2_DS_SHIFT,
    CR2_FRXTH, CR2_NSSP, CR2_SSOE,
};

/// Clock polarity/phase mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SpiMode {
    /// CPOL=0, CPHA=0
    #[default]
    Mode0,
    /// CPOL=0, CPHA=1
    Mode1,
    /// CPOL=1, CPHA=0
    Mode2,
    /// CPOL=1, CPHA=1
    Mode3,
}

impl SpiMode {
    const fn bits(self) -> u32 {
        match self {
            SpiMode::Mode0 => 0,
            SpiMode::Mode1 => CR1_CPHA,
            SpiMode::Mode2 => CR1_CPOL,
            SpiMode::Mode3 => CR1_CPOL | CR1_CPHA,
        }
    }
}

/// Peripheral clock divisor for SCK
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BaudDivider {
    /// fPCLK/2
    Div2,
    /// fPCLK/4
    Div4,
    /// fPCLK/8
    #[default]
    Div8,
    /// fPCLK/16
    Div16,
    /// fPCLK/32
    Div32,
    /// fPCLK/64
    Div64,
    /// fPCLK/128
    Div128,
    /// fPCLK/256
    Div256,
}

impl BaudDivider {
    /// Numeric divisor
    #[must_use]
    pub const fn divisor(self) -> u32 {
        2 << (self as u32)
    }
}

/// Bit order on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Most significant bit first
    #[default]
    MsbFirst,
    /// Least significant bit first
    LsbFirst,
}

/// Item size
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataSize {
    /// 8-bit items
    #[default]
    Eight,
    /// 16-bit items, packed little-endian in byte buffers
    Sixteen,
}

impl DataSize {
    /// Bytes per item
    #[must_use]
    pub const fn bytes(self) -> usize {
        match self {
            DataSize::Eight => 1,
            DataSize::Sixteen => 2,
        }
    }
}

/// Chip-select handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NssMode {
    /// Driven by the engine through an output pin
    Software,
    /// Driven by the peripheral
    Hardware {
        /// Pulse NSS high between items
        pulse: bool,
    },
}

/// Synchronous-bus engine configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock mode
    pub mode: SpiMode,
    /// SCK divisor
    pub divider: BaudDivider,
    /// Bit order
    pub bit_order: BitOrder,
    /// Item size
    pub data_size: DataSize,
    /// Chip-select handling
    pub nss: NssMode,
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

impl SpiConfig {
    /// Mode 0, fPCLK/8, 8-bit MSB first, software chip-select, IRQ both ways
    pub const fn new() -> Self {
        Self {
            mode: SpiMode::Mode0,
            divider: BaudDivider::Div8,
            bit_order: BitOrder::MsbFirst,
            data_size: DataSize::Eight,
            nss: NssMode::Software,
            tx_engine: XferEngine::Irq,
            rx_engine: XferEngine::Irq,
            dma_priority: DmaPriority::High,
            dma: None,
            irq_priority: Priority::P2,
        }
    }

    /// Set the clock mode
    #[must_use]
    pub const fn with_mode(mut self, mode: SpiMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the SCK divisor
    #[must_use]
    pub const fn with_divider(mut self, divider: BaudDivider) -> Self {
        self.divider = divider;
        self
    }

    /// Set the bit order
    #[must_use]
    pub const fn with_bit_order(mut self, order: BitOrder) -> Self {
        self.bit_order = order;
        self
    }

    /// Set the item size
    #[must_use]
    pub const fn with_data_size(mut self, size: DataSize) -> Self {
        self.data_size = size;
        self
    }

    /// Set chip-select handling
    #[must_use]
    pub const fn with_nss(mut self, nss: NssMode) -> Self {
        self.nss = nss;
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

    /// Whether transfers run over DMA
    ///
    /// Full-duplex master mode clocks both directions together, so one
    /// DMA-backed direction puts both on DMA.
    #[must_use]
    pub const fn uses_dma(&self) -> bool {
        matches!(self.tx_engine, XferEngine::Dma) || matches!(self.rx_engine, XferEngine::Dma)
    }

    /// CR1 value, without SPE
    #[must_use]
    pub const fn cr1(&self) -> u32 {
        let mut cr1 = CR1_MSTR | self.mode.bits() | ((self.divider as u32) << CR1_BR_SHIFT);
        if matches!(self.bit_order, BitOrder::LsbFirst) {
            cr1 |= CR1_LSBFIRST;
        }
        if matches!(self.nss, NssMode::Software) {
            cr1 |= CR1_SSM | CR1_SSI;
        }
        cr1
    }

    /// CR2 value, with no interrupt or DMA enables
    #[must_use]
    pub const fn cr2(&self) -> u32 {
        let bits = self.data_size.bytes() as u32 * 8;
        let mut cr2 = (bits - 1) << CR2_DS_SHIFT;
        if matches!(self.data_size, DataSize::Eight) {
            cr2 |= CR2_FRXTH;
        }
        if let NssMode::Hardware { pulse } = self.nss {
            cr2 |= CR2_SSOE;
            if pulse {
                cr2 |= CR2_NSSP;
            }
        }
        cr2
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self::new()
    }
}
