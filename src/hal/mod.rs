//! Collaborators outside the transaction engines
//!
//! - [`clock`]: peripheral clock gating ([`ClockGate`], [`Rcc`])
//! - [`interrupt`]: interrupt line control ([`InterruptController`], [`Nvic`])

pub mod clock;
pub mod interrupt;

pub use clock::{ClockGate, Peripheral, Rcc};
pub use interrupt::{Interrupt, InterruptController, Nvic, Priority};
