//! Link configuration.
//!
//! Pin assignment is carried by the concrete pin objects handed to
//! [`Transport::new`](crate::Transport::new); what remains here is the
//! servicing mode and the bus timing the board code should apply.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How the ready line is observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum LinkMode {
    /// A falling edge on RDYN runs the handler from interrupt context
    EdgeInterrupt,
    /// RDYN is sampled at the start of every event query
    #[default]
    Polled,
}

/// Configuration for a transport link
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkConfig {
    /// Servicing mode, fixed for the life of the link
    pub mode: LinkMode,
    /// Log every sent command and received event
    pub debug: bool,
    /// Bus clock for the board's SPI setup (the device tops out at 3 MHz)
    ///
    /// The transport never reads this; board code applies it when it
    /// configures the bus it hands to [`Transport::new`](crate::Transport::new).
    pub spi_frequency_hz: u32,
}

impl LinkConfig {
    pub fn with_mode(mut self, mode: LinkMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_spi_frequency(mut self, hz: u32) -> Self {
        self.spi_frequency_hz = hz;
        self
    }

    #[inline]
    pub fn is_interrupt_driven(&self) -> bool {
        self.mode == LinkMode::EdgeInterrupt
    }
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            mode: LinkMode::Polled,
            debug: false,
            spi_frequency_hz: 2_000_000,
        }
    }
}
