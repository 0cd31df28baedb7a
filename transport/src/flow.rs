//! # Flow Control
//!
//! Backpressure runs in one direction only. When the event queue fills,
//! the RDYN interrupt is masked so the device cannot start another
//! transaction; it is unmasked by the first dequeue out of the full queue.
//!
//! Toward the device there is no signal beyond REQN itself: it is only
//! lowered while commands are pending, and `send` refuses new commands once
//! the command queue is full.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use log::trace;

use crate::config::LinkMode;
use crate::error::{line_error, Result};
use crate::traits::ReadyInterrupt;
use crate::transport::Transport;

/// Snapshot of the handshake lines as the host drives them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct LineState {
    /// REQN is held low
    pub request_asserted: bool,
    /// The RDYN interrupt source is masked for backpressure
    pub ready_masked: bool,
    pub mode: LinkMode,
}

impl LineState {
    pub(crate) const fn new(mode: LinkMode) -> Self {
        Self {
            request_asserted: false,
            ready_masked: false,
            mode,
        }
    }
}

impl<SPI, RDY, REQ, IRQ, const N: usize> Transport<SPI, RDY, REQ, IRQ, N>
where
    SPI: SpiBus<u8>,
    RDY: InputPin,
    REQ: OutputPin,
    IRQ: ReadyInterrupt,
{
    /// Pull REQN low
    pub(crate) fn assert_request(&mut self) -> Result<()> {
        self.reqn.set_low().map_err(line_error)?;
        self.line.request_asserted = true;
        Ok(())
    }

    /// Let REQN go high
    pub(crate) fn release_request(&mut self) -> Result<()> {
        self.reqn.set_high().map_err(line_error)?;
        self.line.request_asserted = false;
        Ok(())
    }

    /// Mask RDYN if the last enqueue filled the event queue
    pub(crate) fn throttle_if_saturated(&mut self) {
        if self.line.mode != LinkMode::EdgeInterrupt || self.line.ready_masked {
            return;
        }

        if self.queues.events.is_full() {
            self.irq.mask();
            self.line.ready_masked = true;
            trace!("event queue full, RDYN masked");
        }
    }

    /// Unmask RDYN after a dequeue from a queue that was full
    pub(crate) fn resume_after_drain(&mut self, was_full: bool) {
        if !was_full || self.line.mode != LinkMode::EdgeInterrupt {
            return;
        }

        self.irq.unmask();
        self.line.ready_masked = false;
        trace!("event queue drained, RDYN unmasked");
    }
}
