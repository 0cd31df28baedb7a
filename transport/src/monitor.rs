//! # Ready-Line Monitor
//!
//! Decides when the transaction engine runs. Both modes end up in the
//! same handler body:
//!
//! - **Edge interrupt**: the board's RDYN ISR calls
//!   [`Transport::on_ready_interrupt`].
//! - **Polled**: every event query samples RDYN first and runs the handler
//!   inline when it is low.
//!
//! When RDYN is high on a polled link and commands are waiting, REQN is
//! lowered speculatively so the device starts a transaction when it can.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use log::trace;

use crate::config::LinkMode;
use crate::error::{line_error, Result};
use crate::traits::ReadyInterrupt;
use crate::transport::Transport;

impl<SPI, RDY, REQ, IRQ, const N: usize> Transport<SPI, RDY, REQ, IRQ, N>
where
    SPI: SpiBus<u8>,
    RDY: InputPin,
    REQ: OutputPin,
    IRQ: ReadyInterrupt,
{
    /// Body of the RDYN handler for an interrupt-driven link
    ///
    /// Runs one transaction and queues the event it produced.
    ///
    /// # Panics
    ///
    /// If the event queue is already full. Backpressure masks RDYN before
    /// that can happen, so reaching it means the link state is corrupt.
    pub fn on_ready_interrupt(&mut self) -> Result<()> {
        self.handle_ready_line()
    }

    /// Run one monitor check on a polled link; no-op on an interrupt link
    ///
    /// Lets the caller move commands out without reading events.
    pub fn poll(&mut self) -> Result<()> {
        if self.line.mode == LinkMode::Polled {
            self.query_device()?;
        }
        Ok(())
    }

    pub(crate) fn handle_ready_line(&mut self) -> Result<()> {
        if self.line.mode == LinkMode::EdgeInterrupt {
            self.irq.detach();
        }

        let incoming = self.run_transaction()?;
        if incoming.is_empty() {
            return Ok(());
        }

        if self.queues.events.enqueue(&incoming).is_err() {
            panic!("ACI event queue overflow");
        }
        self.stats.events_received = self.stats.events_received.wrapping_add(1);
        self.throttle_if_saturated();

        Ok(())
    }

    fn ready_asserted(&mut self) -> Result<bool> {
        self.rdyn.is_low().map_err(line_error)
    }

    /// Sample RDYN and service it, or invite a transaction
    pub(crate) fn query_device(&mut self) -> Result<()> {
        // A polled link has no interrupt to mask; leaving RDYN unserviced
        // holds the device off until an event is taken
        if self.queues.events.is_full() {
            trace!("event queue full, RDYN left pending");
            return Ok(());
        }

        if self.ready_asserted()? {
            return self.handle_ready_line();
        }

        if !self.queues.commands.is_empty() {
            self.assert_request()?;
        }
        Ok(())
    }
}
