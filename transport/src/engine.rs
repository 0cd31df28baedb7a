//! # Transaction Engine
//!
//! One call runs exactly one full-duplex exchange with REQN held low.
//!
//! ## Byte Layout
//!
//! ```text
//! wire byte │ host → device      │ device → host
//! ──────────┼────────────────────┼──────────────────
//!     0     │ length Lh          │ status
//!     1     │ payload[0]         │ length Ld
//!   2..     │ payload[1..]       │ payload[0..]
//! ```
//!
//! The host has already shipped one payload byte by the time it learns
//! `Ld`, so it needs `Lh - 1` more while the device needs `Ld`. The larger
//! of the two is clocked, capped at [`MAX_PACKET_LEN`] whatever either
//! length byte claims.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use log::{debug, warn};

use crate::config::LinkMode;
use crate::error::{spi_error, Result};
use crate::packet::Packet;
use crate::traits::ReadyInterrupt;
use crate::transport::Transport;
use crate::MAX_PACKET_LEN;

/// Bytes clocked after the two header bytes for a host length `host_len`
/// and a device length `device_len`
pub fn transfer_len(host_len: usize, device_len: usize) -> usize {
    let wanted = if host_len == 0 {
        device_len
    } else {
        device_len.max(host_len - 1)
    };
    wanted.min(MAX_PACKET_LEN)
}

fn exchange_byte<SPI: SpiBus<u8>>(spi: &mut SPI, out: u8) -> Result<u8> {
    let mut word = [out];
    spi.transfer_in_place(&mut word).map_err(spi_error)?;
    Ok(word[0])
}

/// Clock `outgoing` out and assemble what the device sends back
pub(crate) fn exchange<SPI: SpiBus<u8>>(spi: &mut SPI, outgoing: &Packet) -> Result<Packet> {
    let mut incoming = Packet::EMPTY;

    incoming.status = exchange_byte(spi, outgoing.wire_byte(0))?;
    let device_len = exchange_byte(spi, outgoing.wire_byte(1))? as usize;

    let remaining = transfer_len(outgoing.len(), device_len);
    for i in 0..remaining {
        incoming.buffer[i + 1] = exchange_byte(spi, outgoing.wire_byte(i + 2))?;
    }
    spi.flush().map_err(spi_error)?;

    incoming.buffer[0] = device_len.min(MAX_PACKET_LEN) as u8;
    Ok(incoming)
}

impl<SPI, RDY, REQ, IRQ, const N: usize> Transport<SPI, RDY, REQ, IRQ, N>
where
    SPI: SpiBus<u8>,
    RDY: InputPin,
    REQ: OutputPin,
    IRQ: ReadyInterrupt,
{
    /// Run one transaction and return the packet the device sent
    ///
    /// Sends the oldest command if there is one, otherwise clocks an idle
    /// packet. The command leaves its queue only once it went out whole, so
    /// a failed exchange sends it again next time. The returned packet may
    /// be empty; queuing it is the caller's job.
    ///
    /// On every exit REQN is released and, on an interrupt link, the RDYN
    /// handler is attached again.
    pub(crate) fn run_transaction(&mut self) -> Result<Packet> {
        let command = self.queues.commands.peek();
        let outgoing = command.unwrap_or(Packet::EMPTY);
        let exchanged = match self.assert_request() {
            Ok(()) => exchange(&mut self.spi, &outgoing),
            Err(e) => Err(e),
        };

        let released = self.release_request();
        if self.line.mode == LinkMode::EdgeInterrupt {
            self.irq.attach();
        }

        let incoming = match exchanged {
            Ok(incoming) => incoming,
            Err(e) => {
                warn!("transaction aborted: {}", e);
                return Err(e);
            }
        };

        self.stats.transactions = self.stats.transactions.wrapping_add(1);
        if command.is_some() {
            self.queues.commands.discard();
            self.stats.commands_sent = self.stats.commands_sent.wrapping_add(1);
        }
        debug!(
            "transaction: {} bytes out, {} bytes in",
            outgoing.len(),
            incoming.len()
        );
        released?;

        // Back-to-back: request the next transaction right away
        if !self.queues.commands.is_empty() {
            self.assert_request()?;
        }

        Ok(incoming)
    }
}
