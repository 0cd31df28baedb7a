//! # Transport Link
//!
//! [`Transport`] owns the bus, both handshake lines, the interrupt control
//! and the two packet queues of one link. It replaces process-wide state:
//! several links can coexist and tests can build one per case.
//!
//! ## Sharing With an Interrupt Handler
//!
//! In [`LinkMode::EdgeInterrupt`] the board's RDYN handler needs the same
//! `Transport` as the main loop, bus and REQN included. Put it in a
//! [`SharedLink`](crate::SharedLink) static and reach it from both sides
//! through that.

use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use log::{debug, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::{LinkConfig, LinkMode};
use crate::error::{Result, TransportError};
use crate::flow::LineState;
use crate::packet::Packet;
use crate::queue::LinkQueues;
use crate::traits::{NoInterrupt, ReadyInterrupt};
use crate::{MAX_PACKET_LEN, QUEUE_SIZE};

/// Counters kept by a link since it was created
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LinkStats {
    /// Completed bus transactions
    pub transactions: u32,
    /// Transactions that carried a command out
    pub commands_sent: u32,
    /// Events placed on the event queue
    pub events_received: u32,
    /// `send` calls refused (oversized or queue full)
    pub sends_rejected: u32,
}

/// Host side of one REQN/RDYN link
pub struct Transport<SPI, RDY, REQ, IRQ = NoInterrupt, const N: usize = QUEUE_SIZE> {
    pub(crate) spi: SPI,
    pub(crate) rdyn: RDY,
    pub(crate) reqn: REQ,
    pub(crate) irq: IRQ,
    pub(crate) queues: LinkQueues<N>,
    pub(crate) line: LineState,
    pub(crate) debug: bool,
    pub(crate) stats: LinkStats,
}

impl<SPI, RDY, REQ, IRQ, const N: usize> Transport<SPI, RDY, REQ, IRQ, N>
where
    SPI: SpiBus<u8>,
    RDY: InputPin,
    REQ: OutputPin,
    IRQ: ReadyInterrupt,
{
    /// Take ownership of the peripherals and bring the link to idle
    ///
    /// Both queues start empty, REQN is released, and on an interrupt link
    /// the RDYN handler is attached. Bus mode, bit order and clock must
    /// already be configured (see [`SPI_MODE`](crate::SPI_MODE) and
    /// [`LinkConfig::spi_frequency_hz`]).
    pub fn new(spi: SPI, rdyn: RDY, reqn: REQ, irq: IRQ, config: LinkConfig) -> Result<Self> {
        let mut transport = Self {
            spi,
            rdyn,
            reqn,
            irq,
            queues: LinkQueues::new(),
            line: LineState::new(config.mode),
            debug: config.debug,
            stats: LinkStats::default(),
        };
        transport.init()?;
        Ok(transport)
    }

    fn init(&mut self) -> Result<()> {
        self.queues.flush();
        self.release_request()?;

        if self.line.mode == LinkMode::EdgeInterrupt {
            self.irq.unmask();
            self.irq.attach();
        }

        debug!("ACI link up ({:?}, {} slot queues)", self.line.mode, N);
        Ok(())
    }

    /// Queue a command for the device and request a transaction
    ///
    /// Never blocks. `QueueFull` means "retry later", not a protocol error.
    /// `Ok` means the command is queued, even if REQN could not be driven.
    pub fn send(&mut self, packet: &Packet) -> Result<()> {
        let len = packet.len();
        if len > MAX_PACKET_LEN {
            self.stats.sends_rejected = self.stats.sends_rejected.wrapping_add(1);
            warn!("refusing {} byte command", len);
            return Err(TransportError::PacketTooLong { len });
        }

        if let Err(e) = self.queues.commands.enqueue(packet) {
            self.stats.sends_rejected = self.stats.sends_rejected.wrapping_add(1);
            return Err(e.into());
        }

        // The command is queued either way; a line fault here only delays
        // it until the next transaction or poll
        if let Err(e) = self.assert_request() {
            warn!("command queued but REQN not asserted: {}", e);
        }

        if self.debug {
            info!(target: "aci", "C{}", packet.dump());
        }
        Ok(())
    }

    /// Copy out the oldest event without removing it
    ///
    /// On a polled link RDYN is left unserviced while the event queue is
    /// full; only [`get_event`](Self::get_event) makes room again.
    pub fn peek_event(&mut self) -> Result<Option<Packet>> {
        if self.line.mode == LinkMode::Polled {
            self.query_device()?;
        }

        let event = self.queues.events.peek();
        if self.debug {
            if let Some(event) = &event {
                info!(target: "aci", " E{}", event.dump());
            }
        }
        Ok(event)
    }

    /// Remove and return the oldest event
    ///
    /// Taking an event out of a full queue lifts RDYN backpressure.
    pub fn get_event(&mut self) -> Result<Option<Packet>> {
        if self.line.mode == LinkMode::Polled {
            self.query_device()?;
        }

        let Some((event, was_full)) = self.queues.events.dequeue_from_full() else {
            return Ok(None);
        };

        if self.debug {
            info!(target: "aci", " E{}", event.dump());
        }

        self.resume_after_drain(was_full);
        Ok(Some(event))
    }

    pub fn command_queue_empty(&self) -> bool {
        self.queues.commands.is_empty()
    }

    pub fn command_queue_full(&self) -> bool {
        self.queues.commands.is_full()
    }

    pub fn event_queue_empty(&self) -> bool {
        self.queues.events.is_empty()
    }

    pub fn event_queue_full(&self) -> bool {
        self.queues.events.is_full()
    }

    /// Drop every queued command and event
    ///
    /// An interrupt link masked for backpressure is unmasked, since the
    /// event queue no longer has anything to drain.
    pub fn flush(&mut self) {
        self.queues.flush();
        self.resume_after_drain(true);
    }

    /// Toggle the per-packet diagnostic dump
    pub fn set_debug(&mut self, enable: bool) {
        self.debug = enable;
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn line_state(&self) -> LineState {
        self.line
    }

    /// Detach the RDYN handler and hand the peripherals back
    pub fn release(mut self) -> (SPI, RDY, REQ, IRQ) {
        if self.line.mode == LinkMode::EdgeInterrupt {
            self.irq.detach();
        }
        (self.spi, self.rdyn, self.reqn, self.irq)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embedded_hal::digital::{self, ErrorType as PinErrorType};
    use embedded_hal::spi::{self, ErrorType as SpiErrorType};

    /// Injected bus or pin failure
    #[derive(Debug)]
    pub(crate) struct Fault;

    impl spi::Error for Fault {
        fn kind(&self) -> spi::ErrorKind {
            spi::ErrorKind::Other
        }
    }

    impl digital::Error for Fault {
        fn kind(&self) -> digital::ErrorKind {
            digital::ErrorKind::Other
        }
    }

    /// Bus that answers every byte with a fixed script, recording MOSI
    #[derive(Default)]
    pub(crate) struct ScriptedBus {
        pub miso: std::collections::VecDeque<u8>,
        pub mosi: std::vec::Vec<u8>,
        /// Fail once when this many bytes have been clocked
        pub fail_at: Option<usize>,
    }

    impl ScriptedBus {
        fn clock(&mut self, out: u8) -> core::result::Result<u8, Fault> {
            if self.fail_at == Some(self.mosi.len()) {
                self.fail_at = None;
                return Err(Fault);
            }
            self.mosi.push(out);
            Ok(self.miso.pop_front().unwrap_or(0))
        }
    }

    impl SpiErrorType for ScriptedBus {
        type Error = Fault;
    }

    impl SpiBus<u8> for ScriptedBus {
        fn read(&mut self, words: &mut [u8]) -> core::result::Result<(), Fault> {
            for word in words.iter_mut() {
                *word = self.clock(0)?;
            }
            Ok(())
        }

        fn write(&mut self, words: &[u8]) -> core::result::Result<(), Fault> {
            for &word in words {
                self.clock(word)?;
            }
            Ok(())
        }

        fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> core::result::Result<(), Fault> {
            for i in 0..read.len().max(write.len()) {
                let incoming = self.clock(write.get(i).copied().unwrap_or(0))?;
                if let Some(slot) = read.get_mut(i) {
                    *slot = incoming;
                }
            }
            Ok(())
        }

        fn transfer_in_place(&mut self, words: &mut [u8]) -> core::result::Result<(), Fault> {
            for word in words.iter_mut() {
                *word = self.clock(*word)?;
            }
            Ok(())
        }

        fn flush(&mut self) -> core::result::Result<(), Fault> {
            Ok(())
        }
    }

    /// Pin with a settable level
    #[derive(Default)]
    pub(crate) struct Line {
        pub low: bool,
        /// Number of upcoming `set_low` calls that fail
        pub fail_set_low: usize,
    }

    impl PinErrorType for Line {
        type Error = Fault;
    }

    impl InputPin for Line {
        fn is_high(&mut self) -> core::result::Result<bool, Fault> {
            Ok(!self.low)
        }

        fn is_low(&mut self) -> core::result::Result<bool, Fault> {
            Ok(self.low)
        }
    }

    impl OutputPin for Line {
        fn set_low(&mut self) -> core::result::Result<(), Fault> {
            if self.fail_set_low > 0 {
                self.fail_set_low -= 1;
                return Err(Fault);
            }
            self.low = true;
            Ok(())
        }

        fn set_high(&mut self) -> core::result::Result<(), Fault> {
            self.low = false;
            Ok(())
        }
    }

    /// Records attach/mask transitions
    #[derive(Default, Debug)]
    pub(crate) struct Irq {
        pub attached: bool,
        pub masked: bool,
        pub detaches: usize,
    }

    impl ReadyInterrupt for Irq {
        fn attach(&mut self) {
            self.attached = true;
        }

        fn detach(&mut self) {
            self.attached = false;
            self.detaches += 1;
        }

        fn mask(&mut self) {
            self.masked = true;
        }

        fn unmask(&mut self) {
            self.masked = false;
        }
    }

    pub(crate) type TestLink = Transport<ScriptedBus, Line, Line, Irq>;

    pub(crate) fn link(mode: LinkMode) -> TestLink {
        Transport::new(
            ScriptedBus::default(),
            Line::default(),
            Line::default(),
            Irq::default(),
            LinkConfig::default().with_mode(mode),
        )
        .unwrap()
    }

    #[test]
    fn test_new_link_is_idle() {
        let link = link(LinkMode::EdgeInterrupt);
        assert!(link.command_queue_empty());
        assert!(link.event_queue_empty());
        assert!(!link.line_state().request_asserted);
        assert!(!link.reqn.low);
        assert!(link.irq.attached);
        assert_eq!(link.stats(), LinkStats::default());
    }

    #[test]
    fn test_polled_link_never_attaches() {
        let link = link(LinkMode::Polled);
        assert!(!link.irq.attached);
    }

    #[test]
    fn test_send_asserts_request() {
        let mut link = link(LinkMode::Polled);
        link.send(&Packet::new(&[1, 2]).unwrap()).unwrap();
        assert!(link.reqn.low);
        assert!(link.line_state().request_asserted);
        assert!(!link.command_queue_empty());
    }

    #[test]
    fn test_send_rejects_when_full() {
        let mut link = link(LinkMode::Polled);
        let packet = Packet::new(&[1]).unwrap();
        for _ in 0..QUEUE_SIZE - 1 {
            link.send(&packet).unwrap();
        }
        assert!(link.command_queue_full());
        assert_eq!(link.send(&packet), Err(TransportError::QueueFull));
        assert_eq!(link.stats().sends_rejected, 1);
    }

    #[test]
    fn test_send_rejects_corrupt_length() {
        let mut link = link(LinkMode::Polled);
        let mut packet = Packet::empty();
        packet.buffer[0] = (MAX_PACKET_LEN + 1) as u8;
        assert_eq!(
            link.send(&packet),
            Err(TransportError::PacketTooLong { len: MAX_PACKET_LEN + 1 })
        );
        assert!(link.command_queue_empty());
        assert!(!link.reqn.low);
    }

    #[test]
    fn test_get_event_on_idle_polled_link() {
        let mut link = link(LinkMode::Polled);
        assert_eq!(link.get_event(), Ok(None));
        assert_eq!(link.peek_event(), Ok(None));
        assert!(link.spi.mosi.is_empty());
    }

    #[test]
    fn test_flush_drops_commands() {
        let mut link = link(LinkMode::Polled);
        link.send(&Packet::new(&[1]).unwrap()).unwrap();
        link.flush();
        link.flush();
        assert!(link.command_queue_empty());
        assert!(link.event_queue_empty());
    }

    #[test]
    fn test_send_survives_request_fault() {
        let mut link = link(LinkMode::Polled);
        link.reqn.fail_set_low = 1;

        assert_eq!(link.send(&Packet::new(&[7]).unwrap()), Ok(()));
        assert!(!link.reqn.low);
        assert!(!link.line_state().request_asserted);
        assert!(!link.command_queue_empty());

        // The next monitor check lowers REQN for the queued command
        link.poll().unwrap();
        assert!(link.reqn.low);
        assert_eq!(link.stats().sends_rejected, 0);
    }

    #[test]
    fn test_flush_lifts_backpressure() {
        let mut link = link(LinkMode::EdgeInterrupt);
        for _ in 0..QUEUE_SIZE - 1 {
            link.queues.events.enqueue(&Packet::new(&[1]).unwrap()).unwrap();
        }
        link.throttle_if_saturated();
        assert!(link.irq.masked);

        link.flush();

        assert!(!link.irq.masked);
        assert!(!link.line_state().ready_masked);
    }

    #[test]
    fn test_debug_toggle() {
        let mut link = link(LinkMode::Polled);
        assert!(!link.debug_enabled());
        link.set_debug(true);
        assert!(link.debug_enabled());
        link.send(&Packet::new(&[0xAB]).unwrap()).unwrap();
    }

    #[test]
    fn test_release_detaches() {
        let link = link(LinkMode::EdgeInterrupt);
        let (_, _, _, irq) = link.release();
        assert!(!irq.attached);
    }
}
