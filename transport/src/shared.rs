//! # Sharing a Link With the RDYN Handler
//!
//! On an interrupt-driven link the RDYN handler and the main loop both
//! drive the same bus, REQN line, interrupt mask and queues. [`SharedLink`]
//! keeps the [`Transport`] in a `critical_section::Mutex` so it can live in
//! a `static`; every call runs inside one critical section, which covers
//! each head/tail mutation and each occupancy check the call makes.
//!
//! ```ignore
//! static LINK: SharedLink<Spi, Rdyn, Reqn, Exti> = SharedLink::new();
//!
//! #[interrupt]
//! fn EXTI1() {
//!     LINK.on_ready_interrupt();
//! }
//!
//! fn main_loop() {
//!     while let Some(Ok(Some(event))) = LINK.with(|link| link.get_event()) {
//!         handle(event);
//!     }
//! }
//! ```

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiBus;
use log::warn;

use crate::error::Result;
use crate::traits::{NoInterrupt, ReadyInterrupt};
use crate::transport::Transport;
use crate::QUEUE_SIZE;

/// A [`Transport`] slot guarded by a critical section
pub struct SharedLink<SPI, RDY, REQ, IRQ = NoInterrupt, const N: usize = QUEUE_SIZE> {
    inner: Mutex<RefCell<Option<Transport<SPI, RDY, REQ, IRQ, N>>>>,
}

impl<SPI, RDY, REQ, IRQ, const N: usize> SharedLink<SPI, RDY, REQ, IRQ, N> {
    /// Empty slot, usable in a `static`
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(None)),
        }
    }
}

impl<SPI, RDY, REQ, IRQ, const N: usize> Default for SharedLink<SPI, RDY, REQ, IRQ, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<SPI, RDY, REQ, IRQ, const N: usize> SharedLink<SPI, RDY, REQ, IRQ, N>
where
    SPI: SpiBus<u8>,
    RDY: InputPin,
    REQ: OutputPin,
    IRQ: ReadyInterrupt,
{
    /// Put a link in the slot, returning the one it replaces
    pub fn install(&self, link: Transport<SPI, RDY, REQ, IRQ, N>) -> Option<Transport<SPI, RDY, REQ, IRQ, N>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).replace(link))
    }

    /// Empty the slot
    pub fn take(&self) -> Option<Transport<SPI, RDY, REQ, IRQ, N>> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).take())
    }

    pub fn is_installed(&self) -> bool {
        critical_section::with(|cs| self.inner.borrow_ref(cs).is_some())
    }

    /// Run `f` on the link inside one critical section
    ///
    /// Returns `None` when no link is installed.
    pub fn with<R>(&self, f: impl FnOnce(&mut Transport<SPI, RDY, REQ, IRQ, N>) -> R) -> Option<R> {
        critical_section::with(|cs| self.inner.borrow_ref_mut(cs).as_mut().map(f))
    }

    /// Entry point for the board's RDYN interrupt handler
    ///
    /// Line and bus faults are logged here since an ISR has nowhere to
    /// return them. Returns `false` when no link is installed.
    pub fn on_ready_interrupt(&self) -> bool {
        match self.with(|link| link.on_ready_interrupt()) {
            Some(Ok(())) => true,
            Some(Err(e)) => {
                warn!("RDYN handler failed: {}", e);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkMode;
    use crate::packet::Packet;
    use crate::transport::tests::{link, Irq, Line, ScriptedBus};

    type TestShared = SharedLink<ScriptedBus, Line, Line, Irq>;

    #[test]
    fn test_empty_slot() {
        let shared = TestShared::new();
        assert!(!shared.is_installed());
        assert!(!shared.on_ready_interrupt());
        assert!(shared.with(|link| link.stats()).is_none());
        assert!(shared.take().is_none());
    }

    #[test]
    fn test_handler_and_caller_share_queues() {
        let shared = TestShared::new();
        assert!(shared.install(link(LinkMode::EdgeInterrupt)).is_none());

        shared
            .with(|link| {
                link.spi.miso.extend([0x00, 1, 0x5A]);
                link.send(&Packet::new(&[0x42]).unwrap())
            })
            .unwrap()
            .unwrap();

        assert!(shared.on_ready_interrupt());

        let event = shared.with(|link| link.get_event()).unwrap().unwrap();
        assert_eq!(event, Some(Packet::new(&[0x5A]).unwrap()));

        let link = shared.take().unwrap();
        assert_eq!(link.spi.mosi, [1, 0x42, 0x00]);
        assert!(link.irq.attached);
        assert!(!shared.is_installed());
    }

    #[test]
    fn test_handler_fault_is_swallowed() {
        let shared = TestShared::new();
        shared.install(link(LinkMode::EdgeInterrupt));
        shared.with(|link| link.spi.fail_at = Some(0));

        assert!(shared.on_ready_interrupt());
        assert_eq!(shared.with(|link| link.irq.attached), Some(true));
    }
}
