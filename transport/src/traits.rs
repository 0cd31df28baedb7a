//! # Platform Abstractions
//!
//! The transport never touches interrupt controller registers itself. Bus
//! and pin access go through embedded-hal 1.0 traits; the ready-line
//! interrupt goes through [`ReadyInterrupt`], which the board implements.
//!
//! ## Attach vs. Mask
//!
//! Two independent switches exist because they serve different owners:
//!
//! - **attach/detach** binds the handler to the RDYN falling edge. The
//!   handler detaches itself while it runs so it cannot re-enter.
//! - **mask/unmask** gates the interrupt source in hardware. Backpressure
//!   masks it while the event queue is full. A masked edge must stay
//!   latched so it fires once unmasked.

/// Control over the RDYN falling-edge interrupt
pub trait ReadyInterrupt {
    /// Bind the handler to the RDYN falling edge
    fn attach(&mut self);

    /// Unbind the handler
    fn detach(&mut self);

    /// Disable the interrupt source, latching pending edges
    fn mask(&mut self);

    /// Re-enable the interrupt source
    fn unmask(&mut self);
}

impl<T: ReadyInterrupt + ?Sized> ReadyInterrupt for &mut T {
    fn attach(&mut self) {
        T::attach(self)
    }

    fn detach(&mut self) {
        T::detach(self)
    }

    fn mask(&mut self) {
        T::mask(self)
    }

    fn unmask(&mut self) {
        T::unmask(self)
    }
}

/// Interrupt stand-in for polled links
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInterrupt;

impl ReadyInterrupt for NoInterrupt {
    fn attach(&mut self) {}

    fn detach(&mut self) {}

    fn mask(&mut self) {}

    fn unmask(&mut self) {}
}
