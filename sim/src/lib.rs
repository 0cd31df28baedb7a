//! # Simulated ACI Peripheral
//!
//! A host-side model of the radio's half of the REQN/RDYN handshake. It
//! hands out embedded-hal bus and pin objects that all share one device
//! state, so an [`aci_transport::Transport`] can run against it unchanged.
//!
//! ## Device Model
//!
//! ```text
//!             ┌──────────────────── SimDevice ─────────────────────┐
//!  SimRequest ──► REQN level ──┐                                   │
//!             │                ├─► RDYN low while REQN is low or   │
//!  SimReady ◄─────────────────-┘   an event is waiting             │
//!             │                                                    │
//!  SimBus ◄──► clock(byte): replies [status, len, payload..]       │
//!             │               collects the host's frame            │
//!             │  REQN rising edge ends the transaction:            │
//!             │    command recorded, delivered event dropped       │
//!  SimInterrupt ──► attached / masked flags                        │
//!             └────────────────────────────────────────────────────┘
//! ```
//!
//! The device never drives RDYN by edges; tests call
//! [`SimDevice::service_interrupts`] to play the role of the ISR.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::rc::Rc;

use aci_transport::{LinkConfig, Packet, ReadyInterrupt, Transport};
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, SpiBus};
use log::{debug, warn};

/// Transport wired to a [`SimDevice`]
pub type SimTransport = Transport<SimBus, SimReady, SimRequest, SimInterrupt>;

/// Upper bound on handler runs per [`SimDevice::service_interrupts`] call
const MAX_INTERRUPTS_PER_SERVICE: usize = 64;

#[derive(Debug, Default)]
struct Transfer {
    /// `[status, len, payload..]` the device clocks out
    reply: Vec<u8>,
    /// Bytes clocked in from the host
    received: Vec<u8>,
}

#[derive(Debug, Default)]
struct DeviceState {
    request_low: bool,
    status: u8,
    pending: VecDeque<Vec<u8>>,
    commands: Vec<Packet>,
    transfer: Option<Transfer>,
    last_clocked: usize,
    transactions: usize,
    violations: usize,
    irq_attached: bool,
    irq_masked: bool,
}

impl DeviceState {
    fn ready_low(&self) -> bool {
        self.request_low || !self.pending.is_empty()
    }

    fn clock(&mut self, mosi: u8) -> u8 {
        if !self.request_low {
            warn!("sim: byte clocked with REQN high");
            self.violations += 1;
        }

        let status = self.status;
        let pending = &self.pending;
        let transfer = self.transfer.get_or_insert_with(|| {
            let mut reply = vec![status];
            match pending.front() {
                Some(frame) => reply.extend_from_slice(frame),
                None => reply.push(0),
            }
            Transfer {
                reply,
                received: Vec::new(),
            }
        });

        let miso = transfer.reply.get(transfer.received.len()).copied().unwrap_or(0);
        transfer.received.push(mosi);
        miso
    }

    fn set_request(&mut self, low: bool) {
        let rising = self.request_low && !low;
        self.request_low = low;
        if rising {
            self.finish_transfer();
        }
    }

    fn finish_transfer(&mut self) {
        let Some(transfer) = self.transfer.take() else {
            return;
        };

        self.transactions += 1;
        self.last_clocked = transfer.received.len();

        match transfer.received.first().copied() {
            Some(0) | None => {}
            Some(_) => match Packet::from_frame(&transfer.received) {
                Ok(command) => {
                    debug!("sim: command {}", command.dump());
                    self.commands.push(command);
                }
                Err(e) => {
                    warn!("sim: malformed command frame: {}", e);
                    self.violations += 1;
                }
            },
        }

        if transfer.reply.get(1).is_some_and(|&len| len > 0) {
            self.pending.pop_front();
        }
    }
}

/// Shared handle to the simulated peripheral
#[derive(Clone, Default)]
pub struct SimDevice {
    state: Rc<RefCell<DeviceState>>,
}

impl SimDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus, RDYN, REQN and interrupt handles bound to this device
    pub fn split(&self) -> (SimBus, SimReady, SimRequest, SimInterrupt) {
        (
            SimBus(self.clone()),
            SimReady(self.clone()),
            SimRequest(self.clone()),
            SimInterrupt(self.clone()),
        )
    }

    /// Build a transport on top of this device
    pub fn link(&self, config: LinkConfig) -> aci_transport::Result<SimTransport> {
        let (bus, rdyn, reqn, irq) = self.split();
        Transport::new(bus, rdyn, reqn, irq, config)
    }

    /// Queue an event for the device to deliver
    pub fn push_event(&self, event: &Packet) {
        self.push_raw_frame(event.as_frame());
    }

    /// Queue arbitrary wire bytes as an event, length byte first
    pub fn push_raw_frame(&self, frame: &[u8]) {
        self.state.borrow_mut().pending.push_back(frame.to_vec());
    }

    /// Status byte sent as the first byte of every transaction
    pub fn set_status(&self, status: u8) {
        self.state.borrow_mut().status = status;
    }

    /// Commands received so far, oldest first
    pub fn commands(&self) -> Vec<Packet> {
        self.state.borrow().commands.clone()
    }

    pub fn pending_events(&self) -> usize {
        self.state.borrow().pending.len()
    }

    pub fn ready_asserted(&self) -> bool {
        self.state.borrow().ready_low()
    }

    pub fn request_asserted(&self) -> bool {
        self.state.borrow().request_low
    }

    /// Completed transactions
    pub fn transactions(&self) -> usize {
        self.state.borrow().transactions
    }

    /// Bytes clocked in the last completed transaction, headers included
    pub fn last_clocked(&self) -> usize {
        self.state.borrow().last_clocked
    }

    /// Handshake rule breaks seen (bytes clocked with REQN high, bad frames)
    pub fn violations(&self) -> usize {
        self.state.borrow().violations
    }

    pub fn interrupt_attached(&self) -> bool {
        self.state.borrow().irq_attached
    }

    pub fn interrupt_masked(&self) -> bool {
        self.state.borrow().irq_masked
    }

    /// True when a level interrupt on RDYN would fire right now
    pub fn interrupt_pending(&self) -> bool {
        let state = self.state.borrow();
        state.irq_attached && !state.irq_masked && state.ready_low()
    }

    /// Run the RDYN handler for as long as the interrupt would fire
    ///
    /// Returns how many times it ran.
    pub fn service_interrupts(&self, link: &mut SimTransport) -> aci_transport::Result<usize> {
        let mut runs = 0;
        while self.interrupt_pending() && runs < MAX_INTERRUPTS_PER_SERVICE {
            link.on_ready_interrupt()?;
            runs += 1;
        }
        Ok(runs)
    }
}

/// SPI bus half of the device
pub struct SimBus(SimDevice);

impl SpiErrorType for SimBus {
    type Error = Infallible;
}

impl SpiBus<u8> for SimBus {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut state = self.0.state.borrow_mut();
        for word in words.iter_mut() {
            *word = state.clock(0);
        }
        Ok(())
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut state = self.0.state.borrow_mut();
        for &word in words {
            state.clock(word);
        }
        Ok(())
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        let mut state = self.0.state.borrow_mut();
        for i in 0..read.len().max(write.len()) {
            let miso = state.clock(write.get(i).copied().unwrap_or(0));
            if let Some(word) = read.get_mut(i) {
                *word = miso;
            }
        }
        Ok(())
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut state = self.0.state.borrow_mut();
        for word in words.iter_mut() {
            *word = state.clock(*word);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// RDYN as seen by the host
pub struct SimReady(SimDevice);

impl PinErrorType for SimReady {
    type Error = Infallible;
}

impl InputPin for SimReady {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.ready_asserted())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.ready_asserted())
    }
}

/// REQN as driven by the host
pub struct SimRequest(SimDevice);

impl PinErrorType for SimRequest {
    type Error = Infallible;
}

impl OutputPin for SimRequest {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.state.borrow_mut().set_request(true);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.state.borrow_mut().set_request(false);
        Ok(())
    }
}

/// Interrupt controller for the RDYN line
pub struct SimInterrupt(SimDevice);

impl ReadyInterrupt for SimInterrupt {
    fn attach(&mut self) {
        self.0.state.borrow_mut().irq_attached = true;
    }

    fn detach(&mut self) {
        self.0.state.borrow_mut().irq_attached = false;
    }

    fn mask(&mut self) {
        self.0.state.borrow_mut().irq_masked = true;
    }

    fn unmask(&mut self) {
        self.0.state.borrow_mut().irq_masked = false;
    }
}
