//! # ACI Transport Layer
//!
//! This crate moves length-prefixed packets between a host MCU and an
//! SPI-attached radio that gates every bus exchange behind a two-wire
//! handshake:
//!
//! - **REQN** (request, host-driven): pulled low to ask for a transaction
//! - **RDYN** (ready, device-driven): pulled low when the device will clock
//!
//! ## Architecture
//!
//! ```text
//!  send() ──► command queue ──┐                ┌──► event queue ──► get_event()
//!                             ▼                │
//!                   ┌──────────────────────────┴─┐
//!                   │     Transaction Engine     │◄── RDYN edge / poll()
//!                   │  (one full-duplex exchange)│
//!                   └─────────────┬──────────────┘
//!                                 ▼
//!                          SPI bus + REQN
//! ```
//!
//! ## Concurrency
//!
//! The RDYN handler and the caller share the whole link: both queues, and
//! also the bus, REQN and the interrupt mask. [`SharedLink`] holds the
//! [`Transport`] behind a `critical_section::Mutex`, so each call, with all
//! the head/tail mutations and occupancy checks it makes, runs inside one
//! critical section. No heap allocations happen at any point.

#![cfg_attr(not(feature = "std"), no_std)]

pub mod config;
pub mod error;
mod engine;
mod flow;
mod monitor;
pub mod packet;
pub mod queue;
pub mod shared;
pub mod traits;
pub mod transport;

// Re-export main types for convenience
pub use config::{LinkConfig, LinkMode};
pub use engine::transfer_len;
pub use error::{QueueError, Result, TransportError};
pub use flow::LineState;
pub use packet::Packet;
pub use queue::{LinkQueues, PacketQueue};
pub use shared::SharedLink;
pub use traits::{NoInterrupt, ReadyInterrupt};
pub use transport::{LinkStats, Transport};

/// Largest payload a single packet can carry
pub const MAX_PACKET_LEN: usize = 31;

/// Length byte plus payload
pub const PACKET_BUFFER_LEN: usize = MAX_PACKET_LEN + 1;

/// Default slot count per queue; one slot is always kept free, so the
/// usable depth is `QUEUE_SIZE - 1`
pub const QUEUE_SIZE: usize = 4;

/// Bus mode the device expects (CPOL = 0, CPHA = 0)
pub const SPI_MODE: embedded_hal::spi::Mode = embedded_hal::spi::MODE_0;

/// The device shifts bytes least significant bit first. embedded-hal has no
/// bit-order setting, so board code must configure the peripheral itself.
pub const BIT_ORDER_LSB_FIRST: bool = true;
