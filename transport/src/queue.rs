//! # Bounded Packet Queues
//!
//! Fixed-capacity circular buffers of [`Packet`] slots, one for commands
//! (host → device) and one for events (device → host).
//!
//! ## Memory Layout
//!
//! ```text
//! ┌────────┬────────┬────────┬────────┐
//! │ slot 0 │ slot 1 │ slot 2 │ slot 3 │   N = 4, usable depth 3
//! └────────┴────────┴────────┴────────┘
//!     ▲                 ▲
//!    head              tail
//! ```
//!
//! `head == tail` means empty. The queue is full when advancing `tail`
//! would land on `head`, so one slot is always left unused.
//!
//! The queues carry no lock of their own. Interrupt-side access goes
//! through [`SharedLink`](crate::SharedLink), which holds one critical
//! section around every call on the link.

use crate::error::QueueError;
use crate::packet::Packet;
use crate::QUEUE_SIZE;

/// Arena of `N` preallocated packet slots indexed modulo `N`
pub struct PacketQueue<const N: usize = QUEUE_SIZE> {
    slots: [Packet; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> PacketQueue<N> {
    const VALID_CAPACITY: () = assert!(N >= 2, "a packet queue needs at least two slots");

    /// Create an empty queue
    pub const fn new() -> Self {
        let () = Self::VALID_CAPACITY;
        Self {
            slots: [Packet::EMPTY; N],
            head: 0,
            tail: 0,
        }
    }

    /// Usable depth (`N - 1`)
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of queued packets
    #[inline]
    pub fn len(&self) -> usize {
        (self.tail + N - self.head) % N
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        (self.tail + 1) % N == self.head
    }

    /// Empty the queue and zero the length byte and first payload byte of
    /// every slot
    pub fn reset(&mut self) {
        self.head = 0;
        self.tail = 0;
        for slot in self.slots.iter_mut() {
            slot.buffer[0] = 0;
            slot.buffer[1] = 0;
        }
    }

    /// Copy `packet` into the tail slot
    ///
    /// Only the length byte and the meaningful payload bytes are copied;
    /// the rest of the slot keeps whatever it held before.
    pub fn enqueue(&mut self, packet: &Packet) -> Result<(), QueueError> {
        let next = (self.tail + 1) % N;
        if next == self.head {
            return Err(QueueError::Full);
        }

        let slot = &mut self.slots[self.tail];
        let frame = packet.as_frame();
        slot.status = 0;
        slot.buffer[..frame.len()].copy_from_slice(frame);
        self.tail = next;

        Ok(())
    }

    /// Copy out and remove the head slot
    pub fn dequeue(&mut self) -> Option<Packet> {
        if self.is_empty() {
            return None;
        }

        let packet = self.slots[self.head];
        self.head = (self.head + 1) % N;
        Some(packet)
    }

    /// Drop the head slot without copying it out
    pub fn discard(&mut self) -> bool {
        if self.is_empty() {
            return false;
        }

        self.head = (self.head + 1) % N;
        true
    }

    /// Dequeue, also reporting whether the queue was full beforehand
    pub fn dequeue_from_full(&mut self) -> Option<(Packet, bool)> {
        let was_full = self.is_full();
        self.dequeue().map(|packet| (packet, was_full))
    }

    /// Copy out the head slot without removing it
    pub fn peek(&self) -> Option<Packet> {
        if self.is_empty() {
            return None;
        }

        Some(self.slots[self.head])
    }
}

impl<const N: usize> Default for PacketQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// The command and event queues of one link
pub struct LinkQueues<const N: usize = QUEUE_SIZE> {
    /// Host → device
    pub commands: PacketQueue<N>,
    /// Device → host
    pub events: PacketQueue<N>,
}

impl<const N: usize> LinkQueues<N> {
    pub const fn new() -> Self {
        Self {
            commands: PacketQueue::new(),
            events: PacketQueue::new(),
        }
    }

    /// Reset both queues together
    pub fn flush(&mut self) {
        self.commands.reset();
        self.events.reset();
    }
}

impl<const N: usize> Default for LinkQueues<N> {
    fn default() -> Self {
        Self::new()
    }
}
