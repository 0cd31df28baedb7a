//! Error types for the transport layer.
//!
//! Bus and pin errors from the HAL are reduced to their `ErrorKind` so the
//! public error type does not depend on the concrete peripheral types.

use embedded_hal::{digital, spi};
use thiserror::Error;

/// Errors reported by [`Transport`](crate::Transport) operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TransportError {
    /// Declared payload length is larger than [`MAX_PACKET_LEN`](crate::MAX_PACKET_LEN)
    #[error("packet length {len} exceeds the maximum of {max}", max = crate::MAX_PACKET_LEN)]
    PacketTooLong { len: usize },
    /// Command queue has no free slot; retry once the device drains it
    #[error("command queue is full")]
    QueueFull,
    /// Frame is shorter than its own length byte claims
    #[error("frame is shorter than its length byte")]
    Truncated,
    /// The byte exchange primitive failed
    #[error("SPI transfer failed: {0:?}")]
    Spi(spi::ErrorKind),
    /// Reading RDYN or driving REQN failed
    #[error("handshake line I/O failed: {0:?}")]
    Line(digital::ErrorKind),
}

/// Result type alias for transport operations
pub type Result<T> = core::result::Result<T, TransportError>;

/// Errors specific to queue operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum QueueError {
    /// Advancing the tail would collide with the head
    #[error("queue is full")]
    Full,
}

impl From<QueueError> for TransportError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Full => TransportError::QueueFull,
        }
    }
}

pub(crate) fn spi_error<E: spi::Error>(e: E) -> TransportError {
    TransportError::Spi(e.kind())
}

pub(crate) fn line_error<E: digital::Error>(e: E) -> TransportError {
    TransportError::Line(e.kind())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_error_converts() {
        assert_eq!(TransportError::from(QueueError::Full), TransportError::QueueFull);
    }

    #[test]
    fn test_hal_errors_keep_kind() {
        assert_eq!(
            spi_error(spi::ErrorKind::Overrun),
            TransportError::Spi(spi::ErrorKind::Overrun)
        );
        assert_eq!(
            line_error(digital::ErrorKind::Other),
            TransportError::Line(digital::ErrorKind::Other)
        );
    }
}
