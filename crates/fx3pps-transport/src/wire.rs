//! Single-byte signal codec
//!
//! A transfer carries the signal level in its first byte. Outgoing packets are
//! padded with zeros to the bulk endpoint's maximum packet size.

use crate::TransportError;

/// Maximum packet size of the bulk endpoints.
pub const MAX_PACKET_SIZE: usize = 512;

/// Level of the PPS line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalLevel {
    /// Signal asserted (rising edge when entered)
    High,
    /// Signal cleared (falling edge when entered)
    Low,
}

impl SignalLevel {
    /// Wire byte for this level.
    #[inline]
    pub const fn to_byte(self) -> u8 {
        match self {
            SignalLevel::High => 1,
            SignalLevel::Low => 0,
        }
    }

    /// Any nonzero byte is high.
    #[inline]
    pub const fn from_byte(byte: u8) -> Self {
        if byte != 0 {
            SignalLevel::High
        } else {
            SignalLevel::Low
        }
    }
}

/// Transition of the PPS line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// Rising edge
    Assert,
    /// Falling edge
    Clear,
}

impl EdgeKind {
    /// Level the line holds after this edge.
    #[inline]
    pub const fn level(self) -> SignalLevel {
        match self {
            EdgeKind::Assert => SignalLevel::High,
            EdgeKind::Clear => SignalLevel::Low,
        }
    }
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EdgeKind::Assert => write!(f, "assert"),
            EdgeKind::Clear => write!(f, "clear"),
        }
    }
}

/// Encode a level into a full-size packet.
///
/// The whole buffer is rewritten so a reused buffer never leaks stale bytes.
#[inline]
pub fn encode_level(level: SignalLevel, packet: &mut [u8; MAX_PACKET_SIZE]) {
    packet.fill(0);
    packet[0] = level.to_byte();
}

/// Decode the level carried by a received transfer.
///
/// # Errors
///
/// Returns [`TransportError::ShortTransfer`] if the transfer is empty.
#[inline]
pub fn decode_level(transfer: &[u8]) -> Result<SignalLevel, TransportError> {
    match transfer.first() {
        Some(&byte) => Ok(SignalLevel::from_byte(byte)),
        None => Err(TransportError::ShortTransfer {
            expected: 1,
            actual: 0,
        }),
    }
}
