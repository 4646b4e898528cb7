//! Error taxonomy for the wire codec (spec §7).
//!
//! Every compound append/read operation is transactional: on any `CodecError`
//! the packet's `size` (append side) or `rindex` (read side) is restored to
//! its value at entry. See [`crate::packet::Packet`] for the rollback guards.

use thiserror::Error;

/// Maximum size a [`crate::packet::Packet`] buffer may grow to.
pub const MAX_PACKET_SIZE: usize = 65_535;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Allocation failed while growing the buffer.
    #[error("out of memory")]
    OutOfMemory,

    /// An append would push the buffer past [`MAX_PACKET_SIZE`].
    #[error("message too big: attempted {attempted} bytes, max {max}")]
    MessageTooBig { attempted: usize, max: usize },

    /// A label exceeded 63 bytes, or the encoded name exceeded the 255-byte
    /// wire limit, or no compression pointer could address the name.
    #[error("name too long")]
    NameTooLong,

    /// A read ran past the logical end of the buffer.
    #[error("truncated at offset {at}")]
    Truncated { at: usize },

    /// A structural violation: bad compression pointer, bad RDLENGTH,
    /// misplaced OPT, invalid type in a question, a cache-flush bit set in
    /// the question section of an mDNS packet, and so on. `reason` is a
    /// short fixed tag naming which check failed, not a free-form message.
    #[error("malformed packet: {reason}")]
    Malformed { reason: &'static str },
}

impl CodecError {
    pub fn malformed(reason: &'static str) -> Self {
        CodecError::Malformed { reason }
    }
}

pub type Result<T> = std::result::Result<T, CodecError>;
