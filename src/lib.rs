//! Wire-format codec for classic DNS, LLMNR (RFC 4795) and mDNS (RFC 6762),
//! including the DNSSEC record types of RFC 4034/5155 and the EDNS(0) OPT
//! pseudo-record of RFC 6891.
//!
//! This crate only encodes and decodes messages. It does no I/O, holds no
//! persisted state, and runs single-threaded per packet — sockets, caches
//! and recursion belong to whatever resolver embeds it.

mod bitmap;
pub mod edns;
mod error;
mod header;
mod name;
mod packet;
pub mod protocol;
mod records;
mod validate;

pub use error::{CodecError, Result, MAX_PACKET_SIZE};
pub use header::HeaderView;
pub use name::{MAX_COMPRESSION_OFFSET, MAX_LABEL_LEN, MAX_NAME_WIRE_LEN};
pub use packet::{AnswerEntry, Extracted, Packet};
pub use protocol::Protocol;
pub use records::{RData, Record, RecordClass, RecordType, ResourceKey};
pub use validate::{is_reply_for, validate, validate_query, validate_reply, QueryCheck, ReplyCheck};

/// Default EDNS(0)/UDP payload size advertised absent any other configuration
/// (RFC 6891 §6.2.3 suggests 4096; 512 is the pre-EDNS UDP safe minimum).
pub const DEFAULT_UDP_PAYLOAD_SIZE: u16 = 512;
