//! Protocol enum and the static RCODE / protocol name tables (spec §4.8, §6).

use std::fmt;

/// Which of the three wire dialects a [`crate::packet::Packet`] speaks.
/// Fixed at construction; never mutated afterward (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Dns,
    Mdns,
    Llmnr,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(protocol_to_string(*self))
    }
}

pub fn protocol_to_string(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::Dns => "dns",
        Protocol::Mdns => "mdns",
        Protocol::Llmnr => "llmnr",
    }
}

pub fn protocol_from_string(s: &str) -> Option<Protocol> {
    match s {
        "dns" => Some(Protocol::Dns),
        "mdns" => Some(Protocol::Mdns),
        "llmnr" => Some(Protocol::Llmnr),
        _ => None,
    }
}

/// RCODE name table (RFC 1035 §4.1.1, extended by RFC 2671/6891 for the
/// 4-bit header field this codec exposes — EDNS extended-rcode bits live in
/// the OPT TTL field and are out of scope here).
pub fn rcode_to_string(rcode: u8) -> &'static str {
    match rcode {
        0 => "NOERROR",
        1 => "FORMERR",
        2 => "SERVFAIL",
        3 => "NXDOMAIN",
        4 => "NOTIMP",
        5 => "REFUSED",
        6 => "YXDOMAIN",
        7 => "YXRRSET",
        8 => "NXRRSET",
        9 => "NOTAUTH",
        10 => "NOTZONE",
        _ => "UNKNOWN",
    }
}

pub fn rcode_from_string(s: &str) -> Option<u8> {
    match s {
        "NOERROR" => Some(0),
        "FORMERR" => Some(1),
        "SERVFAIL" => Some(2),
        "NXDOMAIN" => Some(3),
        "NOTIMP" => Some(4),
        "REFUSED" => Some(5),
        "YXDOMAIN" => Some(6),
        "YXRRSET" => Some(7),
        "NXRRSET" => Some(8),
        "NOTAUTH" => Some(9),
        "NOTZONE" => Some(10),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_roundtrip() {
        for p in [Protocol::Dns, Protocol::Mdns, Protocol::Llmnr] {
            let s = protocol_to_string(p);
            assert_eq!(protocol_from_string(s), Some(p));
        }
    }

    #[test]
    fn protocol_from_string_rejects_unknown() {
        assert_eq!(protocol_from_string("carrier-pigeon"), None);
    }

    #[test]
    fn rcode_roundtrip() {
        for rcode in 0..=10u8 {
            let s = rcode_to_string(rcode);
            assert_eq!(rcode_from_string(s), Some(rcode));
        }
    }

    #[test]
    fn rcode_unknown_is_stable() {
        assert_eq!(rcode_to_string(200), "UNKNOWN");
        assert_eq!(rcode_from_string("UNKNOWN"), None);
    }
}
