//! Resource record types, classes, keys and RDATA (spec §3, §4.5).
//!
//! RDATA encode/decode is dispatched by record type right here; `packet.rs`
//! owns the surrounding key/TTL/RDLENGTH framing (spec §4.5/§4.6) and calls
//! into [`encode_rdata`] / [`decode_rdata`] for the type-specific payload.
//! DNSSEC field layouts (DNSKEY, RRSIG, DS) follow RFC 4034 §2-§5; NSEC/NSEC3
//! share the windowed bitmap format implemented in `src/bitmap.rs`.

use std::collections::HashMap;
use std::net::{Ipv4Addr, Ipv6Addr};

use tracing::warn;

use crate::bitmap;
use crate::error::{CodecError, Result};
use crate::name;
use crate::protocol::Protocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Ns,
    Cname,
    Soa,
    Ptr,
    Hinfo,
    Mx,
    Txt,
    Spf,
    Aaaa,
    Loc,
    Srv,
    Dname,
    Opt,
    Ds,
    Sshfp,
    Rrsig,
    Nsec,
    Dnskey,
    Nsec3,
    Any,
    Unknown(u16),
}

impl RecordType {
    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::Ns => 2,
            RecordType::Cname => 5,
            RecordType::Soa => 6,
            RecordType::Ptr => 12,
            RecordType::Hinfo => 13,
            RecordType::Mx => 15,
            RecordType::Txt => 16,
            RecordType::Spf => 99,
            RecordType::Aaaa => 28,
            RecordType::Loc => 29,
            RecordType::Srv => 33,
            RecordType::Dname => 39,
            RecordType::Opt => 41,
            RecordType::Ds => 43,
            RecordType::Sshfp => 44,
            RecordType::Rrsig => 46,
            RecordType::Nsec => 47,
            RecordType::Dnskey => 48,
            RecordType::Nsec3 => 50,
            RecordType::Any => 255,
            RecordType::Unknown(v) => v,
        }
    }

    /// Whether this type code may legally appear as a question QTYPE.
    /// OPT is a pseudo-RR confined to the additional section (RFC 6891
    /// §6.1.2) and type 0 is reserved (RFC 1035 has no type 0 RR); neither
    /// is a real query type. Everything else, including `ANY` and unknown
    /// codes a future RR type might use, is accepted.
    pub fn is_valid_query_type(self) -> bool {
        !matches!(self, RecordType::Opt | RecordType::Unknown(0))
    }

    pub fn name(self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Ns => "NS",
            RecordType::Cname => "CNAME",
            RecordType::Soa => "SOA",
            RecordType::Ptr => "PTR",
            RecordType::Hinfo => "HINFO",
            RecordType::Mx => "MX",
            RecordType::Txt => "TXT",
            RecordType::Spf => "SPF",
            RecordType::Aaaa => "AAAA",
            RecordType::Loc => "LOC",
            RecordType::Srv => "SRV",
            RecordType::Dname => "DNAME",
            RecordType::Opt => "OPT",
            RecordType::Ds => "DS",
            RecordType::Sshfp => "SSHFP",
            RecordType::Rrsig => "RRSIG",
            RecordType::Nsec => "NSEC",
            RecordType::Dnskey => "DNSKEY",
            RecordType::Nsec3 => "NSEC3",
            RecordType::Any => "ANY",
            RecordType::Unknown(_) => "UNKNOWN",
        }
    }
}

impl From<u16> for RecordType {
    fn from(v: u16) -> Self {
        match v {
            1 => RecordType::A,
            2 => RecordType::Ns,
            5 => RecordType::Cname,
            6 => RecordType::Soa,
            12 => RecordType::Ptr,
            13 => RecordType::Hinfo,
            15 => RecordType::Mx,
            16 => RecordType::Txt,
            99 => RecordType::Spf,
            28 => RecordType::Aaaa,
            29 => RecordType::Loc,
            33 => RecordType::Srv,
            39 => RecordType::Dname,
            41 => RecordType::Opt,
            43 => RecordType::Ds,
            44 => RecordType::Sshfp,
            46 => RecordType::Rrsig,
            47 => RecordType::Nsec,
            48 => RecordType::Dnskey,
            50 => RecordType::Nsec3,
            255 => RecordType::Any,
            other => RecordType::Unknown(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordClass {
    In,
    Ch,
    Hs,
    Any,
    Unknown(u16),
}

impl RecordClass {
    pub fn to_u16(self) -> u16 {
        match self {
            RecordClass::In => 1,
            RecordClass::Ch => 3,
            RecordClass::Hs => 4,
            RecordClass::Any => 255,
            RecordClass::Unknown(v) => v,
        }
    }
}

impl From<u16> for RecordClass {
    fn from(v: u16) -> Self {
        match v {
            1 => RecordClass::In,
            3 => RecordClass::Ch,
            4 => RecordClass::Hs,
            255 => RecordClass::Any,
            other => RecordClass::Unknown(other),
        }
    }
}

/// Name + type + class + (for mDNS/RFC 6762) the cache-flush bit folded out
/// of the top bit of the wire class field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
    pub name: String,
    pub rtype: RecordType,
    pub rclass: RecordClass,
    pub cache_flush: bool,
}

impl ResourceKey {
    /// Case-insensitive equality over name (RFC 1035 §2.3.3), type and
    /// class. Used by [`crate::validate::is_reply_for`] to match a reply's
    /// lone question against the key that was queried.
    pub fn matches(&self, other: &ResourceKey) -> bool {
        self.rtype == other.rtype
            && self.rclass == other.rclass
            && self.name.eq_ignore_ascii_case(&other.name)
    }
}

/// Write `name TYPE CLASS[|0x8000]` at the current end of `buf`.
pub fn append_key(
    buf: &mut Vec<u8>,
    names: &mut HashMap<String, u16>,
    protocol: Protocol,
    canonical_form: bool,
    refuse_compression: bool,
    key: &ResourceKey,
    name_compression: bool,
) -> Result<()> {
    name::append_name(buf, names, protocol, canonical_form, refuse_compression, &key.name, name_compression, false)?;
    buf.extend_from_slice(&key.rtype.to_u16().to_be_bytes());
    let mut class = key.rclass.to_u16();
    if key.cache_flush {
        class |= 0x8000;
    }
    buf.extend_from_slice(&class.to_be_bytes());
    Ok(())
}

/// Read a key starting at `*offset`, advancing `*offset` past it.
pub fn read_key(buf: &[u8], offset: &mut usize, allow_compression: bool) -> Result<ResourceKey> {
    let (name, after_name) = name::read_name(buf, *offset, allow_compression)?;
    if after_name + 4 > buf.len() {
        return Err(CodecError::Truncated { at: after_name });
    }
    let rtype = RecordType::from(u16::from_be_bytes([buf[after_name], buf[after_name + 1]]));
    let raw_class = u16::from_be_bytes([buf[after_name + 2], buf[after_name + 3]]);
    let cache_flush = raw_class & 0x8000 != 0;
    let rclass = RecordClass::from(raw_class & 0x7FFF);
    *offset = after_name + 4;
    Ok(ResourceKey { name, rtype, rclass, cache_flush })
}

/// A fully decoded resource record: key, TTL and RDATA.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub key: ResourceKey,
    pub ttl: u32,
    pub rdata: RData,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RData {
    A { addr: Ipv4Addr },
    Aaaa { addr: Ipv6Addr },
    Ns { nsdname: String },
    Cname { cname: String },
    Dname { target: String },
    Ptr { ptrdname: String },
    Soa {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Mx { preference: u16, exchange: String },
    Srv { priority: u16, weight: u16, port: u16, target: String },
    Txt { items: Vec<Vec<u8>> },
    Spf { items: Vec<Vec<u8>> },
    Hinfo { cpu: Vec<u8>, os: Vec<u8> },
    Loc {
        version: u8,
        size: u8,
        horiz_pre: u8,
        vert_pre: u8,
        latitude: u32,
        longitude: u32,
        altitude: u32,
    },
    Ds { key_tag: u16, algorithm: u8, digest_type: u8, digest: Vec<u8> },
    Sshfp { algorithm: u8, fp_type: u8, fingerprint: Vec<u8> },
    Dnskey { flags: u16, protocol: u8, algorithm: u8, public_key: Vec<u8> },
    Rrsig {
        type_covered: u16,
        algorithm: u8,
        labels: u8,
        original_ttl: u32,
        sig_expiration: u32,
        sig_inception: u32,
        key_tag: u16,
        signer_name: String,
        signature: Vec<u8>,
    },
    Nsec { next_domain: String, type_bitmap: Vec<u16> },
    Nsec3 {
        hash_algorithm: u8,
        flags: u8,
        iterations: u16,
        salt: Vec<u8>,
        next_hashed_owner: Vec<u8>,
        type_bitmap: Vec<u16>,
    },
    /// Any record type this codec doesn't special-case, and LOC with a
    /// version byte other than 0 (RFC 1876 §3 defines only version 0).
    Unknown { rtype: u16, raw: Vec<u8> },
}

fn read_character_string(buf: &[u8], offset: &mut usize, end: usize) -> Result<Vec<u8>> {
    if *offset >= end {
        return Err(CodecError::Truncated { at: *offset });
    }
    let len = buf[*offset] as usize;
    let start = *offset + 1;
    if start + len > end {
        return Err(CodecError::Truncated { at: start });
    }
    let data = buf[start..start + len].to_vec();
    *offset = start + len;
    Ok(data)
}

/// RFC 1876 §3: a LOC size/precision byte packs a base-10 mantissa (high
/// nibble, 0-9) and exponent (low nibble, 0-9); a zero mantissa must carry
/// a zero exponent too (there is exactly one way to encode zero).
fn loc_size_ok(byte: u8) -> bool {
    let mantissa = byte >> 4;
    let exponent = byte & 0x0F;
    mantissa <= 9 && exponent <= 9 && (mantissa != 0 || exponent == 0)
}

/// A name-bearing (or otherwise variable-length) RDATA decoder must consume
/// exactly through the declared RDLENGTH end, no more and no less (spec
/// §4.6, §8: "RDLENGTH that under-consumes" / "over-consumes" both land
/// here as `Malformed`).
fn check_fully_consumed(after: usize, end: usize) -> Result<()> {
    if after == end {
        Ok(())
    } else {
        warn!(after, end, "RDATA does not end exactly at its declared RDLENGTH");
        Err(CodecError::malformed("RDATA does not end exactly at RDLENGTH"))
    }
}

fn append_character_string(buf: &mut Vec<u8>, data: &[u8]) -> Result<()> {
    if data.len() > 255 {
        return Err(CodecError::malformed("character-string longer than 255 bytes"));
    }
    buf.push(data.len() as u8);
    buf.extend_from_slice(data);
    Ok(())
}

/// Encode one record's RDATA straight into the packet buffer. Names embedded
/// in RDATA (NS/CNAME/MX/SRV/SOA/RRSIG signer, NSEC next-domain) go through
/// [`name::append_name`] so their compression offsets stay correct relative
/// to the whole packet.
#[allow(clippy::too_many_arguments)]
pub fn encode_rdata(
    buf: &mut Vec<u8>,
    names: &mut HashMap<String, u16>,
    protocol: Protocol,
    canonical_form: bool,
    refuse_compression: bool,
    rdata: &RData,
    name_compression: bool,
) -> Result<()> {
    match rdata {
        RData::A { addr } => {
            buf.extend_from_slice(&addr.octets());
            Ok(())
        }
        RData::Aaaa { addr } => {
            buf.extend_from_slice(&addr.octets());
            Ok(())
        }
        RData::Ns { nsdname } => name::append_name(
            buf, names, protocol, canonical_form, refuse_compression, nsdname, name_compression, false,
        ),
        RData::Cname { cname } => name::append_name(
            buf, names, protocol, canonical_form, refuse_compression, cname, name_compression, false,
        ),
        RData::Dname { target } => name::append_name(
            buf, names, protocol, canonical_form, refuse_compression, target, false, false,
        ),
        RData::Ptr { ptrdname } => name::append_name(
            buf, names, protocol, canonical_form, refuse_compression, ptrdname, name_compression, false,
        ),
        RData::Soa { mname, rname, serial, refresh, retry, expire, minimum } => {
            name::append_name(buf, names, protocol, canonical_form, refuse_compression, mname, name_compression, true)?;
            name::append_name(buf, names, protocol, canonical_form, refuse_compression, rname, name_compression, true)?;
            buf.extend_from_slice(&serial.to_be_bytes());
            buf.extend_from_slice(&refresh.to_be_bytes());
            buf.extend_from_slice(&retry.to_be_bytes());
            buf.extend_from_slice(&expire.to_be_bytes());
            buf.extend_from_slice(&minimum.to_be_bytes());
            Ok(())
        }
        RData::Mx { preference, exchange } => {
            buf.extend_from_slice(&preference.to_be_bytes());
            name::append_name(buf, names, protocol, canonical_form, refuse_compression, exchange, name_compression, true)
        }
        RData::Srv { priority, weight, port, target } => {
            buf.extend_from_slice(&priority.to_be_bytes());
            buf.extend_from_slice(&weight.to_be_bytes());
            buf.extend_from_slice(&port.to_be_bytes());
            // RFC 2782 forbids compressing the target name; widely-deployed
            // resolvers permit it anyway and this codec matches that, not
            // the RFC (see the SRV row of the design-notes open questions).
            name::append_name(buf, names, protocol, canonical_form, refuse_compression, target, name_compression, false)
        }
        RData::Txt { items } | RData::Spf { items } => {
            if items.is_empty() {
                append_character_string(buf, &[])
            } else {
                for item in items {
                    append_character_string(buf, item)?;
                }
                Ok(())
            }
        }
        RData::Hinfo { cpu, os } => {
            append_character_string(buf, cpu)?;
            append_character_string(buf, os)
        }
        RData::Loc { version, size, horiz_pre, vert_pre, latitude, longitude, altitude } => {
            if *version != 0 {
                return Err(CodecError::malformed("LOC encode only supports version 0"));
            }
            buf.push(*version);
            buf.push(*size);
            buf.push(*horiz_pre);
            buf.push(*vert_pre);
            buf.extend_from_slice(&latitude.to_be_bytes());
            buf.extend_from_slice(&longitude.to_be_bytes());
            buf.extend_from_slice(&altitude.to_be_bytes());
            Ok(())
        }
        RData::Ds { key_tag, algorithm, digest_type, digest } => {
            buf.extend_from_slice(&key_tag.to_be_bytes());
            buf.push(*algorithm);
            buf.push(*digest_type);
            buf.extend_from_slice(digest);
            Ok(())
        }
        RData::Sshfp { algorithm, fp_type, fingerprint } => {
            buf.push(*algorithm);
            buf.push(*fp_type);
            buf.extend_from_slice(fingerprint);
            Ok(())
        }
        RData::Dnskey { flags, protocol: dnskey_protocol, algorithm, public_key } => {
            buf.extend_from_slice(&flags.to_be_bytes());
            buf.push(*dnskey_protocol);
            buf.push(*algorithm);
            buf.extend_from_slice(public_key);
            Ok(())
        }
        RData::Rrsig {
            type_covered,
            algorithm,
            labels,
            original_ttl,
            sig_expiration,
            sig_inception,
            key_tag,
            signer_name,
            signature,
        } => {
            buf.extend_from_slice(&type_covered.to_be_bytes());
            buf.push(*algorithm);
            buf.push(*labels);
            buf.extend_from_slice(&original_ttl.to_be_bytes());
            buf.extend_from_slice(&sig_expiration.to_be_bytes());
            buf.extend_from_slice(&sig_inception.to_be_bytes());
            buf.extend_from_slice(&key_tag.to_be_bytes());
            // RFC 4034 §3.1.7: the signer name is never compressed.
            name::append_name(buf, names, protocol, canonical_form, refuse_compression, signer_name, false, true)?;
            buf.extend_from_slice(signature);
            Ok(())
        }
        RData::Nsec { next_domain, type_bitmap } => {
            // RFC 3845 §2.1.1 forbids compression for classic DNS; RFC 6762
            // §18.14 mandates it for mDNS. Kept protocol-conditional rather
            // than "fixed" to one behavior (design-notes open question).
            let compress_next_domain = matches!(protocol, Protocol::Mdns);
            name::append_name(
                buf, names, protocol, canonical_form, refuse_compression, next_domain, compress_next_domain, false,
            )?;
            buf.extend_from_slice(&bitmap::encode(type_bitmap));
            Ok(())
        }
        RData::Nsec3 { hash_algorithm, flags, iterations, salt, next_hashed_owner, type_bitmap } => {
            buf.push(*hash_algorithm);
            buf.push(*flags);
            buf.extend_from_slice(&iterations.to_be_bytes());
            buf.push(salt.len() as u8);
            buf.extend_from_slice(salt);
            buf.push(next_hashed_owner.len() as u8);
            buf.extend_from_slice(next_hashed_owner);
            buf.extend_from_slice(&bitmap::encode(type_bitmap));
            Ok(())
        }
        RData::Unknown { raw, .. } => {
            buf.extend_from_slice(raw);
            Ok(())
        }
    }
}

/// Decode one record's RDATA. `rdata_start`/`rdlength` bound the RDATA
/// region; embedded names may still point anywhere earlier in `buf` via
/// compression, so decoding takes the whole buffer.
pub fn decode_rdata(
    rtype: RecordType,
    buf: &[u8],
    rdata_start: usize,
    rdlength: usize,
    allow_compression: bool,
    protocol: Protocol,
) -> Result<RData> {
    let end = rdata_start
        .checked_add(rdlength)
        .filter(|&e| e <= buf.len())
        .ok_or(CodecError::Truncated { at: rdata_start })?;

    let raw_fallback = || RData::Unknown {
        rtype: rtype.to_u16(),
        raw: buf[rdata_start..end].to_vec(),
    };

    match rtype {
        RecordType::A => {
            if rdlength != 4 {
                warn!(rdlength, "bad RDLENGTH for A record");
                return Err(CodecError::malformed("A record RDATA must be 4 bytes"));
            }
            let octets: [u8; 4] = buf[rdata_start..end].try_into().unwrap();
            Ok(RData::A { addr: Ipv4Addr::from(octets) })
        }
        RecordType::Aaaa => {
            if rdlength != 16 {
                warn!(rdlength, "bad RDLENGTH for AAAA record");
                return Err(CodecError::malformed("AAAA record RDATA must be 16 bytes"));
            }
            let octets: [u8; 16] = buf[rdata_start..end].try_into().unwrap();
            Ok(RData::Aaaa { addr: Ipv6Addr::from(octets) })
        }
        RecordType::Ns => {
            let (nsdname, after) = name::read_name(buf, rdata_start, allow_compression)?;
            check_fully_consumed(after, end)?;
            Ok(RData::Ns { nsdname })
        }
        RecordType::Cname => {
            let (cname, after) = name::read_name(buf, rdata_start, allow_compression)?;
            check_fully_consumed(after, end)?;
            Ok(RData::Cname { cname })
        }
        RecordType::Dname => {
            let (target, after) = name::read_name(buf, rdata_start, false)?;
            check_fully_consumed(after, end)?;
            Ok(RData::Dname { target })
        }
        RecordType::Ptr => {
            let (ptrdname, after) = name::read_name(buf, rdata_start, allow_compression)?;
            check_fully_consumed(after, end)?;
            Ok(RData::Ptr { ptrdname })
        }
        RecordType::Soa => {
            let (mname, after_mname) = name::read_name(buf, rdata_start, allow_compression)?;
            let (rname, after_rname) = name::read_name(buf, after_mname, allow_compression)?;
            if after_rname + 20 > end {
                return Err(CodecError::Truncated { at: after_rname });
            }
            check_fully_consumed(after_rname + 20, end)?;
            let read_u32 = |o: usize| u32::from_be_bytes(buf[o..o + 4].try_into().unwrap());
            Ok(RData::Soa {
                mname,
                rname,
                serial: read_u32(after_rname),
                refresh: read_u32(after_rname + 4),
                retry: read_u32(after_rname + 8),
                expire: read_u32(after_rname + 12),
                minimum: read_u32(after_rname + 16),
            })
        }
        RecordType::Mx => {
            if rdata_start + 2 > end {
                return Err(CodecError::Truncated { at: rdata_start });
            }
            let preference = u16::from_be_bytes([buf[rdata_start], buf[rdata_start + 1]]);
            let (exchange, after) = name::read_name(buf, rdata_start + 2, allow_compression)?;
            check_fully_consumed(after, end)?;
            Ok(RData::Mx { preference, exchange })
        }
        RecordType::Srv => {
            if rdata_start + 6 > end {
                return Err(CodecError::Truncated { at: rdata_start });
            }
            let priority = u16::from_be_bytes([buf[rdata_start], buf[rdata_start + 1]]);
            let weight = u16::from_be_bytes([buf[rdata_start + 2], buf[rdata_start + 3]]);
            let port = u16::from_be_bytes([buf[rdata_start + 4], buf[rdata_start + 5]]);
            let (target, after) = name::read_name(buf, rdata_start + 6, allow_compression)?;
            check_fully_consumed(after, end)?;
            Ok(RData::Srv { priority, weight, port, target })
        }
        RecordType::Txt | RecordType::Spf => {
            let mut offset = rdata_start;
            let mut items = Vec::new();
            if rdlength == 0 {
                items.push(Vec::new());
            } else {
                while offset < end {
                    items.push(read_character_string(buf, &mut offset, end)?);
                }
            }
            if matches!(rtype, RecordType::Txt) {
                Ok(RData::Txt { items })
            } else {
                Ok(RData::Spf { items })
            }
        }
        RecordType::Hinfo => {
            let mut offset = rdata_start;
            let cpu = read_character_string(buf, &mut offset, end)?;
            let os = read_character_string(buf, &mut offset, end)?;
            check_fully_consumed(offset, end)?;
            Ok(RData::Hinfo { cpu, os })
        }
        RecordType::Loc => {
            if rdlength < 1 {
                return Err(CodecError::Truncated { at: rdata_start });
            }
            let version = buf[rdata_start];
            if version != 0 || rdlength != 16 {
                return Ok(raw_fallback());
            }
            let size = buf[rdata_start + 1];
            let horiz_pre = buf[rdata_start + 2];
            let vert_pre = buf[rdata_start + 3];
            for byte in [size, horiz_pre, vert_pre] {
                if !loc_size_ok(byte) {
                    return Err(CodecError::malformed("LOC size/horiz_pre/vert_pre out of range"));
                }
            }
            let read_u32 = |o: usize| u32::from_be_bytes(buf[o..o + 4].try_into().unwrap());
            Ok(RData::Loc {
                version,
                size,
                horiz_pre,
                vert_pre,
                latitude: read_u32(rdata_start + 4),
                longitude: read_u32(rdata_start + 8),
                altitude: read_u32(rdata_start + 12),
            })
        }
        RecordType::Ds => {
            if rdlength <= 4 {
                return Err(CodecError::malformed("DS digest must not be empty"));
            }
            Ok(RData::Ds {
                key_tag: u16::from_be_bytes([buf[rdata_start], buf[rdata_start + 1]]),
                algorithm: buf[rdata_start + 2],
                digest_type: buf[rdata_start + 3],
                digest: buf[rdata_start + 4..end].to_vec(),
            })
        }
        RecordType::Sshfp => {
            if rdlength <= 2 {
                return Err(CodecError::malformed("SSHFP fingerprint must not be empty"));
            }
            Ok(RData::Sshfp {
                algorithm: buf[rdata_start],
                fp_type: buf[rdata_start + 1],
                fingerprint: buf[rdata_start + 2..end].to_vec(),
            })
        }
        RecordType::Dnskey => {
            if rdlength <= 4 {
                return Err(CodecError::malformed("DNSKEY public key must not be empty"));
            }
            Ok(RData::Dnskey {
                flags: u16::from_be_bytes([buf[rdata_start], buf[rdata_start + 1]]),
                protocol: buf[rdata_start + 2],
                algorithm: buf[rdata_start + 3],
                public_key: buf[rdata_start + 4..end].to_vec(),
            })
        }
        RecordType::Rrsig => {
            if rdata_start + 18 > end {
                return Err(CodecError::Truncated { at: rdata_start });
            }
            let read_u32 = |o: usize| u32::from_be_bytes(buf[o..o + 4].try_into().unwrap());
            let type_covered = u16::from_be_bytes([buf[rdata_start], buf[rdata_start + 1]]);
            let algorithm = buf[rdata_start + 2];
            let labels = buf[rdata_start + 3];
            let original_ttl = read_u32(rdata_start + 4);
            let sig_expiration = read_u32(rdata_start + 8);
            let sig_inception = read_u32(rdata_start + 12);
            let key_tag = u16::from_be_bytes([buf[rdata_start + 16], buf[rdata_start + 17]]);
            let (signer_name, after_signer) = name::read_name(buf, rdata_start + 18, false)?;
            if after_signer > end {
                return Err(CodecError::Truncated { at: after_signer });
            }
            if after_signer == end {
                return Err(CodecError::malformed("RRSIG signature must not be empty"));
            }
            Ok(RData::Rrsig {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                sig_expiration,
                sig_inception,
                key_tag,
                signer_name,
                signature: buf[after_signer..end].to_vec(),
            })
        }
        RecordType::Nsec => {
            let compress_next_domain = allow_compression && matches!(protocol, Protocol::Mdns);
            let (next_domain, after_name) = name::read_name(buf, rdata_start, compress_next_domain)?;
            if after_name > end {
                return Err(CodecError::Truncated { at: after_name });
            }
            let type_bitmap = bitmap::decode(&buf[after_name..end])?;
            Ok(RData::Nsec { next_domain, type_bitmap })
        }
        RecordType::Nsec3 => {
            if rdata_start + 5 > end {
                return Err(CodecError::Truncated { at: rdata_start });
            }
            let hash_algorithm = buf[rdata_start];
            let flags = buf[rdata_start + 1];
            let iterations = u16::from_be_bytes([buf[rdata_start + 2], buf[rdata_start + 3]]);
            let salt_len = buf[rdata_start + 4] as usize;
            let salt_start = rdata_start + 5;
            if salt_start + salt_len > end {
                return Err(CodecError::Truncated { at: salt_start });
            }
            let salt = buf[salt_start..salt_start + salt_len].to_vec();
            let hash_len_pos = salt_start + salt_len;
            if hash_len_pos >= end {
                return Err(CodecError::Truncated { at: hash_len_pos });
            }
            let hash_len = buf[hash_len_pos] as usize;
            let hash_start = hash_len_pos + 1;
            if hash_start + hash_len > end {
                return Err(CodecError::Truncated { at: hash_start });
            }
            let next_hashed_owner = buf[hash_start..hash_start + hash_len].to_vec();
            let type_bitmap = bitmap::decode(&buf[hash_start + hash_len..end])?;
            Ok(RData::Nsec3 {
                hash_algorithm,
                flags,
                iterations,
                salt,
                next_hashed_owner,
                type_bitmap,
            })
        }
        RecordType::Opt | RecordType::Any => Ok(raw_fallback()),
        RecordType::Unknown(_) => Ok(raw_fallback()),
    }
}
