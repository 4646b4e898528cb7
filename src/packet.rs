//! The core mutable-buffer-with-cursor-state object (spec §3): one growable
//! byte buffer shared by an append cursor (the buffer's own length) and an
//! independent read cursor (`rindex`), plus the name-compression dictionary
//! built up as names are appended.
//!
//! Every compound operation (`append_rr`, `append_key`, `append_name`,
//! `read_rr`, `read_name`, ...) is transactional: on any [`CodecError`] the
//! buffer and dictionary (append side) or the read cursor (read side) are
//! restored to their state at entry. [`AppendGuard`] and [`ReadGuard`] carry
//! that rollback as a `Drop`-based RAII pattern, so a guard that goes out of
//! scope without an explicit `commit()` always leaves the packet exactly as
//! it found it.

use std::collections::HashMap;

use crate::edns::OptRecord;
use crate::error::{CodecError, Result, MAX_PACKET_SIZE};
use crate::header::{self, HeaderView, HEADER_SIZE};
use crate::name;
use crate::protocol::Protocol;
use crate::records::{self, RData, Record, RecordType, ResourceKey};

/// One non-OPT record out of the combined Answer+Authority+Additional walk
/// (spec §4.7 point 2). `cacheable` is true only for records that were
/// physically in the Answer section (RFC 2181 §5.2: Authority/Additional
/// data is not itself cacheable, only the Answer section is). `shared_owner` is mDNS-only: an RR
/// without the cache-flush bit set means its owner's RRset is collectively
/// owned by multiple responders (RFC 6762 §10.2).
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerEntry {
    pub record: Record,
    pub cacheable: bool,
    pub shared_owner: bool,
    pub ifindex: Option<u32>,
}

/// The fully-decoded shape of one message (spec §4.7): header fields pulled
/// out of the bitfield, the question list, the combined answer list (every
/// non-OPT RR from the Answer/Authority/Additional sections), and the
/// EDNS(0) OPT pseudo-record (if any), split out rather than left mixed in
/// with ordinary records.
#[derive(Debug, Clone, PartialEq)]
pub struct Extracted {
    pub id: u16,
    pub opcode: u8,
    pub rcode: u8,
    pub is_response: bool,
    pub authoritative: bool,
    pub truncated: bool,
    pub recursion_desired: bool,
    pub recursion_available: bool,
    pub authentic_data: bool,
    pub checking_disabled: bool,
    pub question: Vec<ResourceKey>,
    pub answer: Vec<AnswerEntry>,
    pub opt: Option<OptRecord>,
}

struct AppendGuard<'a> {
    buf: &'a mut Vec<u8>,
    names: &'a mut HashMap<String, u16>,
    saved_len: usize,
    saved_names: HashMap<String, u16>,
    committed: bool,
}

impl<'a> AppendGuard<'a> {
    fn new(buf: &'a mut Vec<u8>, names: &'a mut HashMap<String, u16>) -> Self {
        let saved_len = buf.len();
        let saved_names = names.clone();
        AppendGuard { buf, names, saved_len, saved_names, committed: false }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<'a> Drop for AppendGuard<'a> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::trace!(saved_len = self.saved_len, "rolling back append");
            self.buf.truncate(self.saved_len);
            *self.names = std::mem::take(&mut self.saved_names);
        }
    }
}

struct ReadGuard<'a> {
    rindex: &'a mut usize,
    saved: usize,
    committed: bool,
}

impl<'a> ReadGuard<'a> {
    fn new(rindex: &'a mut usize) -> Self {
        let saved = *rindex;
        ReadGuard { rindex, saved, committed: false }
    }

    fn commit(mut self) {
        self.committed = true;
    }
}

impl<'a> Drop for ReadGuard<'a> {
    fn drop(&mut self) {
        if !self.committed {
            tracing::trace!(saved = self.saved, "rolling back read cursor");
            *self.rindex = self.saved;
        }
    }
}

fn check_bound(len: usize) -> Result<()> {
    if len > MAX_PACKET_SIZE {
        Err(CodecError::MessageTooBig { attempted: len, max: MAX_PACKET_SIZE })
    } else {
        Ok(())
    }
}

/// Typical UDP+IP overhead subtracted from an MTU hint to get a payload
/// capacity estimate (spec §3).
const UDP_HEADER_SIZE: usize = 8;

/// Page size the initial capacity is rounded up to, so a handful of
/// small appends don't immediately force a reallocation.
const CAPACITY_PAGE: usize = 512;

fn initial_capacity(mtu: usize) -> usize {
    let bound = mtu.saturating_sub(UDP_HEADER_SIZE).max(HEADER_SIZE).min(MAX_PACKET_SIZE);
    bound.div_ceil(CAPACITY_PAGE) * CAPACITY_PAGE
}

/// A DNS/mDNS/LLMNR message being built or parsed.
pub struct Packet {
    buf: Vec<u8>,
    rindex: usize,
    names: HashMap<String, u16>,
    protocol: Protocol,
    canonical_form: bool,
    refuse_compression: bool,
    ifindex: Option<u32>,
    extracted: Option<Extracted>,
}

impl Packet {
    /// An empty packet with a zeroed 12-byte header, ready for appends.
    /// `mtu` is a capacity hint only: the initial buffer capacity is
    /// `max(mtu - UDP_HEADER_SIZE, 12)`, clamped to 65,535 and rounded up to
    /// a page boundary (spec §3). Growth past that capacity is handled by
    /// `Vec`'s own amortized strategy, same as any other append.
    pub fn new(protocol: Protocol, mtu: usize) -> Self {
        let mut buf = Vec::with_capacity(initial_capacity(mtu));
        buf.extend_from_slice(&[0u8; HEADER_SIZE]);
        Packet {
            buf,
            rindex: HEADER_SIZE,
            names: HashMap::new(),
            protocol,
            canonical_form: false,
            refuse_compression: false,
            ifindex: None,
            extracted: None,
        }
    }

    /// A query packet with protocol-default flags set (spec §4.2): RD=1
    /// for classic DNS, all-zero for LLMNR/mDNS, plus the caller's
    /// `cd_bit`. The transaction id is left at 0; set it with `set_id`.
    pub fn new_query(protocol: Protocol, mtu: usize, cd_bit: bool) -> Result<Self> {
        let mut packet = Packet::new(protocol, mtu);
        header::set_flags(&mut packet.buf, protocol, cd_bit, false)?;
        Ok(packet)
    }

    /// Wrap an already-encoded buffer for reading. The read cursor starts
    /// right after the header.
    pub fn from_bytes(protocol: Protocol, buf: Vec<u8>) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(CodecError::Truncated { at: buf.len() });
        }
        Ok(Packet {
            buf,
            rindex: HEADER_SIZE,
            names: HashMap::new(),
            protocol,
            canonical_form: false,
            refuse_compression: false,
            ifindex: None,
            extracted: None,
        })
    }

    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn size(&self) -> usize {
        self.buf.len()
    }

    pub fn rindex(&self) -> usize {
        self.rindex
    }

    pub fn ifindex(&self) -> Option<u32> {
        self.ifindex
    }

    pub fn set_ifindex(&mut self, ifindex: Option<u32>) {
        self.ifindex = ifindex;
    }

    /// DNSSEC canonical form (RFC 4034 §6.2): owner names and certain RDATA
    /// names lowercase their ASCII letters when this is set.
    pub fn set_canonical_form(&mut self, canonical_form: bool) {
        self.canonical_form = canonical_form;
    }

    pub fn canonical_form(&self) -> bool {
        self.canonical_form
    }

    /// Disable name compression entirely, for building packets that must
    /// not rely on the decompressor (e.g. DNSSEC signing input).
    pub fn set_refuse_compression(&mut self, refuse: bool) {
        self.refuse_compression = refuse;
    }

    pub fn header(&self) -> HeaderView<'_> {
        let bytes: &[u8; HEADER_SIZE] = self.buf[..HEADER_SIZE].try_into().unwrap();
        HeaderView::new(bytes)
    }

    pub fn set_id(&mut self, id: u16) {
        header::write_id(&mut self.buf, id);
    }

    pub fn set_flags(&mut self, dnssec_cd: bool, truncated: bool) -> Result<()> {
        header::set_flags(&mut self.buf, self.protocol, dnssec_cd, truncated)
    }

    pub fn set_rcode(&mut self, rcode: u8) {
        header::write_rcode(&mut self.buf, rcode);
    }

    pub fn set_counts(&mut self, qdcount: u16, ancount: u16, nscount: u16, arcount: u16) {
        header::write_counts(&mut self.buf, qdcount, ancount, nscount, arcount);
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        check_bound(self.buf.len() + additional)?;
        self.buf.try_reserve(additional).map_err(|_| CodecError::OutOfMemory)
    }

    // -- primitive append --------------------------------------------------

    pub fn append_u8(&mut self, v: u8) -> Result<()> {
        self.reserve(1)?;
        self.buf.push(v);
        Ok(())
    }

    pub fn append_u16(&mut self, v: u16) -> Result<()> {
        self.reserve(2)?;
        self.buf.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    pub fn append_u32(&mut self, v: u32) -> Result<()> {
        self.reserve(4)?;
        self.buf.extend_from_slice(&v.to_be_bytes());
        Ok(())
    }

    pub fn append_blob(&mut self, data: &[u8]) -> Result<()> {
        self.reserve(data.len())?;
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Append a length-prefixed character-string (RFC 1035 §3.3: a single
    /// length byte followed by up to 255 bytes of data).
    pub fn append_string(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > 255 {
            return Err(CodecError::malformed("character-string longer than 255 bytes"));
        }
        self.reserve(1 + data.len())?;
        self.buf.push(data.len() as u8);
        self.buf.extend_from_slice(data);
        Ok(())
    }

    /// Append a raw string with no length prefix (used for fixed-width or
    /// externally-bounded fields).
    pub fn append_raw_string(&mut self, data: &[u8]) -> Result<()> {
        self.append_blob(data)
    }

    /// Append a single raw length-prefixed label: one name component with
    /// no dot-escaping, no IDNA, and no compression, capped at
    /// [`name::MAX_LABEL_LEN`] bytes. Used to build a name out of
    /// already-decoded label bytes rather than presentation text.
    pub fn append_label(&mut self, label: &[u8]) -> Result<()> {
        if label.len() > name::MAX_LABEL_LEN {
            return Err(CodecError::NameTooLong);
        }
        self.reserve(1 + label.len())?;
        self.buf.push(label.len() as u8);
        self.buf.extend_from_slice(label);
        check_bound(self.buf.len())
    }

    pub fn append_name(&mut self, name: &str, allow_compression: bool, canonical_candidate: bool) -> Result<()> {
        let protocol = self.protocol;
        let canonical_form = self.canonical_form;
        let refuse_compression = self.refuse_compression;
        let guard = AppendGuard::new(&mut self.buf, &mut self.names);
        let result = name::append_name(
            &mut *guard.buf,
            &mut *guard.names,
            protocol,
            canonical_form,
            refuse_compression,
            name,
            allow_compression,
            canonical_candidate,
        )
        .and_then(|_| check_bound(guard.buf.len()));
        match result {
            Ok(()) => {
                guard.commit();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn append_key(&mut self, key: &ResourceKey, name_compression: bool) -> Result<()> {
        let protocol = self.protocol;
        let canonical_form = self.canonical_form;
        let refuse_compression = self.refuse_compression;
        let guard = AppendGuard::new(&mut self.buf, &mut self.names);
        let result = records::append_key(
            &mut *guard.buf,
            &mut *guard.names,
            protocol,
            canonical_form,
            refuse_compression,
            key,
            name_compression,
        )
        .and_then(|_| check_bound(guard.buf.len()));
        match result {
            Ok(()) => {
                guard.commit();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Append a full resource record: key, TTL, then RDATA framed by its
    /// own two-byte RDLENGTH, patched in after encoding (spec §4.6).
    pub fn append_rr(&mut self, key: &ResourceKey, ttl: u32, rdata: &RData, name_compression: bool) -> Result<()> {
        let protocol = self.protocol;
        let canonical_form = self.canonical_form;
        let refuse_compression = self.refuse_compression;
        let guard = AppendGuard::new(&mut self.buf, &mut self.names);
        let result = (|| -> Result<()> {
            records::append_key(
                &mut *guard.buf,
                &mut *guard.names,
                protocol,
                canonical_form,
                refuse_compression,
                key,
                name_compression,
            )?;
            guard.buf.extend_from_slice(&ttl.to_be_bytes());
            let rdlen_pos = guard.buf.len();
            guard.buf.extend_from_slice(&[0, 0]);
            let rdata_start = guard.buf.len();
            records::encode_rdata(
                &mut *guard.buf,
                &mut *guard.names,
                protocol,
                canonical_form,
                refuse_compression,
                rdata,
                name_compression,
            )?;
            let rdlen = guard.buf.len() - rdata_start;
            if rdlen > u16::MAX as usize {
                return Err(CodecError::malformed("RDATA exceeds 65535 bytes"));
            }
            guard.buf[rdlen_pos..rdlen_pos + 2].copy_from_slice(&(rdlen as u16).to_be_bytes());
            check_bound(guard.buf.len())
        })();
        match result {
            Ok(()) => {
                guard.commit();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    // -- primitive read ------------------------------------------------------

    fn require(&self, n: usize) -> Result<()> {
        if self.rindex + n > self.buf.len() {
            tracing::trace!(at = self.rindex, needed = n, len = self.buf.len(), "truncated read");
            Err(CodecError::Truncated { at: self.rindex })
        } else {
            Ok(())
        }
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.require(1)?;
        let v = self.buf[self.rindex];
        self.rindex += 1;
        Ok(v)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        self.require(2)?;
        let v = u16::from_be_bytes([self.buf[self.rindex], self.buf[self.rindex + 1]]);
        self.rindex += 2;
        Ok(v)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        self.require(4)?;
        let v = u32::from_be_bytes(self.buf[self.rindex..self.rindex + 4].try_into().unwrap());
        self.rindex += 4;
        Ok(v)
    }

    pub fn read_blob(&mut self, len: usize) -> Result<Vec<u8>> {
        self.require(len)?;
        let v = self.buf[self.rindex..self.rindex + len].to_vec();
        self.rindex += len;
        Ok(v)
    }

    pub fn read_string(&mut self) -> Result<Vec<u8>> {
        let saved = self.rindex;
        match self.read_u8().and_then(|len| self.read_blob(len as usize)) {
            Ok(v) => Ok(v),
            Err(e) => {
                self.rindex = saved;
                Err(e)
            }
        }
    }

    pub fn read_raw_string(&mut self, len: usize) -> Result<Vec<u8>> {
        self.read_blob(len)
    }

    pub fn read_name(&mut self, allow_compression: bool) -> Result<String> {
        let guard = ReadGuard::new(&mut self.rindex);
        let start = *guard.rindex;
        match name::read_name(&self.buf, start, allow_compression) {
            Ok((value, after)) => {
                *guard.rindex = after;
                guard.commit();
                Ok(value)
            }
            Err(e) => Err(e),
        }
    }

    pub fn read_key(&mut self, allow_compression: bool) -> Result<ResourceKey> {
        let guard = ReadGuard::new(&mut self.rindex);
        let mut offset = *guard.rindex;
        match records::read_key(&self.buf, &mut offset, allow_compression) {
            Ok(key) => {
                *guard.rindex = offset;
                guard.commit();
                Ok(key)
            }
            Err(e) => Err(e),
        }
    }

    /// Read a full resource record. The read cursor always lands exactly at
    /// `rdata_start + rdlength`, regardless of any compression pointers
    /// followed while decoding names inside the RDATA.
    pub fn read_rr(&mut self, allow_compression: bool) -> Result<Record> {
        let guard = ReadGuard::new(&mut self.rindex);
        let start = *guard.rindex;
        let result = (|| -> Result<(Record, usize)> {
            let mut offset = start;
            let key = records::read_key(&self.buf, &mut offset, allow_compression)?;
            if offset + 6 > self.buf.len() {
                return Err(CodecError::Truncated { at: offset });
            }
            let ttl = u32::from_be_bytes(self.buf[offset..offset + 4].try_into().unwrap());
            let rdlength = u16::from_be_bytes([self.buf[offset + 4], self.buf[offset + 5]]) as usize;
            let rdata_start = offset + 6;
            let rdata_end = rdata_start
                .checked_add(rdlength)
                .filter(|&e| e <= self.buf.len())
                .ok_or(CodecError::Truncated { at: rdata_start })?;
            let rdata =
                records::decode_rdata(key.rtype, &self.buf, rdata_start, rdlength, allow_compression, self.protocol)?;
            Ok((Record { key, ttl, rdata }, rdata_end))
        })();
        match result {
            Ok((record, end)) => {
                *guard.rindex = end;
                guard.commit();
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    /// Append an EDNS(0) OPT pseudo-record. Never compressed: its owner
    /// name is always root.
    pub fn append_opt_rr(&mut self, opt: &OptRecord) -> Result<()> {
        let record = opt.to_record();
        self.append_rr(&record.key, record.ttl, &record.rdata, false)
    }

    /// Saves the caller's read cursor, rewinds to byte 12, then decodes the
    /// question section and the combined Answer/Authority/Additional walk
    /// against the header's counts, splitting the EDNS(0) OPT pseudo-record
    /// (if present) into `opt`. Idempotent: a second call returns the cached
    /// result of the first without touching the buffer. Restores the
    /// caller's saved cursor on failure (spec §4.7).
    pub fn extract(&mut self) -> Result<Extracted> {
        if let Some(cached) = &self.extracted {
            return Ok(cached.clone());
        }
        let saved_rindex = self.rindex;
        self.rindex = HEADER_SIZE;
        match self.extract_inner() {
            Ok(extracted) => {
                self.extracted = Some(extracted.clone());
                Ok(extracted)
            }
            Err(e) => {
                self.rindex = saved_rindex;
                Err(e)
            }
        }
    }

    fn extract_inner(&mut self) -> Result<Extracted> {
        let allow_compression = !self.refuse_compression;
        let protocol = self.protocol;
        let ifindex = self.ifindex;

        let header = self.header();
        let id = header.id();
        let opcode = header.opcode();
        let rcode = header.rcode();
        let is_response = header.is_response();
        let authoritative = header.is_authoritative();
        let truncated = header.is_truncated();
        let recursion_desired = header.recursion_desired();
        let recursion_available = header.recursion_available();
        let authentic_data = header.authentic_data();
        let checking_disabled = header.checking_disabled();
        let qdcount = header.qdcount();
        let ancount = header.ancount();
        let nscount = header.nscount();
        let arcount = header.arcount();

        let mut question = Vec::with_capacity(qdcount as usize);
        for _ in 0..qdcount {
            let key = self.read_key(allow_compression)?;
            if protocol == Protocol::Mdns && key.cache_flush {
                tracing::warn!(name = %key.name, "cache-flush bit set in mDNS question section");
                return Err(CodecError::malformed("cache-flush bit set in mDNS question section"));
            }
            if !key.rtype.is_valid_query_type() {
                tracing::warn!(rtype = ?key.rtype, "invalid type in question section");
                return Err(CodecError::malformed("invalid type in question section"));
            }
            question.push(key);
        }

        let answer_authority_additional = ancount as u32 + nscount as u32 + arcount as u32;
        let additional_start = ancount as u32 + nscount as u32;
        let mut answer = Vec::with_capacity(answer_authority_additional as usize);
        let mut opt = None;
        for index in 0..answer_authority_additional {
            let record = self.read_rr(allow_compression)?;
            if record.key.rtype == RecordType::Opt {
                if record.key.name != "." {
                    tracing::warn!(name = %record.key.name, "OPT owner name must be root");
                    return Err(CodecError::malformed("OPT owner name must be root"));
                }
                if index < additional_start {
                    tracing::warn!(index, additional_start, "OPT record outside the additional section");
                    return Err(CodecError::malformed("OPT record outside the additional section"));
                }
                if opt.is_some() {
                    tracing::warn!("more than one OPT record");
                    return Err(CodecError::malformed("more than one OPT record"));
                }
                opt = Some(OptRecord::from_record(&record)?);
                continue;
            }
            let cacheable = index < ancount as u32;
            let shared_owner = protocol == Protocol::Mdns && !record.key.cache_flush;
            answer.push(AnswerEntry { record, cacheable, shared_owner, ifindex });
        }

        Ok(Extracted {
            id,
            opcode,
            rcode,
            is_response,
            authoritative,
            truncated,
            recursion_desired,
            recursion_available,
            authentic_data,
            checking_disabled,
            question,
            answer,
            opt,
        })
    }

    /// True iff this packet is a reply matching `key` (spec §4.8). See
    /// [`crate::validate::is_reply_for`] for the full rule.
    pub fn is_reply_for(&mut self, key: &ResourceKey) -> Result<bool> {
        crate::validate::is_reply_for(self, key)
    }

    pub fn rewind(&mut self, rindex: usize) {
        self.rindex = rindex.min(self.buf.len());
    }

    /// Truncate the buffer to `size`, discarding everything appended after
    /// it. Used by the mDNS/LLMNR responder path to fit a reply into one
    /// UDP datagram (spec §4.8).
    pub fn truncate(&mut self, size: usize) {
        self.buf.truncate(size.min(self.buf.len()));
        self.rindex = self.rindex.min(self.buf.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RecordClass, RecordType};
    use std::net::Ipv4Addr;

    #[test]
    fn a_record_query_byte_exact_layout() {
        let mut packet = Packet::new_query(Protocol::Dns, 1500, false).unwrap();
        packet.set_id(0x1234);
        packet.set_counts(1, 0, 0, 0);
        let key = ResourceKey {
            name: "example.com.".to_string(),
            rtype: RecordType::A,
            rclass: RecordClass::In,
            cache_flush: false,
        };
        packet.append_key(&key, true).unwrap();

        let mut expected = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        expected.extend_from_slice(b"\x07example\x03com\x00");
        expected.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        assert_eq!(packet.as_bytes(), expected.as_slice());
    }

    #[test]
    fn two_ns_records_compress_the_second_owner_name() {
        let mut packet = Packet::new(Protocol::Dns, 1500);
        let key = ResourceKey {
            name: "example.com.".to_string(),
            rtype: RecordType::Ns,
            rclass: RecordClass::In,
            cache_flush: false,
        };
        packet.append_rr(&key, 3600, &RData::Ns { nsdname: "ns1.example.com.".to_string() }, true).unwrap();
        let second_rr_start = packet.size();
        packet.append_rr(&key, 3600, &RData::Ns { nsdname: "ns2.example.com.".to_string() }, true).unwrap();

        // The second RR's owner name is a single 2-byte pointer back to the
        // first RR's owner name at offset HEADER_SIZE.
        assert_eq!(packet.as_bytes()[second_rr_start] & 0xC0, 0xC0);
        let ptr = (((packet.as_bytes()[second_rr_start] & 0x3F) as u16) << 8)
            | packet.as_bytes()[second_rr_start + 1] as u16;
        assert_eq!(ptr, HEADER_SIZE as u16);
    }

    #[test]
    fn append_rr_rolls_back_on_name_too_long() {
        let mut packet = Packet::new(Protocol::Dns, 1500);
        let before = packet.as_bytes().to_vec();
        let bad_key = ResourceKey {
            name: format!("{}.com.", "a".repeat(64)),
            rtype: RecordType::A,
            rclass: RecordClass::In,
            cache_flush: false,
        };
        let err = packet.append_rr(&bad_key, 0, &RData::A { addr: Ipv4Addr::new(127, 0, 0, 1) }, true).unwrap_err();
        assert_eq!(err, CodecError::NameTooLong);
        assert_eq!(packet.as_bytes(), before.as_slice());
    }

    #[test]
    fn read_rr_roundtrips_a_record() {
        let mut packet = Packet::new(Protocol::Dns, 1500);
        let key = ResourceKey {
            name: "example.com.".to_string(),
            rtype: RecordType::A,
            rclass: RecordClass::In,
            cache_flush: false,
        };
        let rdata = RData::A { addr: Ipv4Addr::new(93, 184, 216, 34) };
        packet.append_rr(&key, 300, &rdata, true).unwrap();

        let mut reader = Packet::from_bytes(Protocol::Dns, packet.into_bytes()).unwrap();
        let record = reader.read_rr(true).unwrap();
        assert_eq!(record.key, key);
        assert_eq!(record.ttl, 300);
        assert_eq!(record.rdata, rdata);
        assert_eq!(reader.rindex(), reader.size());
    }

    #[test]
    fn read_key_rolls_back_cursor_on_truncation() {
        let mut packet = Packet::new(Protocol::Dns, 1500);
        packet.append_name("example.com.", false, false).unwrap();
        // Only 2 of the 4 required TYPE/CLASS bytes follow.
        packet.append_u16(1).unwrap();
        let before = packet.rindex();
        let err = packet.read_key(false).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
        assert_eq!(packet.rindex(), before);
    }

    #[test]
    fn extract_splits_opt_out_of_additional_section() {
        let mut packet = Packet::new_query(Protocol::Dns, 1500, false).unwrap();
        packet.set_id(7);
        packet.append_key(&a_key_for_tests("example.com."), true).unwrap();
        let mut opt = crate::edns::OptRecord::new(4096);
        opt.dnssec_do = true;
        packet.append_opt_rr(&opt).unwrap();
        packet.set_counts(1, 0, 0, 1);

        let extracted = packet.extract().unwrap();
        assert_eq!(extracted.id, 7);
        assert!(!extracted.is_response);
        assert_eq!(extracted.question.len(), 1);
        assert!(extracted.answer.is_empty());
        assert_eq!(extracted.opt, Some(opt));
    }

    #[test]
    fn extract_rejects_opt_outside_additional_section() {
        let mut packet = Packet::new_query(Protocol::Dns, 1500, false).unwrap();
        let opt = crate::edns::OptRecord::new(4096).to_record();
        packet.append_rr(&opt.key, opt.ttl, &opt.rdata, false).unwrap();
        packet.set_counts(0, 1, 0, 0);

        let err = packet.extract().unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn extract_ignores_a_cursor_left_mid_buffer_by_a_prior_read() {
        let mut packet = Packet::new_query(Protocol::Dns, 1500, false).unwrap();
        packet.append_key(&a_key_for_tests("example.com."), true).unwrap();
        packet.set_counts(1, 0, 0, 0);

        let mut reader = Packet::from_bytes(Protocol::Dns, packet.into_bytes()).unwrap();
        // Advance the read cursor before calling extract, as a caller who
        // peeked at the question manually might do.
        reader.read_key(true).unwrap();
        assert_ne!(reader.rindex(), HEADER_SIZE);

        let extracted = reader.extract().unwrap();
        assert_eq!(extracted.question.len(), 1);
        assert_eq!(extracted.question[0].name, "example.com.");
    }

    #[test]
    fn extract_is_idempotent() {
        let mut packet = Packet::new_query(Protocol::Dns, 1500, false).unwrap();
        packet.set_id(9);
        packet.append_key(&a_key_for_tests("example.com."), true).unwrap();
        packet.set_counts(1, 0, 0, 0);

        let first = packet.extract().unwrap();
        let second = packet.extract().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn mdns_question_with_cache_flush_bit_is_malformed() {
        let mut packet = Packet::new(Protocol::Mdns, 1500);
        let key = a_key_for_tests("host.local.");
        // Build the key by hand: cache-flush bit has no meaning in a
        // question, but a malicious/buggy sender might still set it.
        packet.append_key(&ResourceKey { cache_flush: true, ..key }, false).unwrap();
        packet.set_counts(1, 0, 0, 0);

        let err = packet.extract().unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn answer_section_opt_before_additional_is_malformed() {
        // ancount=1, arcount=1: an OPT record claiming to occupy the answer
        // slot (index 0 < ancount+nscount) must be rejected (spec S5).
        let mut packet = Packet::new(Protocol::Dns, 1500);
        let opt = crate::edns::OptRecord::new(4096).to_record();
        packet.append_rr(&opt.key, opt.ttl, &opt.rdata, false).unwrap();
        packet.append_rr(&a_key_for_tests("example.com."), 60, &RData::A { addr: std::net::Ipv4Addr::new(1, 2, 3, 4) }, true)
            .unwrap();
        packet.set_counts(0, 1, 0, 1);

        let err = packet.extract().unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    fn a_key_for_tests(name: &str) -> ResourceKey {
        ResourceKey {
            name: name.to_string(),
            rtype: RecordType::A,
            rclass: RecordClass::In,
            cache_flush: false,
        }
    }

    #[test]
    fn mdns_cache_flush_bit_roundtrips() {
        let mut packet = Packet::new(Protocol::Mdns, 1500);
        let key = ResourceKey {
            name: "host.local.".to_string(),
            rtype: RecordType::A,
            rclass: RecordClass::In,
            cache_flush: true,
        };
        packet.append_rr(&key, 120, &RData::A { addr: Ipv4Addr::new(10, 0, 0, 1) }, false).unwrap();

        let mut reader = Packet::from_bytes(Protocol::Mdns, packet.into_bytes()).unwrap();
        let record = reader.read_rr(false).unwrap();
        assert!(record.key.cache_flush);
        assert_eq!(record.key.rclass, RecordClass::In);
    }
}
