//! EDNS(0) OPT pseudo-record (RFC 6891): the extended-flags/UDP-payload-size
//! fields folded into the RR header's CLASS and TTL, plus a TLV option list
//! in RDATA. Options are carried as a flat `(code, data)` list rather than
//! decoded per option code, since this crate has no need to interpret any
//! particular option's payload.

use crate::error::{CodecError, Result};
use crate::records::{Record, RecordClass, RecordType, ResourceKey};

const DO_BIT: u32 = 0x8000;

/// A decoded EDNS(0) OPT pseudo-record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptRecord {
    pub udp_payload_size: u16,
    pub extended_rcode: u8,
    pub version: u8,
    pub dnssec_do: bool,
    pub options: Vec<(u16, Vec<u8>)>,
}

impl OptRecord {
    pub fn new(udp_payload_size: u16) -> Self {
        OptRecord {
            udp_payload_size,
            extended_rcode: 0,
            version: 0,
            dnssec_do: false,
            options: Vec::new(),
        }
    }

    /// Reinterpret a generic [`Record`] (owner name must be root, type OPT)
    /// as an OPT pseudo-record.
    pub fn from_record(record: &Record) -> Result<OptRecord> {
        if record.key.rtype != RecordType::Opt {
            return Err(CodecError::malformed("not an OPT record"));
        }
        if record.key.name != "." {
            return Err(CodecError::malformed("OPT owner name must be root"));
        }
        let raw = match &record.rdata {
            crate::records::RData::Unknown { raw, .. } => raw.as_slice(),
            _ => return Err(CodecError::malformed("OPT RDATA must be an option list")),
        };
        Ok(OptRecord {
            udp_payload_size: record.key.rclass.to_u16(),
            extended_rcode: ((record.ttl >> 24) & 0xFF) as u8,
            version: ((record.ttl >> 16) & 0xFF) as u8,
            dnssec_do: record.ttl & DO_BIT != 0,
            options: parse_options(raw)?,
        })
    }

    /// Render this OPT record back into the generic [`Record`] shape that
    /// `packet::Packet::append_rr` can write.
    pub fn to_record(&self) -> Record {
        let ttl = ((self.extended_rcode as u32) << 24)
            | ((self.version as u32) << 16)
            | if self.dnssec_do { DO_BIT } else { 0 };
        Record {
            key: ResourceKey {
                name: ".".to_string(),
                rtype: RecordType::Opt,
                rclass: RecordClass::Unknown(self.udp_payload_size),
                cache_flush: false,
            },
            ttl,
            rdata: crate::records::RData::Unknown {
                rtype: RecordType::Opt.to_u16(),
                raw: encode_options(&self.options),
            },
        }
    }
}

fn parse_options(rdata: &[u8]) -> Result<Vec<(u16, Vec<u8>)>> {
    let mut options = Vec::new();
    let mut offset = 0;
    while offset < rdata.len() {
        if offset + 4 > rdata.len() {
            return Err(CodecError::malformed("truncated EDNS option header"));
        }
        let code = u16::from_be_bytes([rdata[offset], rdata[offset + 1]]);
        let len = u16::from_be_bytes([rdata[offset + 2], rdata[offset + 3]]) as usize;
        offset += 4;
        if offset + len > rdata.len() {
            return Err(CodecError::malformed("truncated EDNS option data"));
        }
        options.push((code, rdata[offset..offset + len].to_vec()));
        offset += len;
    }
    Ok(options)
}

fn encode_options(options: &[(u16, Vec<u8>)]) -> Vec<u8> {
    let mut rdata = Vec::new();
    for (code, data) in options {
        rdata.extend_from_slice(&code.to_be_bytes());
        rdata.extend_from_slice(&(data.len() as u16).to_be_bytes());
        rdata.extend_from_slice(data);
    }
    rdata
}
