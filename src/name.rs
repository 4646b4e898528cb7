//! Name codec (spec §4.3): compression-aware encode/decode of DNS names,
//! with protocol-conditional IDNA normalization and DNSSEC canonical-form
//! lowercasing.
//!
//! Pointer-loop prevention uses a "jump barrier": every pointer target must
//! be strictly less than the lowest offset reached so far, which rules out
//! cycles and forward references by induction rather than by a jump
//! counter.

use std::collections::HashMap;

use tracing::trace;

use crate::error::{CodecError, Result};
use crate::header::HEADER_SIZE;
use crate::protocol::Protocol;

pub const MAX_LABEL_LEN: usize = 63;
pub const MAX_NAME_WIRE_LEN: usize = 255;
pub const MAX_COMPRESSION_OFFSET: u16 = 0x3FFF;

/// Split an escaped-text name into its labels, honoring `\.`-escaped dots.
/// A trailing root dot ("example.com.") yields no empty trailing label.
fn split_labels(name: &str) -> Vec<&str> {
    if name.is_empty() || name == "." {
        return Vec::new();
    }
    let bytes = name.as_bytes();
    let mut labels = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'.' => {
                labels.push(&name[start..i]);
                i += 1;
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < name.len() {
        labels.push(&name[start..]);
    }
    labels
}

/// Unescape one label of escaped text (`\.`, `\\`, `\DDD`) into raw bytes.
fn unescape_label(label: &str) -> Result<Vec<u8>> {
    let bytes = label.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' {
            i += 1;
            if i >= bytes.len() {
                return Err(CodecError::malformed("dangling escape in name"));
            }
            if bytes[i].is_ascii_digit() {
                if i + 3 > bytes.len() {
                    return Err(CodecError::malformed("truncated \\DDD escape"));
                }
                let digits = std::str::from_utf8(&bytes[i..i + 3])
                    .map_err(|_| CodecError::malformed("non-ascii \\DDD escape"))?;
                let val: u16 = digits
                    .parse()
                    .map_err(|_| CodecError::malformed("invalid \\DDD escape"))?;
                if val > 255 {
                    return Err(CodecError::malformed("\\DDD escape out of range"));
                }
                out.push(val as u8);
                i += 3;
            } else {
                out.push(bytes[i]);
                i += 1;
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Escape one decoded label's raw bytes into the accumulating text name.
fn escape_label(raw: &[u8], out: &mut String) {
    for &b in raw {
        match b {
            b'.' | b'\\' => {
                out.push('\\');
                out.push(b as char);
            }
            0x20..=0x7E => out.push(b as char),
            _ => out.push_str(&format!("\\{:03}", b)),
        }
    }
}

/// Apply protocol-conditional IDNA normalization to one already-unescaped
/// label. Non-UTF8 labels (opaque binary, as DNS-SD sometimes uses) pass
/// through unchanged — IDNA has nothing meaningful to say about them.
fn apply_idna(protocol: Protocol, label: Vec<u8>) -> Result<Vec<u8>> {
    let text = match std::str::from_utf8(&label) {
        Ok(t) if !t.is_empty() => t,
        _ => return Ok(label),
    };
    match protocol {
        Protocol::Dns => {
            if text.is_ascii() {
                return Ok(label);
            }
            idna::domain_to_ascii(text)
                .map(String::into_bytes)
                .map_err(|_| CodecError::malformed("idna to-ascii failed"))
        }
        Protocol::Mdns | Protocol::Llmnr => {
            let (unicode, result) = idna::domain_to_unicode(text);
            if result.is_err() {
                return Err(CodecError::malformed("idna to-unicode failed"));
            }
            Ok(unicode.into_bytes())
        }
    }
}

fn ascii_lowercase(bytes: &mut [u8]) {
    for b in bytes.iter_mut() {
        if b.is_ascii_uppercase() {
            *b = b.to_ascii_lowercase();
        }
    }
}

/// Encode `name` (escaped-text form) into `buf`, consulting and updating the
/// compression dictionary `names` (suffix-string -> offset). `allow_compression`
/// is forced off when `refuse_compression` is set on the owning packet.
#[allow(clippy::too_many_arguments)]
pub fn append_name(
    buf: &mut Vec<u8>,
    names: &mut HashMap<String, u16>,
    protocol: Protocol,
    canonical_form: bool,
    refuse_compression: bool,
    name: &str,
    allow_compression: bool,
    canonical_candidate: bool,
) -> Result<()> {
    let allow_compression = allow_compression && !refuse_compression;
    let raw_labels = split_labels(name);

    let mut final_labels: Vec<Vec<u8>> = Vec::with_capacity(raw_labels.len());
    for label in &raw_labels {
        let unescaped = unescape_label(label)?;
        let transformed = apply_idna(protocol, unescaped)?;
        if transformed.len() > MAX_LABEL_LEN {
            return Err(CodecError::NameTooLong);
        }
        final_labels.push(transformed);
    }

    let wire_len: usize = final_labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
    if wire_len > MAX_NAME_WIRE_LEN {
        return Err(CodecError::NameTooLong);
    }

    for idx in 0..final_labels.len() {
        let suffix_key = || -> String {
            let mut key = raw_labels[idx..].join(".");
            key.push('.');
            key
        };

        if allow_compression {
            if let Some(&offset) = names.get(&suffix_key()) {
                if (offset as usize) < buf.len() {
                    buf.extend_from_slice(&(0xC000u16 | offset).to_be_bytes());
                    return Ok(());
                }
            }
        }

        let label_offset = buf.len();
        let mut bytes = final_labels[idx].clone();
        if canonical_form && canonical_candidate {
            ascii_lowercase(&mut bytes);
        }
        buf.push(bytes.len() as u8);
        buf.extend_from_slice(&bytes);

        if allow_compression && label_offset <= MAX_COMPRESSION_OFFSET as usize {
            names.insert(suffix_key(), label_offset as u16);
        }
    }

    buf.push(0);
    Ok(())
}

/// Decode an escaped-text name starting at `start`. Returns the name and the
/// cursor position immediately after the name *in the original stream*
/// (i.e. the position right after the first pointer, if any were followed).
pub fn read_name(buf: &[u8], start: usize, allow_compression: bool) -> Result<(String, usize)> {
    let mut name = String::new();
    let mut offset = start;
    let mut jump_barrier = start;
    let mut restore_cursor: Option<usize> = None;
    let mut wire_len: usize = 0;

    loop {
        if offset >= buf.len() {
            return Err(CodecError::Truncated { at: offset });
        }
        let len = buf[offset];
        match len {
            0 => {
                if restore_cursor.is_none() {
                    restore_cursor = Some(offset + 1);
                }
                break;
            }
            1..=63 => {
                let label_len = len as usize;
                let label_start = offset + 1;
                if label_start + label_len > buf.len() {
                    return Err(CodecError::Truncated { at: label_start });
                }
                if !name.is_empty() {
                    name.push('.');
                }
                escape_label(&buf[label_start..label_start + label_len], &mut name);
                wire_len += 1 + label_len;
                if wire_len > MAX_NAME_WIRE_LEN {
                    return Err(CodecError::NameTooLong);
                }
                offset = label_start + label_len;
            }
            0xC0..=0xFF => {
                if !allow_compression {
                    trace!(offset, "compression pointer encountered where none is permitted");
                    return Err(CodecError::malformed("compression pointer not permitted here"));
                }
                if offset + 1 >= buf.len() {
                    return Err(CodecError::Truncated { at: offset + 1 });
                }
                let pointer = (((len & 0x3F) as usize) << 8) | buf[offset + 1] as usize;
                if restore_cursor.is_none() {
                    restore_cursor = Some(offset + 2);
                }
                if pointer < HEADER_SIZE || pointer >= jump_barrier {
                    trace!(offset, pointer, jump_barrier, "compression pointer loop or forward reference");
                    return Err(CodecError::malformed("compression pointer loop or forward reference"));
                }
                jump_barrier = pointer;
                offset = pointer;
            }
            _ => {
                trace!(offset, len, "invalid label length byte");
                return Err(CodecError::malformed("invalid label length byte"));
            }
        }
    }

    name.push('.');
    Ok((name, restore_cursor.unwrap_or(offset + 1)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dict() -> HashMap<String, u16> {
        HashMap::new()
    }

    #[test]
    fn encode_decode_simple_name() {
        let mut buf = Vec::new();
        let mut names = dict();
        append_name(&mut buf, &mut names, Protocol::Dns, false, false, "example.com.", true, false)
            .unwrap();
        assert_eq!(buf, b"\x07example\x03com\x00");
        let (name, end) = read_name(&buf, 0, true).unwrap();
        assert_eq!(name, "example.com.");
        assert_eq!(end, buf.len());
    }

    #[test]
    fn encode_root_name() {
        let mut buf = Vec::new();
        let mut names = dict();
        append_name(&mut buf, &mut names, Protocol::Dns, false, false, ".", true, false).unwrap();
        assert_eq!(buf, b"\x00");
        let (name, _) = read_name(&buf, 0, true).unwrap();
        assert_eq!(name, ".");
    }

    #[test]
    fn label_of_63_bytes_accepted_64_rejected() {
        let mut buf = Vec::new();
        let mut names = dict();
        let label63 = "a".repeat(63);
        let name = format!("{}.com.", label63);
        append_name(&mut buf, &mut names, Protocol::Dns, false, false, &name, false, false).unwrap();

        let mut buf2 = Vec::new();
        let mut names2 = dict();
        let label64 = "a".repeat(64);
        let name2 = format!("{}.com.", label64);
        let err = append_name(&mut buf2, &mut names2, Protocol::Dns, false, false, &name2, false, false)
            .unwrap_err();
        assert_eq!(err, CodecError::NameTooLong);
    }

    #[test]
    fn compression_pointer_written_for_repeated_suffix() {
        let mut buf = vec![0u8; HEADER_SIZE];
        let mut names = dict();
        append_name(&mut buf, &mut names, Protocol::Dns, false, false, "example.com.", true, false)
            .unwrap();
        let second_start = buf.len();
        append_name(&mut buf, &mut names, Protocol::Dns, false, false, "ns1.example.com.", true, false)
            .unwrap();
        // ns1 label (4 bytes) followed by a 2-byte pointer back to offset 12.
        assert_eq!(buf[second_start], 3);
        let ptr_pos = second_start + 1 + 3;
        assert_eq!(buf[ptr_pos] & 0xC0, 0xC0);
        let ptr = (((buf[ptr_pos] & 0x3F) as u16) << 8) | buf[ptr_pos + 1] as u16;
        assert_eq!(ptr, HEADER_SIZE as u16);
    }

    #[test]
    fn self_referencing_pointer_is_malformed() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf.extend_from_slice(&[0xC0, HEADER_SIZE as u8]);
        let err = read_name(&buf, HEADER_SIZE, true).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn pointer_into_header_is_malformed() {
        let mut buf = vec![0u8; HEADER_SIZE];
        buf.extend_from_slice(&[0xC0, 0x0B]);
        let err = read_name(&buf, HEADER_SIZE, true).unwrap_err();
        assert!(matches!(err, CodecError::Malformed { .. }));
    }

    #[test]
    fn canonical_form_lowercases_candidate_labels() {
        let mut buf = Vec::new();
        let mut names = dict();
        append_name(&mut buf, &mut names, Protocol::Dns, true, false, "WWW.Example.COM.", false, true)
            .unwrap();
        let (name, _) = read_name(&buf, 0, false).unwrap();
        assert_eq!(name, "www.example.com.");
    }

    #[test]
    fn non_canonical_candidate_preserves_case() {
        let mut buf = Vec::new();
        let mut names = dict();
        append_name(&mut buf, &mut names, Protocol::Dns, true, false, "WWW.Example.COM.", false, false)
            .unwrap();
        let (name, _) = read_name(&buf, 0, false).unwrap();
        assert_eq!(name, "WWW.Example.COM.");
    }

    #[test]
    fn refuse_compression_disables_pointer_use_and_dictionary_reads() {
        let mut buf = vec![0u8; HEADER_SIZE];
        let mut names = dict();
        append_name(&mut buf, &mut names, Protocol::Dns, false, true, "example.com.", true, false)
            .unwrap();
        let second_start = buf.len();
        append_name(&mut buf, &mut names, Protocol::Dns, false, true, "example.com.", true, false)
            .unwrap();
        // No pointer: fully spelled out again.
        assert_eq!(buf[second_start], 7);
    }
}
