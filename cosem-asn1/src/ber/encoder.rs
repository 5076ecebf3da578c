//! BER encoder for the ACSE subset

use crate::ber::types::{BerLength, BerTag};

/// Accumulates BER TLV triplets
#[derive(Debug, Default)]
pub struct BerEncoder {
    buffer: Vec<u8>,
}

impl BerEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Append `tag`, the definite length of `value` and `value`.
    pub fn encode_tlv(&mut self, tag: BerTag, value: &[u8]) {
        self.buffer.push(tag.to_byte());
        self.buffer.extend_from_slice(&BerLength::encode(value.len()));
        self.buffer.extend_from_slice(value);
    }

    /// Universal INTEGER with minimal two's complement content.
    pub fn encode_integer(&mut self, value: i64) {
        let bytes = value.to_be_bytes();
        let mut start = 0;
        while start < 7 {
            let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
                || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
            if !redundant {
                break;
            }
            start += 1;
        }
        self.encode_tlv(BerTag::universal(false, 2), &bytes[start..]);
    }

    pub fn encode_octet_string(&mut self, value: &[u8]) {
        self.encode_tlv(BerTag::universal(false, 4), value);
    }

    /// Universal OBJECT IDENTIFIER from its arcs.
    pub fn encode_object_identifier(&mut self, arcs: &[u32]) {
        self.encode_tlv(BerTag::universal(false, 6), &object_identifier_content(arcs));
    }

    /// Context-specific tag around already encoded content.
    pub fn encode_context_specific(&mut self, number: u8, constructed: bool, value: &[u8]) {
        self.encode_tlv(BerTag::context_specific(constructed, number), value);
    }

    pub fn encode_application(&mut self, number: u8, constructed: bool, value: &[u8]) {
        self.encode_tlv(BerTag::application(constructed, number), value);
    }

    /// Append bytes that are already BER encoded.
    pub fn append_raw(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

/// Content octets of an OBJECT IDENTIFIER.
pub fn object_identifier_content(arcs: &[u32]) -> Vec<u8> {
    let mut out = Vec::new();
    if arcs.len() < 2 {
        return out;
    }
    let mut push_arc = |arc: u32| {
        let mut chunk = vec![(arc & 0x7F) as u8];
        let mut rest = arc >> 7;
        while rest != 0 {
            chunk.push(0x80 | (rest & 0x7F) as u8);
            rest >>= 7;
        }
        out.extend(chunk.iter().rev());
    };
    push_arc(arcs[0] * 40 + arcs[1]);
    for arc in &arcs[2..] {
        push_arc(*arc);
    }
    out
}
