//! BER decoder for the ACSE subset

use crate::ber::types::{BerLength, BerTag};
use cosem_core::{DlmsError, DlmsResult};

/// Reads TLV triplets from a borrowed slice
pub struct BerDecoder<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BerDecoder<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len().saturating_sub(self.position)
    }

    pub fn has_remaining(&self) -> bool {
        self.position < self.buffer.len()
    }

    /// Tag of the next triplet without consuming it.
    pub fn peek_tag(&self) -> DlmsResult<Option<BerTag>> {
        match self.buffer.get(self.position) {
            Some(byte) => BerTag::from_byte(*byte).map(Some),
            None => Ok(None),
        }
    }

    /// Read one triplet.
    ///
    /// # Returns
    ///
    /// The tag and a borrow of the content octets.
    ///
    /// # Errors
    ///
    /// Returns `Asn1Decoding` when the content runs past the end of input.
    /// The position is not moved on error.
    pub fn decode_tlv(&mut self) -> DlmsResult<(BerTag, &'a [u8])> {
        let start = self.position;
        let tag_byte = *self
            .buffer
            .get(start)
            .ok_or_else(|| DlmsError::Asn1Decoding("Missing tag".to_string()))?;
        let tag = BerTag::from_byte(tag_byte)?;
        let (length, consumed) = BerLength::decode(&self.buffer[start + 1..])?;
        let begin = start + 1 + consumed;
        let end = begin + length;
        if end > self.buffer.len() {
            return Err(DlmsError::Asn1Decoding(format!(
                "Content of tag {:02X} needs {} bytes, {} available",
                tag_byte,
                length,
                self.buffer.len() - begin
            )));
        }
        self.position = end;
        Ok((tag, &self.buffer[begin..end]))
    }

    /// Read a triplet and check it carries `expected`.
    pub fn decode_expected(&mut self, expected: BerTag) -> DlmsResult<&'a [u8]> {
        let start = self.position;
        let (tag, content) = self.decode_tlv()?;
        if tag != expected {
            self.position = start;
            return Err(DlmsError::Asn1Decoding(format!(
                "Expected tag {:02X}, found {:02X}",
                expected.to_byte(),
                tag.to_byte()
            )));
        }
        Ok(content)
    }

    pub fn decode_integer(&mut self) -> DlmsResult<i64> {
        let content = self.decode_expected(BerTag::universal(false, 2))?;
        integer_from_content(content)
    }

    pub fn decode_octet_string(&mut self) -> DlmsResult<Vec<u8>> {
        Ok(self.decode_expected(BerTag::universal(false, 4))?.to_vec())
    }

    pub fn decode_object_identifier(&mut self) -> DlmsResult<Vec<u32>> {
        let content = self.decode_expected(BerTag::universal(false, 6))?;
        object_identifier_from_content(content)
    }

    /// Content of a context-specific triplet with the given number.
    pub fn decode_context_specific(&mut self, number: u8, constructed: bool) -> DlmsResult<&'a [u8]> {
        self.decode_expected(BerTag::context_specific(constructed, number))
    }

    pub fn decode_application(&mut self, number: u8, constructed: bool) -> DlmsResult<&'a [u8]> {
        self.decode_expected(BerTag::application(constructed, number))
    }

    /// Skip the next triplet, returning its tag.
    pub fn skip_tlv(&mut self) -> DlmsResult<BerTag> {
        let (tag, _) = self.decode_tlv()?;
        Ok(tag)
    }
}

/// Decode two's complement INTEGER content octets.
pub fn integer_from_content(content: &[u8]) -> DlmsResult<i64> {
    if content.is_empty() || content.len() > 8 {
        return Err(DlmsError::Asn1Decoding(format!(
            "Invalid integer length {}",
            content.len()
        )));
    }
    let negative = content[0] & 0x80 != 0;
    let initial: i64 = if negative { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(initial, |acc, b| (acc << 8) | *b as i64))
}

/// Decode OBJECT IDENTIFIER content octets into arcs.
pub fn object_identifier_from_content(content: &[u8]) -> DlmsResult<Vec<u32>> {
    let mut values = Vec::new();
    let mut current: u32 = 0;
    for (i, byte) in content.iter().enumerate() {
        current = current
            .checked_mul(128)
            .ok_or_else(|| DlmsError::Asn1Decoding("Object identifier arc overflow".to_string()))?
            | (*byte & 0x7F) as u32;
        if byte & 0x80 == 0 {
            values.push(current);
            current = 0;
        } else if i == content.len() - 1 {
            return Err(DlmsError::Asn1Decoding(
                "Truncated object identifier".to_string(),
            ));
        }
    }
    let Some(first) = values.first().copied() else {
        return Err(DlmsError::Asn1Decoding("Empty object identifier".to_string()));
    };
    let (a, b) = match first {
        0..=39 => (0, first),
        40..=79 => (1, first - 40),
        _ => (2, first - 80),
    };
    let mut arcs = vec![a, b];
    arcs.extend_from_slice(&values[1..]);
    Ok(arcs)
}
