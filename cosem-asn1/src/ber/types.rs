//! BER tag and length

use cosem_core::{DlmsError, DlmsResult};

/// BER tag class (bits 8-7 of the identifier octet)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BerTagClass {
    Universal = 0,
    Application = 1,
    ContextSpecific = 2,
    Private = 3,
}

impl BerTagClass {
    fn from_identifier(byte: u8) -> Self {
        match byte >> 6 {
            0 => BerTagClass::Universal,
            1 => BerTagClass::Application,
            2 => BerTagClass::ContextSpecific,
            _ => BerTagClass::Private,
        }
    }
}

/// Single-octet BER tag
///
/// ACSE only uses tag numbers below 31, so the multi-octet form is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BerTag {
    class: BerTagClass,
    constructed: bool,
    number: u8,
}

impl BerTag {
    pub const fn new(class: BerTagClass, constructed: bool, number: u8) -> Self {
        Self {
            class,
            constructed,
            number,
        }
    }

    pub const fn universal(constructed: bool, number: u8) -> Self {
        Self::new(BerTagClass::Universal, constructed, number)
    }

    pub const fn application(constructed: bool, number: u8) -> Self {
        Self::new(BerTagClass::Application, constructed, number)
    }

    pub const fn context_specific(constructed: bool, number: u8) -> Self {
        Self::new(BerTagClass::ContextSpecific, constructed, number)
    }

    pub fn class(&self) -> BerTagClass {
        self.class
    }

    pub fn is_constructed(&self) -> bool {
        self.constructed
    }

    pub fn number(&self) -> u8 {
        self.number
    }

    /// Identifier octet
    pub fn to_byte(&self) -> u8 {
        ((self.class as u8) << 6) | if self.constructed { 0x20 } else { 0 } | (self.number & 0x1F)
    }

    /// Parse an identifier octet.
    ///
    /// # Errors
    ///
    /// Returns `Asn1Decoding` for the multi-octet tag form.
    pub fn from_byte(byte: u8) -> DlmsResult<Self> {
        if byte & 0x1F == 0x1F {
            return Err(DlmsError::Asn1Decoding(format!(
                "Multi-octet tag {:02X} not supported",
                byte
            )));
        }
        Ok(Self {
            class: BerTagClass::from_identifier(byte),
            constructed: byte & 0x20 != 0,
            number: byte & 0x1F,
        })
    }
}

/// BER definite length
pub struct BerLength;

impl BerLength {
    /// Encode a definite length in short or long form.
    pub fn encode(length: usize) -> Vec<u8> {
        if length < 0x80 {
            return vec![length as u8];
        }
        let bytes = (length as u32).to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        let mut out = vec![0x80 | (4 - skip) as u8];
        out.extend_from_slice(&bytes[skip..]);
        out
    }

    /// Decode a definite length.
    ///
    /// # Returns
    ///
    /// `(length, bytes consumed)`
    ///
    /// # Errors
    ///
    /// Indefinite lengths, lengths wider than four bytes and truncated
    /// input are rejected.
    pub fn decode(data: &[u8]) -> DlmsResult<(usize, usize)> {
        let first = *data
            .first()
            .ok_or_else(|| DlmsError::Asn1Decoding("Missing length".to_string()))?;
        if first & 0x80 == 0 {
            return Ok((first as usize, 1));
        }
        let count = (first & 0x7F) as usize;
        if count == 0 || count > 4 {
            return Err(DlmsError::Asn1Decoding(format!(
                "Unsupported length form {:02X}",
                first
            )));
        }
        if data.len() < 1 + count {
            return Err(DlmsError::Asn1Decoding("Truncated length".to_string()));
        }
        let length = data[1..=count]
            .iter()
            .fold(0usize, |acc, b| (acc << 8) | *b as usize);
        Ok((length, 1 + count))
    }
}
