//! Bit string value
//!
//! Bits are stored MSB-first: bit 0 is the most significant bit of the
//! first byte, unused trailing bits of the last byte are zero.

use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arbitrary string of bits. A bit string value can have any length including zero.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BitString {
    #[serde(with = "serde_bytes")]
    bytes: Vec<u8>,
    num_bits: usize,
}

impl BitString {
    /// Construct a new bit string object.
    ///
    /// # Arguments
    ///
    /// * `bytes` - Packed bits, MSB-first
    /// * `num_bits` - The number of bits
    ///
    /// # Errors
    ///
    /// Returns an error if `num_bits > bytes.len() * 8`. Extra bytes beyond
    /// `ceil(num_bits / 8)` are dropped.
    pub fn new(mut bytes: Vec<u8>, num_bits: usize) -> DlmsResult<Self> {
        if num_bits > bytes.len() * 8 {
            return Err(DlmsError::InvalidData(format!(
                "bit string is too short to hold all bits. Need {} bytes for {} bits",
                num_bits.div_ceil(8),
                num_bits
            )));
        }
        bytes.truncate(num_bits.div_ceil(8));
        Ok(Self { bytes, num_bits })
    }

    /// Number of bytes needed on the wire for `num_bits` bits
    pub fn byte_len(num_bits: usize) -> usize {
        num_bits.div_ceil(8)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn num_bits(&self) -> usize {
        self.num_bits
    }

    pub fn is_empty(&self) -> bool {
        self.num_bits == 0
    }

    /// Get the bit at a specific position
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the index is out of bounds.
    pub fn get_bit(&self, index: usize) -> DlmsResult<bool> {
        self.check_index(index)?;
        Ok((self.bytes[index / 8] >> (7 - index % 8)) & 1 == 1)
    }

    /// Set the bit at a specific position
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the index is out of bounds.
    pub fn set_bit(&mut self, index: usize, value: bool) -> DlmsResult<()> {
        self.check_index(index)?;
        let mask = 1 << (7 - index % 8);
        if value {
            self.bytes[index / 8] |= mask;
        } else {
            self.bytes[index / 8] &= !mask;
        }
        Ok(())
    }

    fn check_index(&self, index: usize) -> DlmsResult<()> {
        if index >= self.num_bits {
            return Err(DlmsError::InvalidData(format!(
                "Bit index {} out of bounds (num_bits: {})",
                index, self.num_bits
            )));
        }
        Ok(())
    }
}

impl FromStr for BitString {
    type Err = DlmsError;

    /// Parse a string of `'0'` and `'1'` characters; the first character is bit 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = vec![0u8; s.len().div_ceil(8)];
        for (index, ch) in s.chars().enumerate() {
            match ch {
                '1' => bytes[index / 8] |= 1 << (7 - index % 8),
                '0' => {}
                other => {
                    return Err(DlmsError::InvalidData(format!(
                        "Invalid bit string character '{}'",
                        other
                    )));
                }
            }
        }
        Ok(Self {
            bytes,
            num_bits: s.len(),
        })
    }
}

impl fmt::Display for BitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for index in 0..self.num_bits {
            let bit = (self.bytes[index / 8] >> (7 - index % 8)) & 1;
            write!(f, "{}", bit)?;
        }
        Ok(())
    }
}
