use crate::error::{DlmsError, DlmsResult};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `A-B:C.D.E*F` or `A-B:C.D.E` (F defaults to 255)
static EXTENDED_FORMAT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,3})-(\d{1,3}):(\d{1,3})\.(\d{1,3})\.(\d{1,3})(?:\*(\d{1,3}))?$")
        .expect("valid OBIS pattern")
});

/// OBIS (Object Identification System) code, the logical name of a COSEM object
///
/// Logical names are 6-byte identifiers that address objects when the
/// association uses logical-name referencing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObisCode {
    bytes: [u8; 6],
}

impl ObisCode {
    /// Logical name of the current association (`0.0.40.0.0.255`)
    pub const CURRENT_ASSOCIATION: ObisCode = ObisCode::new(0, 0, 40, 0, 0, 255);

    /// Logical name of the clock (`0.0.1.0.0.255`)
    pub const CLOCK: ObisCode = ObisCode::new(0, 0, 1, 0, 0, 255);

    /// Create a new OBIS code from individual bytes
    ///
    /// # Arguments
    ///
    /// * `a` - First byte (A value)
    /// * `b` - Second byte (B value)
    /// * `c` - Third byte (C value)
    /// * `d` - Fourth byte (D value)
    /// * `e` - Fifth byte (E value)
    /// * `f` - Sixth byte (F value)
    pub const fn new(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> Self {
        Self {
            bytes: [a, b, c, d, e, f],
        }
    }

    /// Build from the 6 wire bytes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` unless `bytes` is exactly 6 long.
    pub fn from_bytes(bytes: &[u8]) -> DlmsResult<Self> {
        let bytes: [u8; 6] = bytes.try_into().map_err(|_| {
            DlmsError::InvalidData(format!(
                "Logical name must be 6 bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    /// Parse an OBIS code from string format
    ///
    /// Supports formats like:
    /// - "1.1.1.8.0.255"
    /// - "1-0:8.29.0*2"
    ///
    /// # Returns
    ///
    /// Returns `Ok(ObisCode)` if parsing succeeds, `Err(DlmsError)` otherwise
    pub fn from_string(s: &str) -> DlmsResult<Self> {
        let s = s.trim();
        if s.contains(':') {
            Self::parse_extended_format(s)
        } else {
            Self::parse_dot_format(s)
        }
    }

    fn parse_dot_format(s: &str) -> DlmsResult<Self> {
        let parts: Vec<&str> = s.split('.').collect();
        if parts.len() != 6 {
            return Err(DlmsError::InvalidData(format!(
                "Invalid logical name '{}': expected 6 dot-separated values",
                s
            )));
        }

        let mut bytes = [0u8; 6];
        for (i, part) in parts.iter().enumerate() {
            bytes[i] = parse_group(part)?;
        }

        Ok(Self { bytes })
    }

    fn parse_extended_format(s: &str) -> DlmsResult<Self> {
        let caps = EXTENDED_FORMAT
            .captures(s)
            .ok_or_else(|| DlmsError::InvalidData(format!("Invalid OBIS code format: {}", s)))?;

        let mut bytes = [255u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            if let Some(group) = caps.get(i + 1) {
                *byte = parse_group(group.as_str())?;
            }
        }
        Ok(Self { bytes })
    }

    /// Get the OBIS code as a byte array
    pub fn as_bytes(&self) -> &[u8; 6] {
        &self.bytes
    }

    /// Get the OBIS code as a copied byte array
    pub fn to_bytes(&self) -> [u8; 6] {
        self.bytes
    }

    pub fn a(&self) -> u8 {
        self.bytes[0]
    }

    pub fn b(&self) -> u8 {
        self.bytes[1]
    }

    pub fn c(&self) -> u8 {
        self.bytes[2]
    }

    pub fn d(&self) -> u8 {
        self.bytes[3]
    }

    pub fn e(&self) -> u8 {
        self.bytes[4]
    }

    pub fn f(&self) -> u8 {
        self.bytes[5]
    }
}

fn parse_group(part: &str) -> DlmsResult<u8> {
    part.trim()
        .parse::<u8>()
        .map_err(|_| DlmsError::InvalidData(format!("Invalid byte value: {}", part)))
}

impl FromStr for ObisCode {
    type Err = DlmsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl From<[u8; 6]> for ObisCode {
    fn from(bytes: [u8; 6]) -> Self {
        Self { bytes }
    }
}

impl fmt::Display for ObisCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}.{}.{}",
            self.bytes[0], self.bytes[1], self.bytes[2],
            self.bytes[3], self.bytes[4], self.bytes[5]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_obis_code_new() {
        let code = ObisCode::new(1, 1, 1, 8, 0, 255);
        assert_eq!(code.a(), 1);
        assert_eq!(code.f(), 255);
    }

    #[test]
    fn test_obis_code_from_string() {
        let code = ObisCode::from_string("1.1.1.8.0.255").unwrap();
        assert_eq!(code, ObisCode::new(1, 1, 1, 8, 0, 255));
    }

    #[test]
    fn test_obis_code_extended_format() {
        assert_eq!(
            ObisCode::from_string("1-0:8.29.0*2").unwrap(),
            ObisCode::new(1, 0, 8, 29, 0, 2)
        );
        assert_eq!(
            "1-0:1.8.0".parse::<ObisCode>().unwrap(),
            ObisCode::new(1, 0, 1, 8, 0, 255)
        );
    }

    #[test]
    fn test_obis_code_rejects_malformed() {
        assert!(ObisCode::from_string("1.1.1.8.0").is_err());
        assert!(ObisCode::from_string("1.1.1.8.0.256").is_err());
        assert!(ObisCode::from_string("1.1.x.8.0.255").is_err());
        assert!(ObisCode::from_string("1-0:8.29").is_err());
        assert!(ObisCode::from_bytes(&[1, 2, 3]).is_err());
    }

    #[test]
    fn test_obis_code_display() {
        let code = ObisCode::new(1, 1, 1, 8, 0, 255);
        assert_eq!(code.to_string(), "1.1.1.8.0.255");
        assert_eq!(ObisCode::CURRENT_ASSOCIATION.to_string(), "0.0.40.0.0.255");
    }
}
