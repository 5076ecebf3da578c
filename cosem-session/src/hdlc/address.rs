//! HDLC addresses
//!
//! An address is 1, 2 or 4 bytes. Each byte carries 7 address bits and the
//! least significant bit marks the last byte.

use cosem_core::{DlmsError, DlmsResult};
use std::fmt;

/// Reserved HDLC addresses
pub mod reserved {
    pub const NO_STATION: u32 = 0x00;
    pub const CLIENT_MANAGEMENT_PROCESS: u32 = 0x01;
    pub const CLIENT_PUBLIC_CLIENT: u32 = 0x10;
    pub const CLIENT_ALL_STATION: u32 = 0x7F;
    pub const SERVER_UPPER_MANAGEMENT_LOGICAL_DEVICE: u16 = 0x01;
    pub const SERVER_UPPER_ALL_STATIONS_1BYTE: u16 = 0x7F;
    pub const SERVER_UPPER_ALL_STATIONS_2BYTE: u16 = 0x3FFF;
}

const ONE_BYTE_LIMIT: u32 = 0x80;
const TWO_BYTE_LIMIT: u32 = 0x4000;
const FOUR_BYTE_LIMIT: u32 = 0x1000_0000;

/// Address value together with its wire width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HdlcAddress {
    value: u32,
    byte_length: usize,
}

fn minimal_length(value: u32) -> DlmsResult<usize> {
    if value < ONE_BYTE_LIMIT {
        Ok(1)
    } else if value < TWO_BYTE_LIMIT {
        Ok(2)
    } else if value < FOUR_BYTE_LIMIT {
        Ok(4)
    } else {
        Err(DlmsError::InvalidData(format!(
            "HDLC address 0x{:X} does not fit in four bytes",
            value
        )))
    }
}

impl HdlcAddress {
    /// Address encoded with the smallest width that holds `value`.
    pub fn new(value: u32) -> DlmsResult<Self> {
        Ok(Self {
            value,
            byte_length: minimal_length(value)?,
        })
    }

    /// Address with a fixed width.
    ///
    /// # Errors
    ///
    /// Widths other than 1, 2 and 4 and values that do not fit are rejected.
    pub fn with_length(value: u32, byte_length: usize) -> DlmsResult<Self> {
        if !matches!(byte_length, 1 | 2 | 4) {
            return Err(DlmsError::InvalidData(format!(
                "Invalid HDLC address width {}",
                byte_length
            )));
        }
        if minimal_length(value)? > byte_length {
            return Err(DlmsError::InvalidData(format!(
                "HDLC address 0x{:X} does not fit in {} bytes",
                value, byte_length
            )));
        }
        Ok(Self { value, byte_length })
    }

    /// Client (source) address, always one byte.
    pub fn client(address: u8) -> DlmsResult<Self> {
        Self::with_length(address as u32, 1)
    }

    /// Server address from logical and physical device addresses.
    ///
    /// `logical << 7 | physical` in two bytes while both fit in 7 bits and
    /// no four byte address is requested, otherwise `logical << 14 |
    /// physical` in four bytes. The width always matches the layout so that
    /// [`logical_id`](Self::logical_id) and [`physical_id`](Self::physical_id)
    /// give back the same parts.
    pub fn server(logical: u16, physical: u16, byte_length: Option<usize>) -> DlmsResult<Self> {
        let wide = byte_length == Some(4) || logical >= 0x80 || physical >= 0x80;
        if !wide {
            let value = (logical as u32) << 7 | physical as u32;
            return Self::with_length(value, byte_length.unwrap_or(2));
        }
        if logical >= 0x4000 || physical >= 0x4000 {
            return Err(DlmsError::InvalidData(format!(
                "Server address {}/{} does not fit in four bytes",
                logical, physical
            )));
        }
        match byte_length {
            None | Some(4) => Self::with_length((logical as u32) << 14 | physical as u32, 4),
            Some(length) => Err(DlmsError::InvalidData(format!(
                "Server address {}/{} does not fit in {} bytes",
                logical, physical, length
            ))),
        }
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn byte_length(&self) -> usize {
        self.byte_length
    }

    /// Upper (logical device) part of a server address.
    pub fn logical_id(&self) -> u16 {
        match self.byte_length {
            4 => (self.value >> 14) as u16,
            2 => (self.value >> 7) as u16,
            _ => self.value as u16,
        }
    }

    /// Lower (physical device) part of a server address.
    pub fn physical_id(&self) -> u16 {
        match self.byte_length {
            4 => (self.value & 0x3FFF) as u16,
            2 => (self.value & 0x7F) as u16,
            _ => 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.byte_length);
        for i in (0..self.byte_length).rev() {
            out.push((((self.value >> (7 * i)) & 0x7F) << 1) as u8);
        }
        if let Some(last) = out.last_mut() {
            *last |= 1;
        }
        out
    }

    /// Decode an address at the start of `data`.
    ///
    /// # Returns
    ///
    /// The address and its width, or `None` when `data` ends before the
    /// terminating byte.
    ///
    /// # Errors
    ///
    /// Addresses of 3 or more than 4 bytes are rejected.
    pub fn decode(data: &[u8]) -> DlmsResult<Option<(Self, usize)>> {
        let mut value = 0u32;
        for (i, byte) in data.iter().enumerate() {
            if i >= 4 {
                break;
            }
            value = (value << 7) | (byte >> 1) as u32;
            if byte & 1 == 1 {
                let byte_length = i + 1;
                if byte_length == 3 {
                    return Err(DlmsError::FrameInvalid(
                        "Invalid HDLC address width 3".to_string(),
                    ));
                }
                return Ok(Some((Self { value, byte_length }, byte_length)));
            }
        }
        if data.len() >= 4 {
            return Err(DlmsError::FrameInvalid(
                "HDLC address longer than four bytes".to_string(),
            ));
        }
        Ok(None)
    }

    /// All-station (broadcast) server address
    pub fn is_all_station(&self) -> bool {
        match self.byte_length {
            1 => self.value == reserved::SERVER_UPPER_ALL_STATIONS_1BYTE as u32,
            2 => self.logical_id() == reserved::SERVER_UPPER_ALL_STATIONS_1BYTE,
            4 => self.logical_id() == reserved::SERVER_UPPER_ALL_STATIONS_2BYTE,
            _ => false,
        }
    }
}

impl fmt::Display for HdlcAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:0width$X}", self.value, width = self.byte_length * 2)
    }
}
