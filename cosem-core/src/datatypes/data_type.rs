//! A-XDR type tags

use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire tag of a self-describing A-XDR value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    None = 0,
    Array = 1,
    Structure = 2,
    Boolean = 3,
    BitString = 4,
    Int32 = 5,
    UInt32 = 6,
    OctetString = 9,
    String = 10,
    StringUtf8 = 12,
    Bcd = 13,
    Int8 = 15,
    Int16 = 16,
    UInt8 = 17,
    UInt16 = 18,
    CompactArray = 19,
    Int64 = 20,
    UInt64 = 21,
    Enum = 22,
    Float32 = 23,
    Float64 = 24,
    DateTime = 25,
    Date = 26,
    Time = 27,
}

impl DataType {
    /// Map a wire tag to a type. Unknown tags return `None`.
    pub fn from_u8(tag: u8) -> Option<Self> {
        let data_type = match tag {
            0 => DataType::None,
            1 => DataType::Array,
            2 => DataType::Structure,
            3 => DataType::Boolean,
            4 => DataType::BitString,
            5 => DataType::Int32,
            6 => DataType::UInt32,
            9 => DataType::OctetString,
            10 => DataType::String,
            12 => DataType::StringUtf8,
            13 => DataType::Bcd,
            15 => DataType::Int8,
            16 => DataType::Int16,
            17 => DataType::UInt8,
            18 => DataType::UInt16,
            19 => DataType::CompactArray,
            20 => DataType::Int64,
            21 => DataType::UInt64,
            22 => DataType::Enum,
            23 => DataType::Float32,
            24 => DataType::Float64,
            25 => DataType::DateTime,
            26 => DataType::Date,
            27 => DataType::Time,
            _ => return None,
        };
        Some(data_type)
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    /// Encoded width of fixed-size types, excluding the tag
    pub fn fixed_size(self) -> Option<usize> {
        match self {
            DataType::Boolean
            | DataType::Int8
            | DataType::UInt8
            | DataType::Enum
            | DataType::Bcd => Some(1),
            DataType::Int16 | DataType::UInt16 => Some(2),
            DataType::Int32 | DataType::UInt32 | DataType::Float32 | DataType::Time => Some(4),
            DataType::Date => Some(5),
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => Some(8),
            DataType::DateTime => Some(12),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}
