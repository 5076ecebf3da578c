//! Typed value carried by A-XDR encoded PDUs

use crate::datatypes::bit_string::BitString;
use crate::datatypes::data_type::DataType;
use crate::datatypes::date_time::CosemDateTime;
use crate::error::{DlmsError, DlmsResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Container for data sent to or received from a meter
///
/// Stores numbers, lists, byte arrays, bit strings and date/time formats.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Null data
    #[default]
    None,
    Boolean(bool),
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    Enum(u8),
    Bcd(u8),
    OctetString(#[serde(with = "serde_bytes")] Vec<u8>),
    /// Visible (ASCII) string
    String(String),
    Utf8String(String),
    BitString(BitString),
    Array(Vec<Value>),
    Structure(Vec<Value>),
    Date(CosemDateTime),
    Time(CosemDateTime),
    DateTime(CosemDateTime),
}

impl Value {
    /// Wire type this value encodes as when no type is given
    pub fn data_type(&self) -> DataType {
        match self {
            Value::None => DataType::None,
            Value::Boolean(_) => DataType::Boolean,
            Value::Int8(_) => DataType::Int8,
            Value::Int16(_) => DataType::Int16,
            Value::Int32(_) => DataType::Int32,
            Value::Int64(_) => DataType::Int64,
            Value::UInt8(_) => DataType::UInt8,
            Value::UInt16(_) => DataType::UInt16,
            Value::UInt32(_) => DataType::UInt32,
            Value::UInt64(_) => DataType::UInt64,
            Value::Float32(_) => DataType::Float32,
            Value::Float64(_) => DataType::Float64,
            Value::Enum(_) => DataType::Enum,
            Value::Bcd(_) => DataType::Bcd,
            Value::OctetString(_) => DataType::OctetString,
            Value::String(_) => DataType::String,
            Value::Utf8String(_) => DataType::StringUtf8,
            Value::BitString(_) => DataType::BitString,
            Value::Array(_) => DataType::Array,
            Value::Structure(_) => DataType::Structure,
            Value::Date(_) => DataType::Date,
            Value::Time(_) => DataType::Time,
            Value::DateTime(_) => DataType::DateTime,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Value::None)
    }

    /// Check if this value is a number
    pub fn is_number(&self) -> bool {
        matches!(
            self,
            Value::Int8(_)
                | Value::Int16(_)
                | Value::Int32(_)
                | Value::Int64(_)
                | Value::UInt8(_)
                | Value::UInt16(_)
                | Value::UInt32(_)
                | Value::UInt64(_)
                | Value::Float32(_)
                | Value::Float64(_)
                | Value::Enum(_)
                | Value::Bcd(_)
        )
    }

    /// Integer content widened to `i128`. Floats and non-numbers return `None`.
    pub fn as_integer(&self) -> Option<i128> {
        match *self {
            Value::Boolean(b) => Some(i128::from(b)),
            Value::Int8(v) => Some(i128::from(v)),
            Value::Int16(v) => Some(i128::from(v)),
            Value::Int32(v) => Some(i128::from(v)),
            Value::Int64(v) => Some(i128::from(v)),
            Value::UInt8(v) | Value::Enum(v) | Value::Bcd(v) => Some(i128::from(v)),
            Value::UInt16(v) => Some(i128::from(v)),
            Value::UInt32(v) => Some(i128::from(v)),
            Value::UInt64(v) => Some(i128::from(v)),
            _ => None,
        }
    }

    /// Numeric content as `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Float32(v) => Some(f64::from(v)),
            Value::Float64(v) => Some(v),
            _ => self.as_integer().map(|v| v as f64),
        }
    }

    pub fn as_u8(&self) -> DlmsResult<u8> {
        self.as_integer()
            .and_then(|v| u8::try_from(v).ok())
            .ok_or_else(|| self.mismatch("u8"))
    }

    pub fn as_u16(&self) -> DlmsResult<u16> {
        self.as_integer()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| self.mismatch("u16"))
    }

    pub fn as_u32(&self) -> DlmsResult<u32> {
        self.as_integer()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| self.mismatch("u32"))
    }

    pub fn as_i8(&self) -> DlmsResult<i8> {
        self.as_integer()
            .and_then(|v| i8::try_from(v).ok())
            .ok_or_else(|| self.mismatch("i8"))
    }

    pub fn as_bool(&self) -> DlmsResult<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            _ => Err(self.mismatch("Boolean")),
        }
    }

    /// Byte content of octet strings and strings
    pub fn as_bytes(&self) -> DlmsResult<&[u8]> {
        match self {
            Value::OctetString(b) => Ok(b),
            Value::String(s) | Value::Utf8String(s) => Ok(s.as_bytes()),
            _ => Err(self.mismatch("OctetString")),
        }
    }

    pub fn as_array(&self) -> DlmsResult<&[Value]> {
        match self {
            Value::Array(items) => Ok(items),
            _ => Err(self.mismatch("Array")),
        }
    }

    pub fn as_structure(&self) -> DlmsResult<&[Value]> {
        match self {
            Value::Structure(items) => Ok(items),
            _ => Err(self.mismatch("Structure")),
        }
    }

    /// Elements of an array or a structure
    pub fn as_list(&self) -> DlmsResult<&[Value]> {
        match self {
            Value::Array(items) | Value::Structure(items) => Ok(items),
            _ => Err(self.mismatch("Array or Structure")),
        }
    }

    pub fn as_date_time(&self) -> DlmsResult<&CosemDateTime> {
        match self {
            Value::Date(dt) | Value::Time(dt) | Value::DateTime(dt) => Ok(dt),
            _ => Err(self.mismatch("DateTime")),
        }
    }

    fn mismatch(&self, expected: &str) -> DlmsError {
        DlmsError::InvalidData(format!("Expected {}, got {}", expected, self.data_type()))
    }
}

macro_rules! impl_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$variant(v)
            }
        })*
    };
}

impl_from! {
    bool => Boolean,
    i8 => Int8,
    i16 => Int16,
    i32 => Int32,
    i64 => Int64,
    u8 => UInt8,
    u16 => UInt16,
    u32 => UInt32,
    u64 => UInt64,
    f32 => Float32,
    f64 => Float64,
    Vec<u8> => OctetString,
    String => String,
    BitString => BitString,
    CosemDateTime => DateTime,
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::OctetString(v.to_vec())
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => write!(f, "None"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Int8(v) => write!(f, "{}", v),
            Value::Int16(v) => write!(f, "{}", v),
            Value::Int32(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt8(v) | Value::Enum(v) | Value::Bcd(v) => write!(f, "{}", v),
            Value::UInt16(v) => write!(f, "{}", v),
            Value::UInt32(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::OctetString(bytes) => {
                write!(f, "{}", crate::byte_buffer::to_hex(bytes))
            }
            Value::String(s) | Value::Utf8String(s) => write!(f, "{}", s),
            Value::BitString(bits) => write!(f, "{}", bits),
            Value::Array(items) | Value::Structure(items) => {
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i != 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            Value::Date(dt) | Value::Time(dt) | Value::DateTime(dt) => write!(f, "{}", dt),
        }
    }
}
