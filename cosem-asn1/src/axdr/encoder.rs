//! A-XDR encoder for DLMS/COSEM
//!
//! [`set_data`] writes a type tag and the payload. The value does not have
//! to match the requested type exactly: integers are converted with range
//! checks, hex text becomes an octet string and `'0'`/`'1'` text becomes a
//! bit string.

use super::CodecOptions;
use cosem_core::byte_buffer::from_hex;
use cosem_core::datatypes::{BitString, CosemDateTime, DataType, Value};
use cosem_core::{ByteBuffer, DlmsError, DlmsResult};

/// Type an array element is encoded as.
///
/// Dates and times inside arrays are sent as octet strings with a length
/// prefix.
pub fn value_type(value: &Value) -> DataType {
    match value {
        Value::Date(_) | Value::Time(_) | Value::DateTime(_) => DataType::OctetString,
        other => other.data_type(),
    }
}

/// Encode `value` as `data_type`.
///
/// # Arguments
///
/// * `options` - Date-time encoding options
/// * `buff` - Output, appended to
/// * `data_type` - Wire type
/// * `value` - Value to convert and write
///
/// # Errors
///
/// Returns `InvalidData` when the value cannot be represented as
/// `data_type`. Nothing is written in that case.
pub fn set_data(
    options: &CodecOptions,
    buff: &mut ByteBuffer,
    data_type: DataType,
    value: &Value,
) -> DlmsResult<()> {
    if matches!(data_type, DataType::Array | DataType::Structure) {
        if let Value::OctetString(encoded) = value {
            // Already encoded by the caller
            buff.set_slice(encoded);
            return Ok(());
        }
    }
    let mut out = ByteBuffer::new();
    out.set_u8(data_type.tag());
    write_payload(options, &mut out, data_type, value)?;
    buff.set_slice(out.data());
    Ok(())
}

fn write_payload(
    options: &CodecOptions,
    buff: &mut ByteBuffer,
    data_type: DataType,
    value: &Value,
) -> DlmsResult<()> {
    match data_type {
        DataType::None => {}
        DataType::Boolean => buff.set_u8(u8::from(to_bool(value)?)),
        DataType::Int8 => buff.set_i8(to_int(value, data_type)?),
        DataType::UInt8 | DataType::Enum | DataType::Bcd => buff.set_u8(to_int(value, data_type)?),
        DataType::Int16 => {
            // 0x8000 is the "not specified" deviation
            if value.as_integer() == Some(0x8000) {
                buff.set_u16(0x8000);
            } else {
                buff.set_i16(to_int(value, data_type)?);
            }
        }
        DataType::UInt16 => buff.set_u16(to_int(value, data_type)?),
        DataType::Int32 => buff.set_i32(to_int(value, data_type)?),
        DataType::UInt32 => buff.set_u32(to_int(value, data_type)?),
        DataType::Int64 => buff.set_i64(to_int(value, data_type)?),
        DataType::UInt64 => buff.set_u64(to_int(value, data_type)?),
        DataType::Float32 => buff.set_f32(to_float(value)? as f32),
        DataType::Float64 => buff.set_f64(to_float(value)?),
        DataType::BitString => {
            let bits = to_bit_string(value)?;
            buff.set_object_count(bits.num_bits());
            buff.set_slice(bits.as_bytes());
        }
        DataType::String | DataType::StringUtf8 => {
            let bytes: &[u8] = match value {
                Value::None => &[],
                Value::String(s) | Value::Utf8String(s) => s.as_bytes(),
                Value::OctetString(b) => b,
                other => return Err(mismatch(other, data_type)),
            };
            buff.set_object_count(bytes.len());
            buff.set_slice(bytes);
        }
        DataType::OctetString => match value {
            Value::Date(dt) => {
                buff.set_u8(5);
                buff.set_slice(&dt.to_date_bytes());
            }
            Value::Time(dt) => {
                buff.set_u8(4);
                buff.set_slice(&dt.to_time_bytes());
            }
            Value::DateTime(dt) => {
                buff.set_u8(12);
                buff.set_slice(&dt.to_date_time_bytes(options.use_utc2_normal_time));
            }
            Value::None => buff.set_object_count(0),
            Value::OctetString(bytes) => {
                buff.set_object_count(bytes.len());
                buff.set_slice(bytes);
            }
            Value::String(text) => {
                let bytes = from_hex(text)?;
                buff.set_object_count(bytes.len());
                buff.set_slice(&bytes);
            }
            other => return Err(mismatch(other, data_type)),
        },
        DataType::Array | DataType::Structure => match value {
            Value::Array(items) | Value::Structure(items) => {
                buff.set_object_count(items.len());
                for item in items {
                    set_data(options, buff, value_type(item), item)?;
                }
            }
            Value::None => buff.set_object_count(0),
            other => return Err(mismatch(other, data_type)),
        },
        DataType::Date => buff.set_slice(&to_date_time(value, data_type)?.to_date_bytes()),
        DataType::Time => buff.set_slice(&to_date_time(value, data_type)?.to_time_bytes()),
        DataType::DateTime => buff.set_slice(
            &to_date_time(value, data_type)?.to_date_time_bytes(options.use_utc2_normal_time),
        ),
        DataType::CompactArray => {
            return Err(DlmsError::InvalidData("Invalid data type".to_string()));
        }
    }
    Ok(())
}

fn mismatch(value: &Value, data_type: DataType) -> DlmsError {
    DlmsError::InvalidData(format!(
        "Cannot encode {} value as {}",
        value.data_type(),
        data_type
    ))
}

fn to_bool(value: &Value) -> DlmsResult<bool> {
    match value {
        Value::Boolean(b) => Ok(*b),
        Value::String(s) | Value::Utf8String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(mismatch(value, DataType::Boolean)),
        },
        other => other
            .as_integer()
            .map(|v| v != 0)
            .ok_or_else(|| mismatch(other, DataType::Boolean)),
    }
}

fn to_int<T: TryFrom<i128>>(value: &Value, data_type: DataType) -> DlmsResult<T> {
    let wide = match value {
        Value::String(s) | Value::Utf8String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| mismatch(value, data_type))?,
        other => other.as_integer().ok_or_else(|| mismatch(other, data_type))?,
    };
    T::try_from(wide).map_err(|_| {
        DlmsError::InvalidData(format!("Value {} is out of range for {}", wide, data_type))
    })
}

fn to_float(value: &Value) -> DlmsResult<f64> {
    match value {
        Value::String(s) | Value::Utf8String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| mismatch(value, DataType::Float64)),
        other => other.as_f64().ok_or_else(|| mismatch(other, DataType::Float64)),
    }
}

fn to_bit_string(value: &Value) -> DlmsResult<BitString> {
    match value {
        Value::BitString(bits) => Ok(bits.clone()),
        Value::String(s) => s.parse(),
        Value::UInt8(b) => BitString::new(vec![*b], 8),
        Value::None => Ok(BitString::default()),
        other => Err(mismatch(other, DataType::BitString)),
    }
}

fn to_date_time(value: &Value, data_type: DataType) -> DlmsResult<CosemDateTime> {
    match value {
        Value::Date(dt) | Value::Time(dt) | Value::DateTime(dt) => Ok(*dt),
        other => Err(mismatch(other, data_type)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axdr::decoder::get_data;
    use cosem_core::datatypes::DataInfo;

    fn encode(data_type: DataType, value: &Value) -> DlmsResult<Vec<u8>> {
        let mut buff = ByteBuffer::new();
        set_data(&CodecOptions::default(), &mut buff, data_type, value)?;
        Ok(buff.into_vec())
    }

    fn decode(bytes: &[u8]) -> Value {
        let mut buff = ByteBuffer::from_slice(bytes);
        let mut info = DataInfo::new();
        get_data(&CodecOptions::default(), &mut buff, &mut info)
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_uint32_scenario() {
        assert_eq!(
            encode(DataType::UInt32, &Value::UInt32(1000)).unwrap(),
            vec![0x06, 0x00, 0x00, 0x03, 0xE8]
        );
    }

    #[test]
    fn test_integer_conversion_range_checked() {
        assert_eq!(encode(DataType::UInt8, &Value::UInt32(200)).unwrap(), vec![0x11, 0xC8]);
        assert!(encode(DataType::UInt8, &Value::UInt32(300)).is_err());
        assert!(encode(DataType::UInt16, &Value::Int8(-1)).is_err());
        assert_eq!(
            encode(DataType::Int16, &Value::String("-2".into())).unwrap(),
            vec![0x10, 0xFF, 0xFE]
        );
        assert_eq!(
            encode(DataType::Int16, &Value::Int32(0x8000)).unwrap(),
            vec![0x10, 0x80, 0x00]
        );
        assert_eq!(encode(DataType::Enum, &Value::UInt8(3)).unwrap(), vec![0x16, 0x03]);
    }

    #[test]
    fn test_failed_encode_writes_nothing() {
        let mut buff = ByteBuffer::from_slice(&[0xAA]);
        assert!(set_data(
            &CodecOptions::default(),
            &mut buff,
            DataType::UInt8,
            &Value::Int16(-5)
        )
        .is_err());
        assert_eq!(buff.data(), &[0xAA]);
    }

    #[test]
    fn test_boolean() {
        assert_eq!(encode(DataType::Boolean, &Value::Boolean(true)).unwrap(), vec![0x03, 0x01]);
        assert_eq!(encode(DataType::Boolean, &Value::UInt8(0)).unwrap(), vec![0x03, 0x00]);
    }

    #[test]
    fn test_octet_string_from_hex_text() {
        assert_eq!(
            encode(DataType::OctetString, &Value::String("00 00 28 00 00 FF".into())).unwrap(),
            vec![0x09, 0x06, 0x00, 0x00, 0x28, 0x00, 0x00, 0xFF]
        );
        assert!(encode(DataType::OctetString, &Value::String("xyz".into())).is_err());
    }

    #[test]
    fn test_bit_string_from_text() {
        let bytes = encode(DataType::BitString, &Value::String("1010000011".into())).unwrap();
        assert_eq!(bytes, vec![0x04, 0x0A, 0xA0, 0xC0]);
    }

    #[test]
    fn test_date_time_wrapped_in_octet_string() {
        let dt = CosemDateTime::new(2024, 3, 31, 10, 30, 0, 0, 60).unwrap();
        let bytes = encode(DataType::OctetString, &Value::DateTime(dt)).unwrap();
        assert_eq!(bytes[..2], [0x09, 0x0C]);
        assert_eq!(bytes.len(), 14);

        let date = CosemDateTime::date(2024, 3, 31).unwrap();
        let bytes = encode(DataType::OctetString, &Value::Date(date)).unwrap();
        assert_eq!(bytes, vec![0x09, 0x05, 0x07, 0xE8, 0x03, 0x1F, 0x07]);
    }

    #[test]
    fn test_array_elements_inferred() {
        let time = CosemDateTime::time(1, 2, 3, 0).unwrap();
        let value = Value::Structure(vec![
            Value::UInt8(5),
            Value::Time(time),
            Value::Boolean(true),
        ]);
        let bytes = encode(DataType::Structure, &value).unwrap();
        assert_eq!(
            bytes,
            vec![0x02, 0x03, 0x11, 0x05, 0x09, 0x04, 0x01, 0x02, 0x03, 0x00, 0x03, 0x01]
        );
    }

    #[test]
    fn test_pre_encoded_array_appended_raw() {
        let raw = vec![0x01, 0x01, 0x11, 0x07];
        assert_eq!(encode(DataType::Array, &Value::OctetString(raw.clone())).unwrap(), raw);
    }

    #[test]
    fn test_compact_array_rejected() {
        assert!(encode(DataType::CompactArray, &Value::None).is_err());
    }

    #[test]
    fn test_round_trip_representative_values() {
        let dt = CosemDateTime::new(2024, 7, 1, 12, 0, 0, 0, 120).unwrap();
        let values = [
            Value::None,
            Value::Boolean(true),
            Value::Int8(-8),
            Value::Int16(-1600),
            Value::Int32(-320_000),
            Value::Int64(-6_400_000_000),
            Value::UInt8(8),
            Value::UInt16(1600),
            Value::UInt32(320_000),
            Value::UInt64(6_400_000_000),
            Value::Float32(1.25),
            Value::Float64(-2.5),
            Value::Enum(4),
            Value::Bcd(0x12),
            Value::OctetString(vec![0xDE, 0xAD]),
            Value::String("meter".into()),
            Value::Utf8String("zähler".into()),
            Value::DateTime(dt),
            Value::Array(vec![Value::UInt16(1), Value::UInt16(2)]),
        ];
        for value in values {
            let bytes = encode(value.data_type(), &value).unwrap();
            assert_eq!(decode(&bytes), value, "{:?}", value);
        }
    }
}
