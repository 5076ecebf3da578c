//! A-XDR decoder for DLMS/COSEM
//!
//! [`get_data`] decodes one value from a [`ByteBuffer`]. Running out of
//! bytes is not an error: the function returns `Ok(None)`, clears
//! `info.complete` and leaves the buffer where the unfinished value (or the
//! unfinished array element) starts, so the call can be repeated once more
//! bytes have been appended.

use super::CodecOptions;
use cosem_core::datatypes::{BitString, CosemDateTime, DataInfo, DataType, Value};
use cosem_core::{ByteBuffer, DlmsError, DlmsResult};

/// Decode one value.
///
/// # Arguments
///
/// * `options` - Date-time decoding options
/// * `buff` - Input, read from its current position
/// * `info` - Decode context. Set `info.data_type` when the type is known
///   and no tag byte precedes the payload
///
/// # Returns
///
/// `Ok(Some(value))` when a whole value was decoded, `Ok(None)` when more
/// bytes are needed.
///
/// # Errors
///
/// Unknown type tags, compact arrays, invalid object counts and malformed
/// field values are hard errors.
pub fn get_data(
    options: &CodecOptions,
    buff: &mut ByteBuffer,
    info: &mut DataInfo,
) -> DlmsResult<Option<Value>> {
    decode(options, buff, info, false)
}

/// `nested` is set for array and structure elements, whose end is only
/// known once all their bytes have arrived.
fn decode(
    options: &CodecOptions,
    buff: &mut ByteBuffer,
    info: &mut DataInfo,
    nested: bool,
) -> DlmsResult<Option<Value>> {
    let start = buff.position();
    if buff.available() == 0 {
        info.complete = false;
        return Ok(None);
    }
    info.complete = true;
    let known_type = info.data_type.is_some();
    let data_type = match info.data_type {
        Some(t) => t,
        None => {
            let tag = buff.get_u8()?;
            DataType::from_u8(tag).ok_or_else(|| {
                buff.set_position(start).ok();
                DlmsError::InvalidData(format!("Invalid data type {}", tag))
            })?
        }
    };
    info.data_type = Some(data_type);
    if data_type == DataType::None {
        return Ok(Some(Value::None));
    }
    if buff.available() == 0 {
        return Ok(incomplete(buff, info, start, known_type));
    }

    let value = match data_type {
        DataType::Array | DataType::Structure => {
            return get_array(options, buff, info, start, known_type);
        }
        DataType::Boolean => fixed(buff, 1, |b| Ok(Value::Boolean(b.get_u8()? != 0)))?,
        DataType::BitString => get_bit_string(buff)?,
        DataType::Int32 => fixed(buff, 4, |b| Ok(Value::Int32(b.get_i32()?)))?,
        DataType::UInt32 => fixed(buff, 4, |b| Ok(Value::UInt32(b.get_u32()?)))?,
        DataType::OctetString => get_bytes(buff, known_type)?.map(Value::OctetString),
        DataType::String => get_bytes(buff, known_type)?.map(|bytes| {
            Value::String(bytes.iter().map(|b| *b as char).collect())
        }),
        DataType::StringUtf8 => match get_bytes(buff, known_type)? {
            Some(bytes) => Some(Value::Utf8String(String::from_utf8(bytes).map_err(|e| {
                DlmsError::InvalidData(format!("Invalid UTF-8 string: {}", e))
            })?)),
            None => None,
        },
        DataType::Bcd => fixed(buff, 1, |b| Ok(Value::Bcd(b.get_u8()?)))?,
        DataType::Int8 => fixed(buff, 1, |b| Ok(Value::Int8(b.get_i8()?)))?,
        DataType::Int16 => fixed(buff, 2, |b| Ok(Value::Int16(b.get_i16()?)))?,
        DataType::UInt8 => fixed(buff, 1, |b| Ok(Value::UInt8(b.get_u8()?)))?,
        DataType::UInt16 => fixed(buff, 2, |b| Ok(Value::UInt16(b.get_u16()?)))?,
        DataType::Int64 => fixed(buff, 8, |b| Ok(Value::Int64(b.get_i64()?)))?,
        DataType::UInt64 => fixed(buff, 8, |b| Ok(Value::UInt64(b.get_u64()?)))?,
        DataType::Enum => fixed(buff, 1, |b| Ok(Value::Enum(b.get_u8()?)))?,
        DataType::Float32 => fixed(buff, 4, |b| Ok(Value::Float32(b.get_f32()?)))?,
        DataType::Float64 => fixed(buff, 8, |b| Ok(Value::Float64(b.get_f64()?)))?,
        DataType::DateTime => get_date_time(options, buff, nested)?,
        DataType::Date => get_date(buff)?,
        DataType::Time => get_time(buff)?,
        DataType::CompactArray | DataType::None => {
            buff.set_position(start)?;
            return Err(DlmsError::InvalidData("Invalid data type".to_string()));
        }
    };

    match value {
        Some(value) => Ok(Some(value)),
        None => Ok(incomplete(buff, info, start, known_type)),
    }
}

/// Mark `info` incomplete and rewind to `start`.
fn incomplete(
    buff: &mut ByteBuffer,
    info: &mut DataInfo,
    start: usize,
    known_type: bool,
) -> Option<Value> {
    // start is always a position previously read from this buffer
    let _ = buff.set_position(start);
    if !known_type {
        info.data_type = None;
    }
    info.complete = false;
    None
}

fn fixed<F>(buff: &mut ByteBuffer, width: usize, read: F) -> DlmsResult<Option<Value>>
where
    F: FnOnce(&mut ByteBuffer) -> DlmsResult<Value>,
{
    if buff.available() < width {
        return Ok(None);
    }
    read(buff).map(Some)
}

/// Read an object count, mapping a truncated count to `None`.
fn object_count(buff: &mut ByteBuffer) -> DlmsResult<Option<usize>> {
    match buff.get_object_count() {
        Ok(count) => Ok(Some(count)),
        Err(DlmsError::NotEnoughData { .. }) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Octet-string payload. With a known type the rest of the buffer is the value.
fn get_bytes(buff: &mut ByteBuffer, known_type: bool) -> DlmsResult<Option<Vec<u8>>> {
    let len = if known_type {
        buff.available()
    } else {
        match object_count(buff)? {
            Some(len) => len,
            None => return Ok(None),
        }
    };
    if buff.available() < len {
        return Ok(None);
    }
    buff.get_slice(len).map(Some)
}

fn get_bit_string(buff: &mut ByteBuffer) -> DlmsResult<Option<Value>> {
    let bits = match object_count(buff)? {
        Some(bits) => bits,
        None => return Ok(None),
    };
    let len = BitString::byte_len(bits);
    if buff.available() < len {
        return Ok(None);
    }
    let bytes = buff.get_slice(len)?;
    Ok(Some(Value::BitString(BitString::new(bytes, bits)?)))
}

fn get_time(buff: &mut ByteBuffer) -> DlmsResult<Option<Value>> {
    if buff.available() < 4 {
        return Ok(None);
    }
    let mut bytes = [0u8; 4];
    buff.get(&mut bytes)?;
    Ok(Some(Value::Time(CosemDateTime::from_time_bytes(&bytes)?)))
}

fn get_date(buff: &mut ByteBuffer) -> DlmsResult<Option<Value>> {
    if buff.available() < 5 {
        return Ok(None);
    }
    let mut bytes = [0u8; 5];
    buff.get(&mut bytes)?;
    Ok(Some(Value::Date(CosemDateTime::from_date_bytes(&bytes)?)))
}

/// Date-time. Some meters send only the date or only the time part in a
/// date-time field, so a short top-level value is decoded as time or date.
/// A short element is just incomplete.
fn get_date_time(
    options: &CodecOptions,
    buff: &mut ByteBuffer,
    nested: bool,
) -> DlmsResult<Option<Value>> {
    let available = buff.available();
    if available < 12 {
        if nested {
            return Ok(None);
        }
        if available < 5 {
            return get_time(buff);
        } else if available < 6 {
            return get_date(buff);
        }
        return Ok(None);
    }
    let mut bytes = [0u8; 12];
    buff.get(&mut bytes)?;
    Ok(Some(Value::DateTime(CosemDateTime::from_date_time_bytes(
        &bytes,
        options.use_utc2_normal_time,
    )?)))
}

/// Array or structure. Completed elements are kept in `info.partial`; an
/// interrupted element is re-read from its start on the next call.
fn get_array(
    options: &CodecOptions,
    buff: &mut ByteBuffer,
    info: &mut DataInfo,
    start: usize,
    known_type: bool,
) -> DlmsResult<Option<Value>> {
    if info.count == 0 && info.index == 0 {
        match object_count(buff)? {
            Some(count) => info.count = count,
            None => return Ok(incomplete(buff, info, start, known_type)),
        }
        info.partial = Vec::with_capacity(info.count.min(buff.available()));
    }

    while info.index != info.count {
        let element_start = buff.position();
        let mut element = DataInfo::new();
        match decode(options, buff, &mut element, true)? {
            Some(value) => {
                info.partial.push(value);
                info.index += 1;
            }
            None => {
                buff.set_position(element_start)?;
                info.complete = false;
                return Ok(None);
            }
        }
    }

    info.complete = true;
    let items = std::mem::take(&mut info.partial);
    Ok(Some(match info.data_type {
        Some(DataType::Structure) => Value::Structure(items),
        _ => Value::Array(items),
    }))
}

/// Re-decode raw bytes as a value of a known type.
///
/// Used when a value arrived as an octet string but its real type is known
/// from the attribute schema (e.g. a date-time sent as an octet string).
///
/// # Errors
///
/// Returns `InvalidData` if the bytes do not form a complete value.
pub fn change_type(options: &CodecOptions, value: &[u8], data_type: DataType) -> DlmsResult<Value> {
    if value.is_empty() {
        return Ok(Value::None);
    }
    match data_type {
        DataType::None => Ok(Value::OctetString(value.to_vec())),
        DataType::OctetString => Ok(Value::OctetString(value.to_vec())),
        DataType::String => Ok(Value::String(value.iter().map(|b| *b as char).collect())),
        DataType::StringUtf8 => String::from_utf8(value.to_vec())
            .map(Value::Utf8String)
            .map_err(|e| DlmsError::InvalidData(format!("Invalid UTF-8 string: {}", e))),
        _ => {
            let mut buff = ByteBuffer::from_slice(value);
            let mut info = DataInfo::with_type(data_type);
            match get_data(options, &mut buff, &mut info)? {
                Some(v) => Ok(v),
                None => Err(DlmsError::InvalidData(format!(
                    "Not enough data to change type to {}",
                    data_type
                ))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::axdr::encoder::set_data;

    fn decode(bytes: &[u8]) -> DlmsResult<Option<Value>> {
        let mut buff = ByteBuffer::from_slice(bytes);
        let mut info = DataInfo::new();
        get_data(&CodecOptions::default(), &mut buff, &mut info)
    }

    #[test]
    fn test_decode_uint32_scenario() {
        let mut buff = ByteBuffer::from_slice(&[0x06, 0x00, 0x00, 0x03, 0xE8]);
        let mut info = DataInfo::new();
        let value = get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap();
        assert_eq!(value, Some(Value::UInt32(1000)));
        assert!(info.complete);
        assert_eq!(info.data_type, Some(DataType::UInt32));
        assert_eq!(buff.available(), 0);
    }

    #[test]
    fn test_decode_null_and_boolean() {
        assert_eq!(decode(&[0x00]).unwrap(), Some(Value::None));
        assert_eq!(decode(&[0x03, 0x02]).unwrap(), Some(Value::Boolean(true)));
        assert_eq!(decode(&[0x03, 0x00]).unwrap(), Some(Value::Boolean(false)));
    }

    #[test]
    fn test_empty_and_tag_only_are_incomplete() {
        assert_eq!(decode(&[]).unwrap(), None);

        let mut buff = ByteBuffer::from_slice(&[0x12]);
        let mut info = DataInfo::new();
        assert_eq!(get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap(), None);
        assert!(!info.complete);
        assert_eq!(buff.position(), 0);
        assert_eq!(info.data_type, None);
    }

    #[test]
    fn test_truncated_number_rewinds() {
        let mut buff = ByteBuffer::from_slice(&[0x06, 0x00, 0x00]);
        let mut info = DataInfo::new();
        assert_eq!(get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap(), None);
        assert_eq!(buff.position(), 0);
        buff.set_slice(&[0x03, 0xE8]);
        assert_eq!(
            get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap(),
            Some(Value::UInt32(1000))
        );
    }

    #[test]
    fn test_invalid_tags() {
        assert!(matches!(decode(&[0x07, 0x00]), Err(DlmsError::InvalidData(_))));
        assert!(matches!(
            decode(&[0x13, 0x00]),
            Err(DlmsError::InvalidData(ref m)) if m == "Invalid data type"
        ));
        assert!(matches!(decode(&[0x09, 0x83, 0x00]), Err(DlmsError::InvalidData(_))));
    }

    #[test]
    fn test_octet_string_and_strings() {
        assert_eq!(
            decode(&[0x09, 0x03, 0x01, 0x02, 0x03]).unwrap(),
            Some(Value::OctetString(vec![1, 2, 3]))
        );
        assert_eq!(decode(&[0x09, 0x03, 0x01, 0x02]).unwrap(), None);
        assert_eq!(
            decode(&[0x0A, 0x03, b'a', b'b', b'c']).unwrap(),
            Some(Value::String("abc".into()))
        );
        assert_eq!(
            decode(&[0x0C, 0x02, 0xC3, 0xA9]).unwrap(),
            Some(Value::Utf8String("é".into()))
        );
    }

    #[test]
    fn test_known_type_octet_string_takes_rest() {
        let mut buff = ByteBuffer::from_slice(&[0x01, 0x02, 0x03]);
        let mut info = DataInfo::with_type(DataType::OctetString);
        assert_eq!(
            get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap(),
            Some(Value::OctetString(vec![1, 2, 3]))
        );
    }

    #[test]
    fn test_bit_string() {
        let value = decode(&[0x04, 0x0A, 0xA0, 0xC0]).unwrap().unwrap();
        match value {
            Value::BitString(bits) => assert_eq!(bits.to_string(), "1010000011"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(decode(&[0x04, 0x0A, 0xA0]).unwrap(), None);
    }

    #[test]
    fn test_short_date_time_falls_back() {
        let time = decode(&[0x19, 0x0A, 0x00, 0x00, 0xFF]).unwrap().unwrap();
        assert!(matches!(time, Value::Time(t) if t.hour == 10));
        let date = decode(&[0x19, 0x07, 0xE8, 0x01, 0x02, 0xFF]).unwrap().unwrap();
        assert!(matches!(date, Value::Date(d) if d.year == 2024 && d.day == 2));
        assert_eq!(decode(&[0x19, 0x07, 0xE8, 0x01, 0x02, 0xFF, 0x00]).unwrap(), None);
    }

    #[test]
    fn test_date_time_elements_resume_byte_by_byte() {
        let options = CodecOptions::default();
        let first = CosemDateTime::new(2024, 1, 2, 7, 30, 1, 10, 60).unwrap();
        let second = CosemDateTime::new(2024, 12, 31, 23, 59, 59, 990, -120).unwrap();
        let date = CosemDateTime::date(2024, 2, 29).unwrap();
        let time = CosemDateTime::time(12, 0, 5, 0).unwrap();

        // {date-time, [date-time, date-time], date, time}
        let mut bytes = vec![0x02, 0x04, 0x19];
        bytes.extend_from_slice(&first.to_date_time_bytes(false));
        bytes.extend_from_slice(&[0x01, 0x02, 0x19]);
        bytes.extend_from_slice(&second.to_date_time_bytes(false));
        bytes.push(0x19);
        bytes.extend_from_slice(&first.to_date_time_bytes(false));
        bytes.push(0x1A);
        bytes.extend_from_slice(&date.to_date_bytes());
        bytes.push(0x1B);
        bytes.extend_from_slice(&time.to_time_bytes());

        let mut buff = ByteBuffer::from_slice(&bytes);
        let mut info = DataInfo::new();
        let whole = get_data(&options, &mut buff, &mut info).unwrap().unwrap();
        match &whole {
            Value::Structure(items) => {
                assert!(matches!(items[0], Value::DateTime(d) if d.hour == 7 && d.minute == 30));
                assert!(matches!(&items[1], Value::Array(a) if a.len() == 2));
                assert!(matches!(items[2], Value::Date(d) if d.month == 2 && d.day == 29));
                assert!(matches!(items[3], Value::Time(t) if t.hour == 12 && t.second == 5));
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut buff = ByteBuffer::new();
        let mut info = DataInfo::new();
        let mut result = None;
        for (i, byte) in bytes.iter().enumerate() {
            buff.set_u8(*byte);
            result = get_data(&options, &mut buff, &mut info).unwrap();
            if result.is_some() {
                assert_eq!(i, bytes.len() - 1);
                break;
            }
        }
        assert_eq!(result, Some(whole));
    }

    #[test]
    fn test_nested_structure() {
        let bytes = [
            0x02, 0x02, 0x12, 0x00, 0x08, 0x01, 0x02, 0x11, 0x01, 0x11, 0x02,
        ];
        assert_eq!(
            decode(&bytes).unwrap(),
            Some(Value::Structure(vec![
                Value::UInt16(8),
                Value::Array(vec![Value::UInt8(1), Value::UInt8(2)]),
            ]))
        );
    }

    fn sample_array() -> (Value, Vec<u8>) {
        let value = Value::Array(vec![
            Value::Structure(vec![Value::UInt32(1000), Value::OctetString(vec![1, 2, 3])]),
            Value::Structure(vec![Value::UInt32(2000), Value::OctetString(vec![4, 5])]),
            Value::Structure(vec![Value::UInt32(3000), Value::OctetString(vec![])]),
        ]);
        let mut buff = ByteBuffer::new();
        set_data(&CodecOptions::default(), &mut buff, DataType::Array, &value).unwrap();
        (value, buff.into_vec())
    }

    #[test]
    fn test_array_resumable_at_every_truncation() {
        let (expected, bytes) = sample_array();
        // Element starts: tag + count = 2 bytes, then each structure
        let mut element_starts = vec![2usize];
        let mut cursor = ByteBuffer::from_slice(&bytes);
        cursor.set_position(2).unwrap();
        for _ in 0..3 {
            let mut info = DataInfo::new();
            get_data(&CodecOptions::default(), &mut cursor, &mut info)
                .unwrap()
                .unwrap();
            element_starts.push(cursor.position());
        }

        for len in 0..bytes.len() {
            let mut buff = ByteBuffer::from_slice(&bytes[..len]);
            let mut info = DataInfo::new();
            let result = get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap();
            assert_eq!(result, None, "prefix {}", len);
            assert!(!info.complete);
            let last_start = element_starts
                .iter()
                .copied()
                .filter(|s| *s <= len)
                .max()
                .unwrap_or(0);
            assert!(buff.position() <= last_start, "prefix {}", len);
        }

        let mut buff = ByteBuffer::from_slice(&bytes);
        let mut info = DataInfo::new();
        assert_eq!(
            get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap(),
            Some(expected)
        );
    }

    #[test]
    fn test_array_resume_byte_by_byte() {
        let (expected, bytes) = sample_array();
        let mut buff = ByteBuffer::new();
        let mut info = DataInfo::new();
        let mut result = None;
        for byte in &bytes {
            buff.set_u8(*byte);
            result = get_data(&CodecOptions::default(), &mut buff, &mut info).unwrap();
            if result.is_some() {
                break;
            }
        }
        assert_eq!(result, Some(expected));
        assert!(info.complete);
        assert_eq!(info.index, 3);
        assert_eq!(buff.available(), 0);
    }

    #[test]
    fn test_change_type() {
        let options = CodecOptions::default();
        let bytes = [
            0x07, 0xE8, 0x03, 0x1F, 0x07, 0x0A, 0x1E, 0x00, 0x00, 0xFF, 0xC4, 0x00,
        ];
        let value = change_type(&options, &bytes, DataType::DateTime).unwrap();
        assert!(matches!(value, Value::DateTime(dt) if dt.day == 31 && dt.offset_minutes == 60));
        assert_eq!(
            change_type(&options, b"abc", DataType::String).unwrap(),
            Value::String("abc".into())
        );
        assert_eq!(change_type(&options, &[], DataType::UInt8).unwrap(), Value::None);
        assert!(change_type(&options, &[0x01], DataType::UInt16).is_err());
    }
}
