//! Reply PDU parser
//!
//! [`get_pdu`] reads one deframed response PDU into a [`ReplyData`].
//! Successive data blocks of the same transfer are appended to
//! `ReplyData::data`; `more_data` tells the caller whether to ask for the
//! next block.

use crate::pdu::{
    ActionResponseType, ExceptionServiceError, GetResponseType, SetResponseType,
    SingleReadResponse, SingleWriteResponse, StateError,
};
use crate::settings::Settings;
use cosem_asn1::{get_data, CodecOptions, ConfirmedServiceError};
use cosem_core::{ByteBuffer, Command, CosemDateTime, DataInfo, DlmsError, DlmsResult, ErrorCode, Value};

/// What is still missing from a reply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoreData {
    #[default]
    None,
    /// The link layer has more segments of this PDU
    Frame,
    /// The server has more data blocks
    Block,
}

/// Accumulated content of one reply
#[derive(Debug, Clone, Default)]
pub struct ReplyData {
    pub command: Option<Command>,
    /// Response type of LN replies, item choice of SN replies
    pub command_type: u8,
    /// Payload, appended to across data blocks
    pub data: ByteBuffer,
    pub more_data: MoreData,
    /// Data-access-result or action result other than success
    pub error: Option<ErrorCode>,
    pub invoke_id: u32,
    /// Number of the last block received
    pub block_number: u32,
    /// Item count of list replies
    pub total_count: usize,
    /// Date-time of an access response
    pub time: Option<CosemDateTime>,
}

impl ReplyData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_complete(&self) -> bool {
        self.more_data == MoreData::None
    }

    /// Decode the single value carried by a complete reply.
    ///
    /// An empty payload decodes as [`Value::None`].
    pub fn value(&self, options: &CodecOptions) -> DlmsResult<Value> {
        if self.data.size() == 0 {
            return Ok(Value::None);
        }
        let mut buff = ByteBuffer::from_slice(self.data.data());
        let mut info = DataInfo::new();
        get_data(options, &mut buff, &mut info)?
            .ok_or_else(|| DlmsError::InvalidData("Reply value is incomplete".to_string()))
    }
}

/// Parse one reply PDU.
///
/// # Errors
///
/// Returns `Protocol` for exception responses, confirmed-service-errors
/// and data blocks out of sequence. Malformed PDUs fail with
/// `InvalidData` or `NotEnoughData`. A data-access-result is not an error:
/// it is stored in `reply.error`.
pub fn get_pdu(settings: &mut Settings, pdu: &[u8], reply: &mut ReplyData) -> DlmsResult<()> {
    let mut buff = ByteBuffer::from_slice(pdu);
    let tag = buff.get_u8()?;
    let command = Command::from_u8(tag)
        .ok_or_else(|| DlmsError::InvalidData(format!("Invalid command {:#04X}", tag)))?;
    reply.command = Some(command);
    reply.more_data = MoreData::None;
    match command {
        Command::GetResponse => handle_get_response(settings, &mut buff, reply),
        Command::SetResponse => handle_set_response(&mut buff, reply),
        Command::MethodResponse => handle_method_response(&mut buff, reply),
        Command::AccessResponse => handle_access_response(settings, &mut buff, reply),
        Command::ReadResponse => handle_read_response(settings, &mut buff, reply),
        Command::WriteResponse => handle_write_response(&mut buff, reply),
        Command::Aare | Command::ReleaseResponse => {
            reply.data.set_slice(pdu);
            Ok(())
        }
        Command::ConfirmedServiceError => {
            let error = ConfirmedServiceError::decode(pdu)?;
            Err(DlmsError::Protocol(format!("Confirmed service error: {}", error)))
        }
        Command::ExceptionResponse => {
            let state = StateError::parse(buff.get_u8()?)?;
            let service = ExceptionServiceError::parse(buff.get_u8()?)?;
            Err(DlmsError::Protocol(format!(
                "Exception response: {} {}",
                state, service
            )))
        }
        other => Err(DlmsError::InvalidData(format!(
            "Unexpected reply {:?}",
            other
        ))),
    }
}

fn read_error(buff: &mut ByteBuffer) -> DlmsResult<ErrorCode> {
    Ok(ErrorCode::from_u8(buff.get_u8()?))
}

fn handle_get_response(
    settings: &mut Settings,
    buff: &mut ByteBuffer,
    reply: &mut ReplyData,
) -> DlmsResult<()> {
    let response_type = GetResponseType::parse(buff.get_u8()?)?;
    reply.command_type = response_type.as_u8();
    reply.invoke_id = u32::from(buff.get_u8()?);
    match response_type {
        GetResponseType::Normal => {
            if buff.get_u8()? != 0 {
                reply.error = Some(read_error(buff)?);
                return Ok(());
            }
            reply.data.set_buffer(buff);
        }
        GetResponseType::WithDataBlock => {
            let last = buff.get_u8()? != 0;
            let number = buff.get_u32()?;
            if number != settings.block_index() {
                return Err(DlmsError::Protocol(format!(
                    "Invalid block number. It is {} and it should be {}",
                    number,
                    settings.block_index()
                )));
            }
            reply.block_number = number;
            if buff.get_u8()? != 0 {
                reply.error = Some(read_error(buff)?);
                return Ok(());
            }
            let count = buff.get_object_count()?;
            if count != buff.available() {
                return Err(DlmsError::InvalidData(format!(
                    "Data block of {} bytes announced, {} received",
                    count,
                    buff.available()
                )));
            }
            reply.data.set_buffer(buff);
            if !last {
                reply.more_data = MoreData::Block;
            }
        }
        GetResponseType::WithList => {
            reply.data.set_buffer(buff);
        }
    }
    Ok(())
}

fn handle_set_response(buff: &mut ByteBuffer, reply: &mut ReplyData) -> DlmsResult<()> {
    let response_type = SetResponseType::parse(buff.get_u8()?)?;
    reply.command_type = response_type.as_u8();
    reply.invoke_id = u32::from(buff.get_u8()?);
    match response_type {
        SetResponseType::Normal => {
            let result = read_error(buff)?;
            if !result.is_ok() {
                reply.error = Some(result);
            }
        }
        SetResponseType::DataBlock => {
            reply.block_number = buff.get_u32()?;
        }
        SetResponseType::LastDataBlock => {
            let result = read_error(buff)?;
            if !result.is_ok() {
                reply.error = Some(result);
            }
            reply.block_number = buff.get_u32()?;
        }
        SetResponseType::WithList | SetResponseType::LastDataBlockWithList => {
            let count = buff.get_object_count()?;
            reply.total_count = count;
            for _ in 0..count {
                let result = read_error(buff)?;
                if !result.is_ok() && reply.error.is_none() {
                    reply.error = Some(result);
                }
            }
        }
    }
    Ok(())
}

fn handle_method_response(buff: &mut ByteBuffer, reply: &mut ReplyData) -> DlmsResult<()> {
    let response_type = ActionResponseType::parse(buff.get_u8()?)?;
    reply.command_type = response_type.as_u8();
    reply.invoke_id = u32::from(buff.get_u8()?);
    if response_type != ActionResponseType::Normal {
        return Err(DlmsError::Protocol(format!(
            "Action response {} is not supported",
            response_type
        )));
    }
    let result = read_error(buff)?;
    if !result.is_ok() {
        reply.error = Some(result);
    }
    // Optional return parameters
    if buff.available() != 0 && buff.get_u8()? != 0 {
        if buff.get_u8()? == 0 {
            reply.data.set_buffer(buff);
        } else {
            reply.error = Some(read_error(buff)?);
        }
    }
    Ok(())
}

fn handle_access_response(
    settings: &Settings,
    buff: &mut ByteBuffer,
    reply: &mut ReplyData,
) -> DlmsResult<()> {
    reply.invoke_id = buff.get_u32()?;
    let length = buff.get_object_count()?;
    if length != 0 {
        let bytes = buff.get_slice(length)?;
        let bytes: [u8; 12] = bytes.as_slice().try_into().map_err(|_| {
            DlmsError::InvalidData(format!("Invalid access response date-time length {}", length))
        })?;
        reply.time = Some(CosemDateTime::from_date_time_bytes(
            &bytes,
            settings.codec.use_utc2_normal_time,
        )?);
    }
    reply.data.set_buffer(buff);
    Ok(())
}

fn handle_read_response(
    settings: &mut Settings,
    buff: &mut ByteBuffer,
    reply: &mut ReplyData,
) -> DlmsResult<()> {
    let count = buff.get_object_count()?;
    reply.total_count = count;
    if count != 1 {
        // Same item layout as Get-Response-With-List
        reply.data.set_object_count(count);
        reply.data.set_buffer(buff);
        return Ok(());
    }
    let choice = SingleReadResponse::parse(buff.get_u8()?)?;
    reply.command_type = choice.as_u8();
    match choice {
        SingleReadResponse::Data => reply.data.set_buffer(buff),
        SingleReadResponse::DataAccessError => reply.error = Some(read_error(buff)?),
        SingleReadResponse::DataBlockResult => {
            let last = buff.get_u8()? != 0;
            let number = buff.get_u16()?;
            if u32::from(number) != settings.block_index() {
                return Err(DlmsError::Protocol(format!(
                    "Invalid block number. It is {} and it should be {}",
                    number,
                    settings.block_index()
                )));
            }
            reply.block_number = u32::from(number);
            let count = buff.get_object_count()?;
            let chunk = buff.get_slice(count)?;
            reply.data.set_slice(&chunk);
            if !last {
                reply.more_data = MoreData::Block;
            }
        }
        SingleReadResponse::BlockNumber => {
            reply.block_number = u32::from(buff.get_u16()?);
        }
    }
    Ok(())
}

fn handle_write_response(buff: &mut ByteBuffer, reply: &mut ReplyData) -> DlmsResult<()> {
    let count = buff.get_object_count()?;
    reply.total_count = count;
    for _ in 0..count {
        match SingleWriteResponse::parse(buff.get_u8()?)? {
            SingleWriteResponse::Success => {}
            SingleWriteResponse::DataAccessError => {
                let error = read_error(buff)?;
                if reply.error.is_none() {
                    reply.error = Some(error);
                }
            }
            SingleWriteResponse::BlockNumber => {
                reply.block_number = u32::from(buff.get_u16()?);
            }
        }
    }
    Ok(())
}

/// Split a list reply (`count` followed by `0 data | 1 error` items) into
/// one result per item.
///
/// # Errors
///
/// Truncated input and unknown item choices.
pub fn parse_result_list(
    options: &CodecOptions,
    data: &[u8],
) -> DlmsResult<Vec<Result<Value, ErrorCode>>> {
    let mut buff = ByteBuffer::from_slice(data);
    let count = buff.get_object_count()?;
    let mut results = Vec::with_capacity(count);
    for _ in 0..count {
        match buff.get_u8()? {
            0 => {
                let mut info = DataInfo::new();
                let value = get_data(options, &mut buff, &mut info)?.ok_or_else(|| {
                    DlmsError::InvalidData("List item is incomplete".to_string())
                })?;
                results.push(Ok(value));
            }
            1 => results.push(Err(read_error(&mut buff)?)),
            other => {
                return Err(DlmsError::InvalidData(format!(
                    "Invalid list item choice {}",
                    other
                )))
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosem_core::byte_buffer::from_hex;

    fn parse(settings: &mut Settings, hex: &str, reply: &mut ReplyData) -> DlmsResult<()> {
        get_pdu(settings, &from_hex(hex).unwrap(), reply)
    }

    #[test]
    fn test_get_response_normal() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        parse(&mut settings, "C4 01 C1 00 12 00 05", &mut reply).unwrap();
        assert_eq!(reply.command, Some(Command::GetResponse));
        assert!(reply.is_complete());
        assert_eq!(reply.value(&settings.codec).unwrap(), Value::UInt16(5));

        reply.clear();
        parse(&mut settings, "C4 01 C1 01 04", &mut reply).unwrap();
        assert_eq!(reply.error, Some(ErrorCode::UndefinedObject));
    }

    #[test]
    fn test_get_response_blocks() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        parse(&mut settings, "C4 02 C1 00 00 00 00 01 00 03 09 04 01", &mut reply).unwrap();
        assert_eq!(reply.more_data, MoreData::Block);
        settings.increase_block_index();
        parse(&mut settings, "C4 02 C1 01 00 00 00 02 00 03 02 03 04", &mut reply).unwrap();
        assert!(reply.is_complete());
        assert_eq!(
            reply.value(&settings.codec).unwrap(),
            Value::OctetString(vec![1, 2, 3, 4])
        );
    }

    #[test]
    fn test_get_response_block_out_of_sequence() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        assert!(parse(&mut settings, "C4 02 C1 00 00 00 00 05 00 01 00", &mut reply).is_err());
    }

    #[test]
    fn test_result_list() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        parse(&mut settings, "C4 03 C1 02 00 11 07 01 03", &mut reply).unwrap();
        let results = parse_result_list(&settings.codec, reply.data.data()).unwrap();
        assert_eq!(results, vec![Ok(Value::UInt8(7)), Err(ErrorCode::ReadWriteDenied)]);
    }

    #[test]
    fn test_set_and_method_responses() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        parse(&mut settings, "C5 01 C1 00", &mut reply).unwrap();
        assert!(reply.error.is_none());

        reply.clear();
        parse(&mut settings, "C5 02 C1 00 00 00 03", &mut reply).unwrap();
        assert_eq!(reply.block_number, 3);

        reply.clear();
        parse(&mut settings, "C7 01 C1 00 01 00 09 02 AB CD", &mut reply).unwrap();
        assert_eq!(
            reply.value(&settings.codec).unwrap(),
            Value::OctetString(vec![0xAB, 0xCD])
        );

        reply.clear();
        parse(&mut settings, "C7 01 C1 03", &mut reply).unwrap();
        assert_eq!(reply.error, Some(ErrorCode::ReadWriteDenied));
    }

    #[test]
    fn test_sn_responses() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        parse(&mut settings, "0C 01 00 11 2A", &mut reply).unwrap();
        assert_eq!(reply.value(&settings.codec).unwrap(), Value::UInt8(42));

        reply.clear();
        parse(&mut settings, "0C 02 00 11 01 01 04", &mut reply).unwrap();
        assert_eq!(reply.total_count, 2);
        let results = parse_result_list(&settings.codec, reply.data.data()).unwrap();
        assert_eq!(results, vec![Ok(Value::UInt8(1)), Err(ErrorCode::UndefinedObject)]);

        reply.clear();
        parse(&mut settings, "0D 02 00 01 03", &mut reply).unwrap();
        assert_eq!(reply.error, Some(ErrorCode::ReadWriteDenied));

        reply.clear();
        parse(&mut settings, "0C 01 02 00 00 01 02 11 05", &mut reply).unwrap();
        assert_eq!(reply.more_data, MoreData::Block);
    }

    #[test]
    fn test_access_response() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        parse(&mut settings, "DA C0 00 00 01 00 01 11 05 01 01 00", &mut reply).unwrap();
        assert_eq!(reply.invoke_id, 0xC000_0001);
        assert!(reply.time.is_none());
        assert_eq!(reply.data.data(), &[0x01, 0x11, 0x05, 0x01, 0x01, 0x00]);
    }

    #[test]
    fn test_errors() {
        let mut settings = Settings::new(false);
        let mut reply = ReplyData::new();
        assert!(parse(&mut settings, "D8 01 02", &mut reply).is_err());
        assert!(parse(&mut settings, "0E 01 03 02", &mut reply).is_err());
        assert!(parse(&mut settings, "C0 01 C1", &mut reply).is_err());
    }
}
