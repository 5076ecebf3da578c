//! Logical-name referencing PDU builder
//!
//! [`get_ln_messages`] turns one service call into the PDUs that carry it.
//! Set requests and Get responses whose data does not fit in the
//! negotiated PDU size are split into numbered data blocks; every other
//! service is sent as a single PDU and segmented by the link layer.

use crate::pdu::{GetResponseType, SetRequestType, NO_STATUS};
use crate::settings::Settings;
use cosem_core::{ByteBuffer, Command, CosemDateTime, DlmsError, DlmsResult};

/// Command, request type and invoke-id-and-priority
const LN_HEADER_SIZE: usize = 3;

/// Input of one LN service PDU
#[derive(Debug, Clone)]
pub struct LnParameters {
    pub command: Command,
    /// Second byte of the PDU, one of the `*RequestType`/`*ResponseType` values
    pub request_type: u8,
    /// Encoded attribute or method descriptor including the trailing
    /// access-selection or parameter flag. Written only with the first block.
    pub attribute_descriptor: Option<Vec<u8>>,
    /// Payload; consumed as blocks are written
    pub data: Option<ByteBuffer>,
    /// Invoke id to echo, 0 to take it from the settings
    pub invoke_id: u32,
    /// Result byte of responses, [`NO_STATUS`] for none
    pub status: u8,
    pub multiple_blocks: bool,
    /// Set when the last block has been written
    pub last_block: bool,
    pub block_index: u32,
    /// Date-time of access requests and responses
    pub time: Option<CosemDateTime>,
}

impl LnParameters {
    pub fn new(
        settings: &Settings,
        command: Command,
        request_type: u8,
        attribute_descriptor: Option<Vec<u8>>,
        data: Option<ByteBuffer>,
        status: u8,
    ) -> Self {
        Self {
            command,
            request_type,
            attribute_descriptor,
            data,
            invoke_id: 0,
            status,
            multiple_blocks: false,
            last_block: false,
            block_index: settings.block_index(),
            time: None,
        }
    }

    fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, ByteBuffer::available)
    }

    fn has_more_data(&self) -> bool {
        self.data_len() != 0
    }
}

fn splits_into_blocks(command: Command) -> bool {
    matches!(command, Command::SetRequest | Command::GetResponse)
}

fn write_status(p: &LnParameters, reply: &mut ByteBuffer) {
    if p.status == NO_STATUS {
        return;
    }
    // Get-Data-Result choice: 0 data, 1 data-access-result
    if p.command == Command::GetResponse {
        reply.set_u8(u8::from(p.status != 0));
        if p.status != 0 {
            reply.set_u8(p.status);
        }
    } else {
        reply.set_u8(p.status);
    }
}

/// Append one PDU for `p` to `reply`.
///
/// When `p.multiple_blocks` is set, at most one block of `p.data` is
/// written and `p.block_index` advances. Call again until
/// `p.last_block` is set.
///
/// # Errors
///
/// Fails when the negotiated PDU size cannot hold even a one byte block.
pub fn get_ln_pdu(
    settings: &mut Settings,
    p: &mut LnParameters,
    reply: &mut ByteBuffer,
) -> DlmsResult<()> {
    let start = reply.size();
    let max_pdu = usize::from(settings.max_pdu_size);

    if !p.multiple_blocks && splits_into_blocks(p.command) {
        let descriptor = p.attribute_descriptor.as_ref().map_or(0, Vec::len);
        p.multiple_blocks = LN_HEADER_SIZE + descriptor + 1 + p.data_len() > max_pdu;
    }
    if p.multiple_blocks {
        match p.command {
            Command::SetRequest if p.request_type == SetRequestType::Normal.as_u8() => {
                p.request_type = SetRequestType::FirstDataBlock.as_u8();
            }
            Command::SetRequest if p.attribute_descriptor.is_none() => {
                p.request_type = SetRequestType::WithDataBlock.as_u8();
            }
            Command::GetResponse => {
                p.request_type = GetResponseType::WithDataBlock.as_u8();
            }
            _ => {}
        }
    }

    reply.set_u8(p.command.to_u8());
    match p.command {
        Command::AccessRequest | Command::AccessResponse => {
            let id = if p.invoke_id != 0 {
                p.invoke_id
            } else {
                settings.next_long_invoke_id()
            };
            reply.set_u32(id);
            match &p.time {
                Some(time) => {
                    reply.set_u8(12);
                    reply.set_slice(&time.to_date_time_bytes(settings.codec.use_utc2_normal_time));
                }
                None => reply.set_u8(0),
            }
        }
        _ => {
            reply.set_u8(p.request_type);
            let invoke_id = if p.invoke_id != 0 {
                p.invoke_id as u8
            } else {
                settings.invoke_id_and_priority()
            };
            reply.set_u8(invoke_id);
        }
    }

    if let Some(descriptor) = p.attribute_descriptor.take() {
        reply.set_slice(&descriptor);
    }

    if !p.multiple_blocks {
        write_status(p, reply);
        if let Some(data) = p.data.as_mut() {
            reply.set_buffer(data);
        }
        p.last_block = true;
        return Ok(());
    }

    let last_position = reply.size();
    reply.set_u8(0);
    reply.set_u32(p.block_index);
    p.block_index = p.block_index.wrapping_add(1);
    if p.command == Command::GetResponse {
        // DataBlock-G result: 0 raw-data, 1 data-access-result
        if p.status != 0 && p.status != NO_STATUS {
            reply.set_u8(1);
            reply.set_u8(p.status);
            reply.set_u8_at(last_position, 1);
            p.last_block = true;
            return Ok(());
        }
        reply.set_u8(0);
    } else {
        write_status(p, reply);
    }

    let available = p.data_len();
    let header = reply.size() - start;
    let mut length = available;
    if header + ByteBuffer::object_count_size(length) + length > max_pdu {
        length = max_pdu.saturating_sub(header);
        length = length.saturating_sub(ByteBuffer::object_count_size(length));
    }
    if length == 0 && available != 0 {
        return Err(DlmsError::InvalidData(format!(
            "PDU size {} is too small for a data block",
            max_pdu
        )));
    }
    reply.set_object_count(length);
    if let Some(data) = p.data.as_mut() {
        let chunk = data.get_slice(length)?;
        reply.set_slice(&chunk);
    }
    p.last_block = !p.has_more_data();
    if p.last_block {
        reply.set_u8_at(last_position, 1);
    }
    Ok(())
}

/// All PDUs needed to send `p`.
///
/// # Errors
///
/// See [`get_ln_pdu`].
pub fn get_ln_messages(settings: &mut Settings, mut p: LnParameters) -> DlmsResult<Vec<Vec<u8>>> {
    let mut messages = Vec::new();
    loop {
        let mut reply = ByteBuffer::new();
        get_ln_pdu(settings, &mut p, &mut reply)?;
        messages.push(reply.into_vec());
        if !p.multiple_blocks || p.last_block {
            break;
        }
    }
    if messages.len() > 1 {
        log::debug!("{:?} split into {} blocks", p.command, messages.len());
    }
    Ok(messages)
}
