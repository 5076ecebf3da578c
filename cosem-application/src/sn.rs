//! Short-name referencing PDU builder
//!
//! SN services carry a list of variable-access specifications after the
//! command byte. Only Read responses are split into data blocks; requests
//! that grow past the PDU size are split by the caller into several
//! independent requests.

use crate::pdu::SingleReadResponse;
use crate::settings::Settings;
use cosem_core::{ByteBuffer, Command, DlmsError, DlmsResult};

/// Input of one SN service PDU
#[derive(Debug, Clone)]
pub struct SnParameters {
    pub command: Command,
    /// Item count written after the command
    pub count: Option<usize>,
    /// Variable-access specification or read-response choice
    pub request_type: Option<u8>,
    pub attribute_descriptor: Option<Vec<u8>>,
    pub data: Option<ByteBuffer>,
    pub multiple_blocks: bool,
    pub last_block: bool,
    pub block_index: u16,
}

impl SnParameters {
    pub fn new(
        settings: &Settings,
        command: Command,
        count: Option<usize>,
        request_type: Option<u8>,
        attribute_descriptor: Option<Vec<u8>>,
        data: Option<ByteBuffer>,
    ) -> Self {
        Self {
            command,
            count,
            request_type,
            attribute_descriptor,
            data,
            multiple_blocks: false,
            last_block: false,
            block_index: settings.block_index() as u16,
        }
    }

    fn data_len(&self) -> usize {
        self.data.as_ref().map_or(0, ByteBuffer::available)
    }
}

/// Append one PDU for `p` to `reply`.
///
/// # Errors
///
/// Fails when the PDU size cannot hold a one byte data block.
pub fn get_sn_pdu(
    settings: &Settings,
    p: &mut SnParameters,
    reply: &mut ByteBuffer,
) -> DlmsResult<()> {
    let start = reply.size();
    let max_pdu = usize::from(settings.max_pdu_size);
    if p.command == Command::ReadResponse && !p.multiple_blocks {
        // command, count, choice
        p.multiple_blocks = 3 + p.data_len() > max_pdu;
    }
    if p.multiple_blocks {
        p.request_type = Some(SingleReadResponse::DataBlockResult.as_u8());
    }

    reply.set_u8(p.command.to_u8());
    if let Some(count) = p.count {
        reply.set_object_count(count);
    }
    if let Some(request_type) = p.request_type {
        reply.set_u8(request_type);
    }
    if let Some(descriptor) = &p.attribute_descriptor {
        reply.set_slice(descriptor);
    }

    if !p.multiple_blocks {
        if let Some(data) = p.data.as_mut() {
            reply.set_buffer(data);
        }
        p.last_block = true;
        return Ok(());
    }

    let last_position = reply.size();
    reply.set_u8(0);
    reply.set_u16(p.block_index);
    p.block_index = p.block_index.wrapping_add(1);

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
    p.last_block = p.data_len() == 0;
    if p.last_block {
        reply.set_u8_at(last_position, 1);
    }
    Ok(())
}

/// All PDUs needed to send `p`.
pub fn get_sn_messages(settings: &Settings, mut p: SnParameters) -> DlmsResult<Vec<Vec<u8>>> {
    let mut messages = Vec::new();
    loop {
        let mut reply = ByteBuffer::new();
        get_sn_pdu(settings, &mut p, &mut reply)?;
        messages.push(reply.into_vec());
        if !p.multiple_blocks || p.last_block {
            break;
        }
    }
    Ok(messages)
}
