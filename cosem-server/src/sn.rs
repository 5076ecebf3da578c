//! Short name services: Read and Write
//!
//! Methods are invoked through Read with the short name of the method and,
//! for a parameter, parameterised access.

use crate::server::{exception_response, DlmsServer};
use crate::transaction::LongTransaction;
use cosem_application::pdu::{
    ExceptionServiceError, SingleReadResponse, SingleWriteResponse, StateError,
    VariableAccessSpecification,
};
use cosem_application::{get_sn_pdu, SnParameters};
use cosem_core::{ByteBuffer, Command, DataType, DlmsError, DlmsResult, ErrorCode, Value};
use cosem_interface::{Selection, SnTarget};

/// One item of a Read request
enum ReadItem {
    Name(u16, Option<Selection>),
    Block(u16),
}

impl DlmsServer {
    pub(crate) fn handle_read_request(&mut self, buff: &mut ByteBuffer) -> DlmsResult<Vec<u8>> {
        let count = buff.get_object_count()?;
        if count == 0 {
            return Err(DlmsError::InvalidData("Read request without items".to_string()));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let item = match VariableAccessSpecification::parse(buff.get_u8()?)? {
                VariableAccessSpecification::VariableName => ReadItem::Name(buff.get_u16()?, None),
                VariableAccessSpecification::ParameterisedAccess => {
                    let short_name = buff.get_u16()?;
                    let selector = buff.get_u8()?;
                    let parameters = self.read_value(buff)?;
                    ReadItem::Name(
                        short_name,
                        Some(Selection {
                            selector,
                            parameters,
                        }),
                    )
                }
                VariableAccessSpecification::BlockNumberAccess => ReadItem::Block(buff.get_u16()?),
                other => {
                    return Err(DlmsError::InvalidData(format!(
                        "Variable access {} in a read request",
                        other
                    )))
                }
            };
            items.push(item);
        }

        if let [ReadItem::Block(block)] = items.as_slice() {
            return self.read_next_block(*block);
        }
        self.abort_transaction();
        let mut results = Vec::with_capacity(count);
        for item in items {
            let ReadItem::Name(short_name, selection) = item else {
                return Err(DlmsError::InvalidData(
                    "Block number access in a list read".to_string(),
                ));
            };
            let result = self.read_short_name(short_name, selection.as_ref());
            log::debug!("Read {:#06X}: {:?}", short_name, result.as_ref().err());
            results.push(result);
        }

        if let [result] = results.as_mut_slice() {
            let (choice, data) = match result {
                Ok(data) => (SingleReadResponse::Data, std::mem::take(data)),
                Err(code) => (
                    SingleReadResponse::DataAccessError,
                    ByteBuffer::from_slice(&[code.to_u8()]),
                ),
            };
            let p = SnParameters::new(
                &self.settings,
                Command::ReadResponse,
                Some(1),
                Some(choice.as_u8()),
                None,
                Some(data),
            );
            return self.send_read_response(p);
        }

        let mut data = ByteBuffer::new();
        for result in results {
            match result {
                Ok(mut value) => {
                    data.set_u8(SingleReadResponse::Data.as_u8());
                    data.set_buffer(&mut value);
                }
                Err(code) => {
                    data.set_u8(SingleReadResponse::DataAccessError.as_u8());
                    data.set_u8(code.to_u8());
                }
            }
        }
        // list replies cannot be sent in blocks
        if 3 + data.size() > usize::from(self.settings.max_pdu_size) {
            log::warn!("Read of {} items needs {} bytes", count, data.size());
            return Ok(exception_response(
                StateError::ServiceNotAllowed,
                ExceptionServiceError::PduTooLong,
            ));
        }
        let p = SnParameters::new(
            &self.settings,
            Command::ReadResponse,
            Some(count),
            None,
            None,
            Some(data),
        );
        self.send_read_response(p)
    }

    /// Encoded value of the attribute, or return value of the method,
    /// `short_name` addresses.
    fn read_short_name(
        &mut self,
        short_name: u16,
        selection: Option<&Selection>,
    ) -> Result<ByteBuffer, ErrorCode> {
        match self.objects.resolve_sn(short_name) {
            Some((position, SnTarget::Attribute(index))) => {
                self.read_attribute(position, index, selection)
            }
            Some((position, SnTarget::Method(index))) => {
                let parameters = selection.map_or(Value::None, |s| s.parameters.clone());
                match self.invoke_method(position, index, &parameters)? {
                    Some(value) => self.encode_value(&value, DataType::None),
                    None => Ok(ByteBuffer::from_slice(&[DataType::None.tag()])),
                }
            }
            None => Err(ErrorCode::UndefinedObject),
        }
    }

    fn read_next_block(&mut self, block: u16) -> DlmsResult<Vec<u8>> {
        match self.transaction.take() {
            Some(LongTransaction::Read(mut p)) => {
                if u32::from(block) != self.settings.block_index() {
                    log::warn!(
                        "Read block {} requested, {} expected",
                        block,
                        self.settings.block_index()
                    );
                    self.settings.reset_block_index();
                    return self.read_error(ErrorCode::DataBlockNumberInvalid);
                }
                self.settings.increase_block_index();
                p.block_index = self.settings.block_index() as u16;
                self.send_read_response(p)
            }
            other => {
                self.transaction = other;
                log::warn!("Read block {} requested without a long read", block);
                self.read_error(ErrorCode::NoLongGetOrReadInProgress)
            }
        }
    }

    fn read_error(&mut self, code: ErrorCode) -> DlmsResult<Vec<u8>> {
        let p = SnParameters::new(
            &self.settings,
            Command::ReadResponse,
            Some(1),
            Some(SingleReadResponse::DataAccessError.as_u8()),
            None,
            Some(ByteBuffer::from_slice(&[code.to_u8()])),
        );
        self.send_read_response(p)
    }

    fn send_read_response(&mut self, mut p: SnParameters) -> DlmsResult<Vec<u8>> {
        let mut reply = ByteBuffer::new();
        get_sn_pdu(&self.settings, &mut p, &mut reply)?;
        if p.multiple_blocks && !p.last_block {
            self.transaction = Some(LongTransaction::Read(p));
        }
        Ok(reply.into_vec())
    }

    pub(crate) fn handle_write_request(&mut self, buff: &mut ByteBuffer) -> DlmsResult<Vec<u8>> {
        let count = buff.get_object_count()?;
        let mut targets = Vec::with_capacity(count);
        for _ in 0..count {
            let access = VariableAccessSpecification::parse(buff.get_u8()?)?;
            if access != VariableAccessSpecification::VariableName {
                return Err(DlmsError::InvalidData(format!(
                    "Variable access {} in a write request",
                    access
                )));
            }
            targets.push(buff.get_u16()?);
        }
        let values = buff.get_object_count()?;
        if values != count {
            return Err(DlmsError::InvalidData(format!(
                "Write request has {} names and {} values",
                count, values
            )));
        }
        self.abort_transaction();

        let mut data = ByteBuffer::new();
        for short_name in targets {
            let value = self.read_value(buff)?;
            let result = match self.objects.resolve_sn(short_name) {
                Some((position, SnTarget::Attribute(index))) => {
                    self.write_attribute(position, index, value)
                }
                Some((_, SnTarget::Method(_))) => ErrorCode::ReadWriteDenied,
                None => ErrorCode::UndefinedObject,
            };
            log::debug!("Write {:#06X}: {}", short_name, result);
            if result.is_ok() {
                data.set_u8(SingleWriteResponse::Success.as_u8());
            } else {
                data.set_u8(SingleWriteResponse::DataAccessError.as_u8());
                data.set_u8(result.to_u8());
            }
        }
        let mut p = SnParameters::new(
            &self.settings,
            Command::WriteResponse,
            Some(count),
            None,
            None,
            Some(data),
        );
        let mut reply = ByteBuffer::new();
        get_sn_pdu(&self.settings, &mut p, &mut reply)?;
        Ok(reply.into_vec())
    }
}
