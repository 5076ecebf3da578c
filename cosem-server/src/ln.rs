//! Logical name services: Get, Set, Action and Access

use crate::server::{exception_response, DlmsServer};
use crate::transaction::LongTransaction;
use cosem_application::pdu::{
    AccessServiceCommandType, ActionRequestType, ActionResponseType, ExceptionServiceError,
    GetRequestType, GetResponseType, SetRequestType, SetResponseType, StateError,
};
use cosem_application::{get_ln_pdu, LnDescriptor, LnParameters, NO_STATUS};
use cosem_core::{
    ByteBuffer, Command, CosemDateTime, DataType, DlmsError, DlmsResult, ErrorCode, Value,
};

impl DlmsServer {
    pub(crate) fn handle_get_request(&mut self, buff: &mut ByteBuffer) -> DlmsResult<Vec<u8>> {
        let request_type = GetRequestType::parse(buff.get_u8()?)?;
        self.update_invoke_id(buff.get_u8()?);
        match request_type {
            GetRequestType::Normal => {
                self.abort_transaction();
                let descriptor = LnDescriptor::read(buff)?;
                let selection = self.read_selection(buff)?;
                let result = match self.position_by_ln(&descriptor) {
                    Some(position) => {
                        self.read_attribute(position, descriptor.index, selection.as_ref())
                    }
                    None => Err(ErrorCode::UndefinedObject),
                };
                log::debug!("Get {}: {:?}", descriptor, result.as_ref().err());
                let (data, status) = match result {
                    Ok(data) => (Some(data), ErrorCode::Ok),
                    Err(code) => (None, code),
                };
                let p = LnParameters::new(
                    &self.settings,
                    Command::GetResponse,
                    GetResponseType::Normal.as_u8(),
                    None,
                    data,
                    status.to_u8(),
                );
                self.send_get_response(p)
            }
            GetRequestType::NextDataBlock => {
                let block = buff.get_u32()?;
                match self.transaction.take() {
                    Some(LongTransaction::Get(mut p)) => {
                        if block != self.settings.block_index() {
                            log::warn!(
                                "Get block {} requested, {} expected",
                                block,
                                self.settings.block_index()
                            );
                            self.settings.reset_block_index();
                            return self.get_error(ErrorCode::DataBlockNumberInvalid);
                        }
                        self.settings.increase_block_index();
                        p.block_index = self.settings.block_index();
                        self.send_get_response(p)
                    }
                    other => {
                        self.transaction = other;
                        log::warn!("Get block {} requested without a long get", block);
                        self.get_error(ErrorCode::NoLongGetOrReadInProgress)
                    }
                }
            }
            GetRequestType::WithList => {
                self.abort_transaction();
                let count = buff.get_object_count()?;
                let mut data = ByteBuffer::new();
                data.set_object_count(count);
                for _ in 0..count {
                    let descriptor = LnDescriptor::read(buff)?;
                    let selection = self.read_selection(buff)?;
                    let result = match self.position_by_ln(&descriptor) {
                        Some(position) => {
                            self.read_attribute(position, descriptor.index, selection.as_ref())
                        }
                        None => Err(ErrorCode::UndefinedObject),
                    };
                    match result {
                        Ok(mut value) => {
                            data.set_u8(0);
                            data.set_buffer(&mut value);
                        }
                        Err(code) => {
                            log::debug!("Get {} in list: {}", descriptor, code);
                            data.set_u8(1);
                            data.set_u8(code.to_u8());
                        }
                    }
                }
                let p = LnParameters::new(
                    &self.settings,
                    Command::GetResponse,
                    GetResponseType::WithList.as_u8(),
                    None,
                    Some(data),
                    NO_STATUS,
                );
                self.send_get_response(p)
            }
        }
    }

    /// Write the next PDU of a Get response; keep it as the long
    /// transaction while blocks remain.
    fn send_get_response(&mut self, mut p: LnParameters) -> DlmsResult<Vec<u8>> {
        let mut reply = ByteBuffer::new();
        get_ln_pdu(&mut self.settings, &mut p, &mut reply)?;
        if p.multiple_blocks && !p.last_block {
            log::trace!("Get block {} sent", p.block_index.wrapping_sub(1));
            self.transaction = Some(LongTransaction::Get(p));
        }
        Ok(reply.into_vec())
    }

    fn get_error(&mut self, code: ErrorCode) -> DlmsResult<Vec<u8>> {
        self.ln_response(
            Command::GetResponse,
            GetResponseType::Normal.as_u8(),
            code.to_u8(),
            None,
        )
    }

    pub(crate) fn handle_set_request(&mut self, buff: &mut ByteBuffer) -> DlmsResult<Vec<u8>> {
        let request_type = SetRequestType::parse(buff.get_u8()?)?;
        self.update_invoke_id(buff.get_u8()?);
        match request_type {
            SetRequestType::Normal => {
                self.abort_transaction();
                let descriptor = LnDescriptor::read(buff)?;
                self.skip_set_selection(buff)?;
                let value = self.read_value(buff)?;
                let result = self.apply_set(&descriptor, value);
                self.set_result(SetResponseType::Normal, result, None)
            }
            SetRequestType::FirstDataBlock => {
                self.abort_transaction();
                let descriptor = LnDescriptor::read(buff)?;
                self.skip_set_selection(buff)?;
                self.receive_set_block(Some(descriptor), buff)
            }
            SetRequestType::WithDataBlock => self.receive_set_block(None, buff),
            SetRequestType::WithList => {
                self.abort_transaction();
                let count = buff.get_object_count()?;
                let mut descriptors = Vec::with_capacity(count);
                for _ in 0..count {
                    descriptors.push(LnDescriptor::read(buff)?);
                    self.skip_set_selection(buff)?;
                }
                let values = buff.get_object_count()?;
                if values != count {
                    return Err(DlmsError::InvalidData(format!(
                        "Set list has {} descriptors and {} values",
                        count, values
                    )));
                }
                let mut data = ByteBuffer::new();
                data.set_object_count(count);
                for descriptor in &descriptors {
                    let value = self.read_value(buff)?;
                    data.set_u8(self.apply_set(descriptor, value).to_u8());
                }
                self.ln_response(
                    Command::SetResponse,
                    SetResponseType::WithList.as_u8(),
                    NO_STATUS,
                    Some(data),
                )
            }
        }
    }

    /// Selective access is not defined for writes; the parameters are
    /// read and dropped.
    fn skip_set_selection(&self, buff: &mut ByteBuffer) -> DlmsResult<()> {
        if let Some(selection) = self.read_selection(buff)? {
            log::debug!("Ignoring access selector {} of a set", selection.selector);
        }
        Ok(())
    }

    fn apply_set(&mut self, descriptor: &LnDescriptor, value: Value) -> ErrorCode {
        let result = match self.position_by_ln(descriptor) {
            Some(position) => self.write_attribute(position, descriptor.index, value),
            None => ErrorCode::UndefinedObject,
        };
        log::debug!("Set {}: {}", descriptor, result);
        result
    }

    /// Set response, with the block number when one is given.
    fn set_result(
        &mut self,
        response_type: SetResponseType,
        result: ErrorCode,
        block: Option<u32>,
    ) -> DlmsResult<Vec<u8>> {
        let data = block.map(|block| {
            let mut data = ByteBuffer::new();
            data.set_u32(block);
            data
        });
        self.ln_response(Command::SetResponse, response_type.as_u8(), result.to_u8(), data)
    }

    /// One block of a Set sent in data blocks. `descriptor` is given with
    /// the first block only.
    fn receive_set_block(
        &mut self,
        descriptor: Option<LnDescriptor>,
        buff: &mut ByteBuffer,
    ) -> DlmsResult<Vec<u8>> {
        let last = buff.get_u8()? != 0;
        let block = buff.get_u32()?;
        let count = buff.get_object_count()?;
        let (descriptor, mut data) = match descriptor {
            Some(descriptor) => (descriptor, ByteBuffer::new()),
            None => match self.transaction.take() {
                Some(LongTransaction::Set { descriptor, data }) => (descriptor, data),
                other => {
                    self.transaction = other;
                    log::warn!("Set block {} received without a long set", block);
                    return self.set_result(
                        SetResponseType::Normal,
                        ErrorCode::NoLongSetOrWriteInProgress,
                        None,
                    );
                }
            },
        };
        if block != self.settings.block_index() {
            log::warn!(
                "Set block {} received, {} expected",
                block,
                self.settings.block_index()
            );
            self.settings.reset_block_index();
            return self.set_result(SetResponseType::Normal, ErrorCode::DataBlockNumberInvalid, None);
        }
        if count != buff.available() {
            log::warn!(
                "Set block {} announces {} bytes, {} received",
                block,
                count,
                buff.available()
            );
            self.settings.reset_block_index();
            return self.set_result(SetResponseType::Normal, ErrorCode::DataBlockUnavailable, None);
        }
        data.set_buffer(buff);

        if !last {
            self.settings.increase_block_index();
            self.transaction = Some(LongTransaction::Set { descriptor, data });
            return self.ln_response(
                Command::SetResponse,
                SetResponseType::DataBlock.as_u8(),
                NO_STATUS,
                Some({
                    let mut ack = ByteBuffer::new();
                    ack.set_u32(block);
                    ack
                }),
            );
        }

        self.settings.reset_block_index();
        let result = match self.read_value(&mut data) {
            Ok(value) => self.apply_set(&descriptor, value),
            Err(e) => {
                log::warn!("Set {} value of {} bytes not decoded: {}", descriptor, data.size(), e);
                ErrorCode::HardwareFault
            }
        };
        self.set_result(SetResponseType::LastDataBlock, result, Some(block))
    }

    pub(crate) fn handle_method_request(&mut self, buff: &mut ByteBuffer) -> DlmsResult<Vec<u8>> {
        let request_type = ActionRequestType::parse(buff.get_u8()?)?;
        self.update_invoke_id(buff.get_u8()?);
        if request_type != ActionRequestType::Normal {
            log::warn!("Action request {} is not supported", request_type);
            return Ok(exception_response(
                StateError::ServiceNotAllowed,
                ExceptionServiceError::ServiceNotSupported,
            ));
        }
        let descriptor = LnDescriptor::read(buff)?;
        let parameters = if buff.get_u8()? != 0 {
            self.read_value(buff)?
        } else {
            Value::None
        };
        let result = match self.position_by_ln(&descriptor) {
            Some(position) => self.invoke_method(position, descriptor.index, &parameters),
            None => Err(ErrorCode::UndefinedObject),
        };
        log::debug!("Action {}: {:?}", descriptor, result.as_ref().err());

        let mut data = ByteBuffer::new();
        let status = match result.and_then(|value| match value {
            Some(value) => self.encode_value(&value, DataType::None).map(Some),
            None => Ok(None),
        }) {
            Ok(Some(mut value)) => {
                // return parameters present, data choice
                data.set_u8(1);
                data.set_u8(0);
                data.set_buffer(&mut value);
                ErrorCode::Ok
            }
            Ok(None) => {
                data.set_u8(0);
                ErrorCode::Ok
            }
            Err(code) => {
                data.set_u8(0);
                code
            }
        };
        self.ln_response(
            Command::MethodResponse,
            ActionResponseType::Normal.as_u8(),
            status.to_u8(),
            Some(data),
        )
    }

    pub(crate) fn handle_access_request(&mut self, buff: &mut ByteBuffer) -> DlmsResult<Vec<u8>> {
        let invoke_id = buff.get_u32()?;
        let length = buff.get_object_count()?;
        let time = if length == 0 {
            None
        } else {
            let bytes = buff.get_slice(length)?;
            let bytes: [u8; 12] = bytes.as_slice().try_into().map_err(|_| {
                DlmsError::InvalidData(format!("Invalid access request date-time length {}", length))
            })?;
            Some(CosemDateTime::from_date_time_bytes(
                &bytes,
                self.settings.codec.use_utc2_normal_time,
            )?)
        };

        let count = buff.get_object_count()?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let command = AccessServiceCommandType::parse(buff.get_u8()?)?;
            items.push((command, LnDescriptor::read(buff)?));
        }
        let data_count = buff.get_object_count()?;
        if data_count != count {
            return Err(DlmsError::InvalidData(format!(
                "Access request has {} items and {} data",
                count, data_count
            )));
        }

        let mut values = ByteBuffer::new();
        let mut results = ByteBuffer::new();
        values.set_object_count(count);
        results.set_object_count(count);
        for (command, descriptor) in &items {
            let value = self.read_value(buff)?;
            let position = self.position_by_ln(descriptor);
            let result = match (command, position) {
                (_, None) => Err(ErrorCode::UndefinedObject),
                (AccessServiceCommandType::Get, Some(position)) => self
                    .read_attribute(position, descriptor.index, None)
                    .map(Some),
                (AccessServiceCommandType::Set, Some(position)) => {
                    match self.write_attribute(position, descriptor.index, value) {
                        ErrorCode::Ok => Ok(None),
                        code => Err(code),
                    }
                }
                (AccessServiceCommandType::Action, Some(position)) => self
                    .invoke_method(position, descriptor.index, &value)
                    .and_then(|value| match value {
                        Some(value) => self.encode_value(&value, DataType::None).map(Some),
                        None => Ok(None),
                    }),
            };
            log::debug!("Access {} {}: {:?}", command, descriptor, result.as_ref().err());
            let code = match result {
                Ok(Some(mut encoded)) => {
                    values.set_buffer(&mut encoded);
                    ErrorCode::Ok
                }
                Ok(None) => {
                    values.set_u8(0);
                    ErrorCode::Ok
                }
                Err(code) => {
                    values.set_u8(0);
                    code
                }
            };
            results.set_u8(command.as_u8());
            results.set_u8(code.to_u8());
        }
        values.set_buffer(&mut results);

        let mut p = LnParameters::new(
            &self.settings,
            Command::AccessResponse,
            0,
            None,
            Some(values),
            NO_STATUS,
        );
        p.invoke_id = invoke_id;
        p.time = time;
        let mut reply = ByteBuffer::new();
        get_ln_pdu(&mut self.settings, &mut p, &mut reply)?;
        Ok(reply.into_vec())
    }
}
