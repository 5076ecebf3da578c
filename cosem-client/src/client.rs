//! DLMS client engine
//!
//! [`DlmsClient`] builds the frames of every client request and parses the
//! frames that come back. It does no I/O: the caller writes each returned
//! frame, feeds received bytes to [`DlmsClient::get_data`] until it returns
//! `true`, and asks [`DlmsClient::receiver_ready`] for the next frame while
//! the reply has more data.
//!
//! # Association
//!
//! ```text
//! snrm_request        (HDLC only)
//! aarq_request     -> parse_aare_response
//!   with HLS:
//! application_association_request -> parse_application_association_response
//! ```

use crate::config::ClientConfig;
use bytes::BytesMut;
use cosem_application::pdu::{
    AccessServiceCommandType, ActionRequestType, GetRequestType, SetRequestType,
    VariableAccessSpecification,
};
use cosem_application::{
    get_ln_messages, get_pdu, get_sn_messages, parse_result_list, sn_attribute, sn_method,
    AssociationStatus, LnDescriptor, LnParameters, MoreData, ObjectName, ReplyData, Settings,
    SnParameters, NO_STATUS,
};
use cosem_asn1::xdlms::{CONFIRMED_SERVICE_ERROR_TAG, VAA_NAME_SN};
use cosem_asn1::{
    change_type, get_data, set_data, value_type, AAREApdu, AARQApdu, ApplicationContext,
    AssociateResult, ConfirmedServiceError, InitiateRequest, InitiateResponse, RLREApdu, RLRQApdu,
    SourceDiagnostic,
};
use cosem_core::{
    ByteBuffer, Command, CosemDateTime, DataInfo, DataType, DlmsError, DlmsResult, ErrorCode,
    InterfaceType, ObisCode, ObjectType, Value,
};
use cosem_interface::{
    parse_object_list, CaptureObject, CosemObject, ObjectCollection, ObjectDescriptor,
    ProfileGeneric, Selection, SELECTOR_ENTRY, SELECTOR_RANGE,
};
use cosem_security::{generate_challenge, secure, verify_proof, Authentication};
use cosem_session::{HdlcAddress, HdlcLink, LinkEvent, LinkRole, Wrapper};

/// Smallest LN Get-Request-With-List header: command, type, invoke id,
/// item count and some room for the HDLC overhead.
const LIST_REQUEST_OVERHEAD: usize = 12;
/// Attribute descriptor plus access selection flag
const LIST_ITEM_SIZE: usize = 10;
const MAX_LIST_ITEMS: usize = 10;

/// One item of an access request
#[derive(Debug, Clone, PartialEq)]
pub struct AccessItem {
    pub command: AccessServiceCommandType,
    pub object_type: ObjectType,
    pub logical_name: ObisCode,
    /// Attribute or method index
    pub index: u8,
    /// Value to set or method parameter, ignored for Get
    pub value: Value,
}

impl AccessItem {
    pub fn get(object_type: ObjectType, logical_name: ObisCode, index: u8) -> Self {
        Self {
            command: AccessServiceCommandType::Get,
            object_type,
            logical_name,
            index,
            value: Value::None,
        }
    }
}

#[derive(Debug)]
enum Framing {
    Hdlc(HdlcLink),
    Wrapper { wrapper: Wrapper, input: BytesMut },
}

/// Request builder and reply parser of one client connection
#[derive(Debug)]
pub struct DlmsClient {
    settings: Settings,
    objects: ObjectCollection,
    framing: Framing,
    /// PDU size proposed in the AARQ
    max_receive_pdu_size: u16,
    /// RR frame asking the server for the next segment of a reply
    pending_rr: Option<Vec<u8>>,
}

impl DlmsClient {
    /// # Errors
    ///
    /// Addresses that cannot be encoded for the configured interface.
    pub fn new(config: &ClientConfig) -> DlmsResult<Self> {
        let settings = config.settings()?;
        let framing = match config.interface_type {
            InterfaceType::Hdlc => {
                let client = u8::try_from(config.client_address).map_err(|_| {
                    DlmsError::InvalidData(format!(
                        "HDLC client address {} does not fit in a byte",
                        config.client_address
                    ))
                })?;
                Framing::Hdlc(HdlcLink::new(
                    LinkRole::Client,
                    HdlcAddress::client(client)?,
                    config.hdlc_server_address()?,
                    config.limits,
                ))
            }
            InterfaceType::Wrapper => Framing::Wrapper {
                wrapper: Wrapper::new(config.client_address, Some(config.server_logical_address)),
                input: BytesMut::new(),
            },
        };
        Ok(Self {
            settings,
            objects: ObjectCollection::new(),
            framing,
            max_receive_pdu_size: config.max_pdu_size,
            pending_rr: None,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    /// Objects read with [`Self::parse_objects`]
    pub fn objects(&self) -> &ObjectCollection {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectCollection {
        &mut self.objects
    }

    pub fn is_connected(&self) -> bool {
        self.settings.is_connected()
    }

    /// The AARE asked for an HLS proof, see
    /// [`Self::application_association_request`].
    pub fn is_authentication_required(&self) -> bool {
        self.settings.status == AssociationStatus::AssociationPending
    }

    fn frames(&mut self, pdus: Vec<Vec<u8>>) -> DlmsResult<Vec<Vec<u8>>> {
        let mut frames = Vec::with_capacity(pdus.len());
        for pdu in &pdus {
            match &mut self.framing {
                Framing::Hdlc(link) => {
                    frames.push(link.send_pdu(pdu)?);
                    while let Some(segment) = link.next_segment() {
                        frames.push(segment);
                    }
                }
                Framing::Wrapper { wrapper, .. } => frames.push(wrapper.wrap(pdu)?),
            }
        }
        Ok(frames)
    }

    /// Name of `object` in the referencing of the association
    pub fn object_name(&self, object: &dyn CosemObject) -> ObjectName {
        if self.settings.use_logical_name_referencing {
            ObjectName::Logical(object.logical_name())
        } else {
            ObjectName::Short(object.short_name())
        }
    }

    /// SNRM frame starting the HDLC link, `None` for the wrapper.
    pub fn snrm_request(&mut self) -> DlmsResult<Option<Vec<u8>>> {
        self.settings.reset();
        self.pending_rr = None;
        match &mut self.framing {
            Framing::Hdlc(link) => link.snrm().map(Some),
            Framing::Wrapper { input, .. } => {
                input.clear();
                Ok(None)
            }
        }
    }

    /// AARQ proposing the configured conformance, PDU size and
    /// authentication.
    ///
    /// # Errors
    ///
    /// LLS and HLS without a password. HLS-GMAC takes its secret from the
    /// cipher context instead.
    pub fn aarq_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        self.settings.reset();
        let settings = &mut self.settings;
        let mechanism = settings.authentication;
        let mut aarq = AARQApdu::new(ApplicationContext::for_referencing(
            settings.use_logical_name_referencing,
        ));
        match mechanism {
            Authentication::None => {}
            Authentication::Low => {
                if settings.password.is_empty() {
                    return Err(DlmsError::Security(
                        "Low level authentication needs a password".to_string(),
                    ));
                }
                aarq.sender_acse_requirements = true;
                aarq.mechanism_id = Some(mechanism.id());
                aarq.calling_authentication_value = Some(settings.password.clone());
            }
            _ => {
                if mechanism == Authentication::HighGmac {
                    aarq.calling_ap_title = Some(settings.cipher.system_title().to_vec());
                } else if settings.password.is_empty() {
                    return Err(DlmsError::Security(format!(
                        "Authentication {} needs a password",
                        mechanism
                    )));
                }
                if settings.ctos_challenge.is_none() {
                    settings.ctos_challenge = Some(generate_challenge());
                }
                aarq.sender_acse_requirements = true;
                aarq.mechanism_id = Some(mechanism.id());
                aarq.calling_authentication_value = settings.ctos_challenge.clone();
            }
        }
        let mut initiate =
            InitiateRequest::new(settings.proposed_conformance, self.max_receive_pdu_size);
        initiate.proposed_dlms_version = settings.dlms_version;
        aarq.user_information = Some(initiate.encode());
        log::debug!(
            "AARQ with authentication {}, conformance {:?}",
            mechanism,
            settings.proposed_conformance
        );
        self.frames(vec![aarq.encode()])
    }

    /// Apply the AARE of the server.
    ///
    /// # Errors
    ///
    /// `Rejected` when the server refused the association or answered with
    /// an unsupported DLMS version.
    pub fn parse_aare_response(&mut self, reply: &ReplyData) -> DlmsResult<()> {
        if reply.command != Some(Command::Aare) {
            return Err(DlmsError::InvalidData(format!(
                "AARE expected, received {:?}",
                reply.command
            )));
        }
        let aare = AAREApdu::decode(reply.data.data())?;
        if let Some(information) = &aare.user_information {
            if information.first() == Some(&CONFIRMED_SERVICE_ERROR_TAG) {
                let error = ConfirmedServiceError::decode(information)?;
                self.settings.set_status(AssociationStatus::Disconnected);
                return Err(DlmsError::Rejected(error.to_string()));
            }
        }
        if aare.result != AssociateResult::Accepted {
            self.settings.set_status(AssociationStatus::Disconnected);
            return Err(DlmsError::Rejected(format!(
                "{:?}: {}",
                aare.result, aare.diagnostic
            )));
        }
        let information = aare.user_information.as_deref().ok_or_else(|| {
            DlmsError::InvalidData("AARE without InitiateResponse".to_string())
        })?;
        let initiate = InitiateResponse::decode(information)?;
        if initiate.negotiated_dlms_version != self.settings.dlms_version
            && !self.settings.quirks.any_dlms_version
        {
            self.settings.set_status(AssociationStatus::Disconnected);
            return Err(DlmsError::Rejected(format!(
                "DLMS version {} is not supported",
                initiate.negotiated_dlms_version
            )));
        }
        self.settings.negotiated_conformance = initiate.negotiated_conformance;
        if initiate.server_max_receive_pdu_size != 0 {
            self.settings.max_pdu_size = initiate.server_max_receive_pdu_size;
        }

        if aare.diagnostic == SourceDiagnostic::AuthenticationRequired {
            let challenge = aare.responding_authentication_value.ok_or_else(|| {
                DlmsError::Security("AARE asks for authentication without a challenge".to_string())
            })?;
            if self.settings.authentication == Authentication::HighGmac {
                let title = aare.responding_ap_title.as_deref().ok_or_else(|| {
                    DlmsError::Security("AARE without server system title".to_string())
                })?;
                self.settings.cipher.set_source_system_title(title)?;
            }
            self.settings.stoc_challenge = Some(challenge);
            self.settings.set_status(AssociationStatus::AssociationPending);
        } else {
            self.settings.set_status(AssociationStatus::Connected);
        }
        log::info!(
            "Association accepted, server PDU size {}, conformance {:?}",
            self.settings.max_pdu_size,
            self.settings.negotiated_conformance
        );
        Ok(())
    }

    /// Reply-to-HLS-authentication call carrying our proof for the server
    /// challenge.
    pub fn application_association_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        let challenge = self.settings.stoc_challenge.clone().ok_or_else(|| {
            DlmsError::Security("No server challenge to answer".to_string())
        })?;
        let mechanism = self.settings.authentication;
        let proof = if mechanism == Authentication::HighGmac {
            let ic = self.settings.cipher.next_invocation_counter()?;
            let title = self.settings.cipher.system_title().to_vec();
            secure(Some(&self.settings.cipher), mechanism, ic, &challenge, &title)?
        } else {
            secure(None, mechanism, 0, &challenge, &self.settings.password)?
        };
        let proof = Value::OctetString(proof);
        if self.settings.use_logical_name_referencing {
            self.method(
                ObjectType::AssociationLogicalName,
                ObjectName::Logical(ObisCode::CURRENT_ASSOCIATION),
                1,
                Some(&proof),
            )
        } else {
            self.method(
                ObjectType::AssociationShortName,
                ObjectName::Short(VAA_NAME_SN),
                8,
                Some(&proof),
            )
        }
    }

    /// Check the proof the server returned for our challenge.
    ///
    /// # Errors
    ///
    /// `Security` when the server refused our proof or its own proof is
    /// wrong. The association is dropped in both cases.
    pub fn parse_application_association_response(&mut self, reply: &ReplyData) -> DlmsResult<()> {
        let result = self.verify_server_proof(reply);
        match &result {
            Ok(()) => {
                self.settings.set_status(AssociationStatus::Connected);
                log::info!("HLS authentication {} succeeded", self.settings.authentication);
            }
            Err(e) => {
                log::warn!("HLS authentication failed: {}", e);
                self.settings.set_status(AssociationStatus::Disconnected);
            }
        }
        result
    }

    fn verify_server_proof(&mut self, reply: &ReplyData) -> DlmsResult<()> {
        if let Some(error) = reply.error {
            return Err(DlmsError::Security(format!(
                "Server refused the HLS proof: {:?}",
                error
            )));
        }
        let value = reply.value(&self.settings.codec)?;
        let proof = value.as_bytes().map_err(|_| {
            DlmsError::Security(format!("Server proof is {}", value.data_type()))
        })?;
        let challenge = self.settings.ctos_challenge.clone().ok_or_else(|| {
            DlmsError::Security("No client challenge was sent".to_string())
        })?;
        let mechanism = self.settings.authentication;
        let secret = self.settings.password.clone();
        if !verify_proof(
            Some(&mut self.settings.cipher),
            mechanism,
            &challenge,
            &secret,
            proof,
        )? {
            return Err(DlmsError::Security(
                "Server to client challenge does not match".to_string(),
            ));
        }
        Ok(())
    }

    /// Release request ending the association.
    pub fn release_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        self.settings.reset_block_index();
        self.frames(vec![RLRQApdu::new().encode()])
    }

    /// Frames closing the connection: DISC for HDLC, a release request for
    /// a wrapper association still open.
    pub fn disconnect_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        let frames = match &mut self.framing {
            Framing::Hdlc(link) => vec![link.disc()?],
            Framing::Wrapper { .. } => {
                if self.settings.status == AssociationStatus::Disconnected {
                    Vec::new()
                } else {
                    self.release_request()?
                }
            }
        };
        self.settings.reset();
        self.pending_rr = None;
        Ok(frames)
    }

    /// Request keeping the connection alive: a read of the logical name of
    /// the first known object. Empty for the wrapper.
    pub fn keep_alive(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        if matches!(self.framing, Framing::Wrapper { .. }) {
            return Ok(Vec::new());
        }
        let target = self
            .objects
            .get(0)
            .map(|object| (object.object_type(), self.object_name(object)));
        let (object_type, name) = match target {
            Some(target) => target,
            None if self.settings.use_logical_name_referencing => (
                ObjectType::AssociationLogicalName,
                ObjectName::Logical(ObisCode::CURRENT_ASSOCIATION),
            ),
            None => (ObjectType::AssociationShortName, ObjectName::Short(VAA_NAME_SN)),
        };
        self.read(object_type, name, 1)
    }

    pub fn read(
        &mut self,
        object_type: ObjectType,
        name: ObjectName,
        index: u8,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        self.read_selective(object_type, name, index, None)
    }

    /// Get (LN) or Read (SN) of one attribute, optionally with selective
    /// access.
    pub fn read_selective(
        &mut self,
        object_type: ObjectType,
        name: ObjectName,
        index: u8,
        selection: Option<&Selection>,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        if index == 0 {
            return Err(DlmsError::InvalidData("Invalid attribute index 0".to_string()));
        }
        self.settings.reset_block_index();
        let data = match selection {
            Some(selection) => {
                let mut buff = ByteBuffer::new();
                buff.set_u8(selection.selector);
                set_data(
                    &self.settings.codec,
                    &mut buff,
                    value_type(&selection.parameters),
                    &selection.parameters,
                )?;
                Some(buff)
            }
            None => None,
        };
        let pdus = if self.settings.use_logical_name_referencing {
            let mut descriptor = ByteBuffer::new();
            LnDescriptor::new(object_type, name.logical()?, index).write(&mut descriptor);
            descriptor.set_u8(u8::from(data.is_some()));
            let p = LnParameters::new(
                &self.settings,
                Command::GetRequest,
                GetRequestType::Normal.as_u8(),
                Some(descriptor.into_vec()),
                data,
                NO_STATUS,
            );
            get_ln_messages(&mut self.settings, p)?
        } else {
            let sn = sn_attribute(name.short()?, index)?;
            let access = if data.is_some() {
                VariableAccessSpecification::ParameterisedAccess
            } else {
                VariableAccessSpecification::VariableName
            };
            let p = SnParameters::new(
                &self.settings,
                Command::ReadRequest,
                Some(1),
                Some(access.as_u8()),
                Some(sn.to_be_bytes().to_vec()),
                data,
            );
            get_sn_messages(&self.settings, p)?
        };
        log::debug!("Read {} {}:{}", object_type, name, index);
        self.frames(pdus)
    }

    /// Read several attributes at once. LN requests carry at most ten
    /// items and are split further for small PDU sizes; SN requests are
    /// split when they reach the PDU size.
    pub fn read_list(
        &mut self,
        items: &[(ObjectType, ObjectName, u8)],
    ) -> DlmsResult<Vec<Vec<u8>>> {
        if items.is_empty() {
            return Err(DlmsError::InvalidData("Read list is empty".to_string()));
        }
        self.settings.reset_block_index();
        let max_pdu = usize::from(self.settings.max_pdu_size);
        let mut pdus = Vec::new();
        if self.settings.use_logical_name_referencing {
            let per_request = (max_pdu.saturating_sub(LIST_REQUEST_OVERHEAD) / LIST_ITEM_SIZE)
                .clamp(1, MAX_LIST_ITEMS);
            for chunk in items.chunks(per_request) {
                let mut data = ByteBuffer::new();
                data.set_object_count(chunk.len());
                for (object_type, name, index) in chunk {
                    LnDescriptor::new(*object_type, name.logical()?, *index).write(&mut data);
                    data.set_u8(0);
                }
                let p = LnParameters::new(
                    &self.settings,
                    Command::GetRequest,
                    GetRequestType::WithList.as_u8(),
                    None,
                    Some(data),
                    NO_STATUS,
                );
                pdus.extend(get_ln_messages(&mut self.settings, p)?);
            }
        } else {
            let mut data = ByteBuffer::new();
            let mut count = 0;
            for (_, name, index) in items {
                data.set_u8(VariableAccessSpecification::VariableName.as_u8());
                data.set_u16(sn_attribute(name.short()?, *index)?);
                count += 1;
                // command and item count
                if data.size() + 3 + 3 >= max_pdu {
                    pdus.extend(self.sn_read_list_pdu(count, std::mem::take(&mut data))?);
                    count = 0;
                }
            }
            if count != 0 {
                pdus.extend(self.sn_read_list_pdu(count, data)?);
            }
        }
        self.frames(pdus)
    }

    fn sn_read_list_pdu(&self, count: usize, data: ByteBuffer) -> DlmsResult<Vec<Vec<u8>>> {
        let p = SnParameters::new(
            &self.settings,
            Command::ReadRequest,
            Some(count),
            None,
            None,
            Some(data),
        );
        get_sn_messages(&self.settings, p)
    }

    /// Set (LN) or Write (SN) of one attribute. LN values larger than the
    /// server PDU size are sent in data blocks.
    pub fn write(
        &mut self,
        object_type: ObjectType,
        name: ObjectName,
        index: u8,
        value: &Value,
        data_type: DataType,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        if index == 0 {
            return Err(DlmsError::InvalidData("Invalid attribute index 0".to_string()));
        }
        self.settings.reset_block_index();
        let mut data = ByteBuffer::new();
        set_data(&self.settings.codec, &mut data, data_type, value)?;
        let pdus = if self.settings.use_logical_name_referencing {
            let mut descriptor = ByteBuffer::new();
            LnDescriptor::new(object_type, name.logical()?, index).write(&mut descriptor);
            descriptor.set_u8(0);
            let p = LnParameters::new(
                &self.settings,
                Command::SetRequest,
                SetRequestType::Normal.as_u8(),
                Some(descriptor.into_vec()),
                Some(data),
                NO_STATUS,
            );
            get_ln_messages(&mut self.settings, p)?
        } else {
            let mut descriptor = sn_attribute(name.short()?, index)?.to_be_bytes().to_vec();
            // one data item follows
            descriptor.push(1);
            let p = SnParameters::new(
                &self.settings,
                Command::WriteRequest,
                Some(1),
                Some(VariableAccessSpecification::VariableName.as_u8()),
                Some(descriptor),
                Some(data),
            );
            get_sn_messages(&self.settings, p)?
        };
        log::debug!("Write {} {}:{}", object_type, name, index);
        self.frames(pdus)
    }

    /// Write the current value of attribute `index` of `object`.
    pub fn write_object(
        &mut self,
        object: &mut dyn CosemObject,
        index: u8,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        let value = object.get_value(&self.settings, index, None)?;
        let data_type = match object.data_type(index) {
            DataType::None => value_type(&value),
            data_type => data_type,
        };
        let name = self.object_name(object);
        self.write(object.object_type(), name, index, &value, data_type)
    }

    /// Action (LN) or method call through Read (SN).
    pub fn method(
        &mut self,
        object_type: ObjectType,
        name: ObjectName,
        index: u8,
        parameter: Option<&Value>,
    ) -> DlmsResult<Vec<Vec<u8>>> {
        if index == 0 {
            return Err(DlmsError::InvalidData("Invalid method index 0".to_string()));
        }
        self.settings.reset_block_index();
        let data = match parameter {
            Some(value) => {
                let mut buff = ByteBuffer::new();
                set_data(&self.settings.codec, &mut buff, value_type(value), value)?;
                Some(buff)
            }
            None => None,
        };
        let pdus = if self.settings.use_logical_name_referencing {
            let mut descriptor = ByteBuffer::new();
            LnDescriptor::new(object_type, name.logical()?, index).write(&mut descriptor);
            descriptor.set_u8(u8::from(data.is_some()));
            let p = LnParameters::new(
                &self.settings,
                Command::MethodRequest,
                ActionRequestType::Normal.as_u8(),
                Some(descriptor.into_vec()),
                data,
                NO_STATUS,
            );
            get_ln_messages(&mut self.settings, p)?
        } else {
            let mut descriptor = sn_method(object_type, name.short()?, index)?
                .to_be_bytes()
                .to_vec();
            let access = if data.is_some() {
                // selector of the parameterised access
                descriptor.push(1);
                VariableAccessSpecification::ParameterisedAccess
            } else {
                VariableAccessSpecification::VariableName
            };
            let p = SnParameters::new(
                &self.settings,
                Command::ReadRequest,
                Some(1),
                Some(access.as_u8()),
                Some(descriptor),
                data,
            );
            get_sn_messages(&self.settings, p)?
        };
        log::debug!("Method {} {}:{}", object_type, name, index);
        self.frames(pdus)
    }

    /// Access service request executing `items` in one PDU. Needs logical
    /// name referencing.
    pub fn access_request(
        &mut self,
        time: Option<CosemDateTime>,
        items: &[AccessItem],
    ) -> DlmsResult<Vec<Vec<u8>>> {
        if !self.settings.use_logical_name_referencing {
            return Err(DlmsError::Protocol(
                "Access service needs logical name referencing".to_string(),
            ));
        }
        self.settings.reset_block_index();
        let mut data = ByteBuffer::new();
        data.set_object_count(items.len());
        for item in items {
            data.set_u8(item.command.as_u8());
            LnDescriptor::new(item.object_type, item.logical_name, item.index).write(&mut data);
        }
        data.set_object_count(items.len());
        for item in items {
            if item.command == AccessServiceCommandType::Get {
                data.set_u8(0);
            } else {
                set_data(
                    &self.settings.codec,
                    &mut data,
                    value_type(&item.value),
                    &item.value,
                )?;
            }
        }
        let mut p = LnParameters::new(
            &self.settings,
            Command::AccessRequest,
            0,
            None,
            Some(data),
            NO_STATUS,
        );
        p.time = time;
        let pdus = get_ln_messages(&mut self.settings, p)?;
        self.frames(pdus)
    }

    /// Rows `index..index + count` of the buffer, 1-based. `count` 0 reads
    /// to the end. `columns` limits the read to the span of those capture
    /// objects; empty reads every column.
    ///
    /// # Errors
    ///
    /// Columns given before the capture objects of `profile` are known, or
    /// columns that are not capture objects.
    pub fn read_rows_by_entry(
        &mut self,
        profile: &ProfileGeneric,
        index: u32,
        count: u32,
        columns: &[CaptureObject],
    ) -> DlmsResult<Vec<Vec<u8>>> {
        let (from_column, to_column) = if columns.is_empty() {
            (1, 0)
        } else {
            if profile.capture_objects.is_empty() {
                return Err(DlmsError::InvalidData(
                    "Read the capture objects before selecting columns".to_string(),
                ));
            }
            let positions = columns
                .iter()
                .map(|column| column_position(profile, column))
                .collect::<DlmsResult<Vec<u16>>>()?;
            let first = positions.iter().copied().min().unwrap_or(1);
            let last = positions.iter().copied().max().unwrap_or(0);
            (first, last)
        };
        let to = if count == 0 {
            0
        } else {
            index.max(1).saturating_add(count - 1)
        };
        let selection = Selection {
            selector: SELECTOR_ENTRY,
            parameters: Value::Structure(vec![
                Value::UInt32(index),
                Value::UInt32(to),
                Value::UInt16(from_column),
                Value::UInt16(to_column),
            ]),
        };
        let name = self.object_name(profile);
        self.read_selective(
            ObjectType::ProfileGeneric,
            name,
            ProfileGeneric::ATTR_BUFFER,
            Some(&selection),
        )
    }

    /// Rows whose first capture object (the clock when unknown) lies
    /// between `start` and `end`.
    pub fn read_rows_by_range(
        &mut self,
        profile: &ProfileGeneric,
        start: &CosemDateTime,
        end: &CosemDateTime,
        columns: &[CaptureObject],
    ) -> DlmsResult<Vec<Vec<u8>>> {
        let restricting = profile
            .capture_objects
            .first()
            .copied()
            .unwrap_or_else(|| CaptureObject::new(ObjectType::Clock, ObisCode::CLOCK, 2));
        let selection = Selection {
            selector: SELECTOR_RANGE,
            parameters: Value::Structure(vec![
                restricting.to_value(),
                Value::DateTime(*start),
                Value::DateTime(*end),
                Value::Array(columns.iter().map(CaptureObject::to_value).collect()),
            ]),
        };
        let name = self.object_name(profile);
        self.read_selective(
            ObjectType::ProfileGeneric,
            name,
            ProfileGeneric::ATTR_BUFFER,
            Some(&selection),
        )
    }

    /// Read of the object list of the current association.
    pub fn get_objects_request(&mut self) -> DlmsResult<Vec<Vec<u8>>> {
        if self.settings.use_logical_name_referencing {
            self.read(
                ObjectType::AssociationLogicalName,
                ObjectName::Logical(ObisCode::CURRENT_ASSOCIATION),
                2,
            )
        } else {
            self.read(ObjectType::AssociationShortName, ObjectName::Short(VAA_NAME_SN), 2)
        }
    }

    /// Replace the known objects with the object list in `reply`.
    pub fn parse_objects(&mut self, reply: &ReplyData) -> DlmsResult<&ObjectCollection> {
        if let Some(error) = reply.error {
            return Err(DlmsError::Device(error));
        }
        let descriptors = parse_object_list(
            &self.settings.codec,
            reply.data.data(),
            self.settings.use_logical_name_referencing,
            &self.settings.quirks,
        )?;
        self.objects = descriptors.iter().map(ObjectDescriptor::create_object).collect();
        log::debug!("Association has {} objects", self.objects.len());
        Ok(&self.objects)
    }

    /// Next frame to send while `reply` is incomplete: an RR for the next
    /// HDLC segment or a request for the next data block.
    pub fn receiver_ready(&mut self, reply: &ReplyData) -> DlmsResult<Vec<u8>> {
        match reply.more_data {
            MoreData::None => Err(DlmsError::Protocol("Reply is already complete".to_string())),
            MoreData::Frame => {
                if let Some(rr) = self.pending_rr.take() {
                    return Ok(rr);
                }
                match &mut self.framing {
                    Framing::Hdlc(link) => link.receiver_ready(),
                    Framing::Wrapper { .. } => Err(DlmsError::Protocol(
                        "Wrapper frames are never segmented".to_string(),
                    )),
                }
            }
            MoreData::Block => {
                let block = self.settings.block_index();
                let pdus = if self.settings.use_logical_name_referencing {
                    let mut data = ByteBuffer::new();
                    data.set_u32(block);
                    let p = LnParameters::new(
                        &self.settings,
                        Command::GetRequest,
                        GetRequestType::NextDataBlock.as_u8(),
                        None,
                        Some(data),
                        NO_STATUS,
                    );
                    get_ln_messages(&mut self.settings, p)?
                } else {
                    let mut data = ByteBuffer::new();
                    data.set_u16(block as u16);
                    let p = SnParameters::new(
                        &self.settings,
                        Command::ReadRequest,
                        Some(1),
                        Some(VariableAccessSpecification::BlockNumberAccess.as_u8()),
                        None,
                        Some(data),
                    );
                    get_sn_messages(&self.settings, p)?
                };
                self.settings.increase_block_index();
                log::trace!("Asking for data block after {}", block);
                self.frames(pdus)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| DlmsError::Protocol("Nothing to send".to_string()))
            }
        }
    }

    /// Feed received bytes.
    ///
    /// # Returns
    ///
    /// `true` when a frame was handled and `reply` can be inspected. Check
    /// `reply.more_data` before using the content. `false` when more bytes
    /// are needed.
    ///
    /// # Errors
    ///
    /// Corrupt frames, frame rejects and error replies of the server.
    pub fn get_data(&mut self, data: &[u8], reply: &mut ReplyData) -> DlmsResult<bool> {
        let event = match &mut self.framing {
            Framing::Hdlc(link) => {
                link.feed(data);
                link.poll()?
            }
            Framing::Wrapper { wrapper, input } => {
                input.extend_from_slice(data);
                wrapper.unwrap(input)?.map(LinkEvent::Pdu)
            }
        };
        let Some(event) = event else {
            return Ok(false);
        };
        match event {
            LinkEvent::Pdu(pdu) => {
                get_pdu(&mut self.settings, &pdu, reply)?;
                if reply.command == Some(Command::ReleaseResponse) {
                    RLREApdu::decode(reply.data.data())?;
                    self.settings.set_status(AssociationStatus::Disconnected);
                }
            }
            LinkEvent::Segment { reply: rr } => {
                self.pending_rr = Some(rr);
                reply.more_data = MoreData::Frame;
            }
            LinkEvent::ReceiverReady => log::trace!("Server is ready for the next segment"),
            LinkEvent::Ua(limits) => {
                self.settings.limits = limits;
                reply.command = Some(Command::Ua);
            }
            LinkEvent::Disconnect | LinkEvent::DisconnectMode => {
                log::debug!("Server closed the link");
                self.settings.reset();
                reply.command = Some(Command::DisconnectRequest);
            }
            LinkEvent::FrameReject => {
                return Err(DlmsError::FrameInvalid("Server rejected the frame".to_string()))
            }
            LinkEvent::Snrm(_) => {
                return Err(DlmsError::Protocol("SNRM received by a client".to_string()))
            }
        }
        Ok(true)
    }

    /// Value of a complete single-attribute reply.
    ///
    /// # Errors
    ///
    /// `Device` with the data-access-result the server returned.
    pub fn get_value(&self, reply: &ReplyData) -> DlmsResult<Value> {
        match reply.error {
            Some(error) => Err(DlmsError::Device(error)),
            None => reply.value(&self.settings.codec),
        }
    }

    /// Results of a read list or SN multi-item read.
    pub fn parse_list_response(
        &self,
        reply: &ReplyData,
    ) -> DlmsResult<Vec<Result<Value, ErrorCode>>> {
        if !self.settings.use_logical_name_referencing && reply.total_count == 1 {
            return Ok(vec![match reply.error {
                Some(error) => Err(error),
                None => Ok(reply.value(&self.settings.codec)?),
            }]);
        }
        parse_result_list(&self.settings.codec, reply.data.data())
    }

    /// Value and result of every item of an access response.
    pub fn parse_access_response(&self, reply: &ReplyData) -> DlmsResult<Vec<(Value, ErrorCode)>> {
        let mut buff = ByteBuffer::from_slice(reply.data.data());
        let count = buff.get_object_count()?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            let mut info = DataInfo::new();
            let value = get_data(&self.settings.codec, &mut buff, &mut info)?.ok_or_else(|| {
                DlmsError::InvalidData("Access response value is incomplete".to_string())
            })?;
            values.push(value);
        }
        let results = buff.get_object_count()?;
        if results != count {
            return Err(DlmsError::InvalidData(format!(
                "Access response has {} values and {} results",
                count, results
            )));
        }
        let mut items = Vec::with_capacity(count);
        for value in values {
            // service type of the item
            buff.get_u8()?;
            items.push((value, ErrorCode::from_u8(buff.get_u8()?)));
        }
        Ok(items)
    }

    /// Store a read value in attribute `index` of `object`. Octet strings
    /// are converted to the attribute type first.
    pub fn update_value(
        &mut self,
        object: &mut dyn CosemObject,
        index: u8,
        value: Value,
    ) -> DlmsResult<()> {
        let value = match (&value, object.data_type(index)) {
            (Value::OctetString(bytes), data_type)
                if !matches!(
                    data_type,
                    DataType::None
                        | DataType::OctetString
                        | DataType::Array
                        | DataType::Structure
                ) =>
            {
                change_type(&self.settings.codec, bytes, data_type)?
            }
            _ => value,
        };
        object.set_value(&mut self.settings, index, value)
    }
}

fn column_position(profile: &ProfileGeneric, column: &CaptureObject) -> DlmsResult<u16> {
    profile
        .capture_objects
        .iter()
        .position(|c| {
            c.object_type == column.object_type
                && c.logical_name == column.logical_name
                && c.attribute_index == column.attribute_index
        })
        .map(|position| position as u16 + 1)
        .ok_or_else(|| {
            DlmsError::InvalidData(format!(
                "{} {}:{} is not a capture object",
                column.object_type, column.logical_name, column.attribute_index
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosem_asn1::{CodecOptions, Conformance};
    use cosem_core::byte_buffer::from_hex;
    use cosem_interface::Clock;
    use cosem_session::{Limits, WrapperHeader};

    const REGISTER: ObisCode = ObisCode::new(1, 0, 1, 8, 0, 255);

    fn wrapper_client(use_ln: bool) -> DlmsClient {
        let config = ClientConfig {
            interface_type: InterfaceType::Wrapper,
            use_logical_name_referencing: use_ln,
            ..ClientConfig::default()
        };
        DlmsClient::new(&config).unwrap()
    }

    /// Strip the wrapper header of the only frame
    fn pdu(frames: &[Vec<u8>]) -> &[u8] {
        assert_eq!(frames.len(), 1);
        &frames[0][8..]
    }

    fn from_server(pdu: &[u8]) -> Vec<u8> {
        let mut frame = WrapperHeader::new(1, 0x10, pdu.len() as u16).encode().to_vec();
        frame.extend_from_slice(pdu);
        frame
    }

    fn receive(client: &mut DlmsClient, pdu: &[u8]) -> ReplyData {
        let mut reply = ReplyData::new();
        assert!(client.get_data(&from_server(pdu), &mut reply).unwrap());
        reply
    }

    fn aare(diagnostic: SourceDiagnostic, challenge: Option<&[u8]>) -> Vec<u8> {
        let mut aare = AAREApdu::new(
            ApplicationContext::for_referencing(true),
            AssociateResult::Accepted,
            diagnostic,
        );
        aare.responding_authentication_value = challenge.map(<[u8]>::to_vec);
        aare.user_information =
            Some(InitiateResponse::new(Conformance::DEFAULT_LN, 512, true).encode());
        aare.encode()
    }

    #[test]
    fn test_aarq_without_authentication() {
        let mut client = wrapper_client(true);
        let frames = client.aarq_request().unwrap();
        assert_eq!(&frames[0][..6], &[0x00, 0x01, 0x00, 0x10, 0x00, 0x01]);
        let aarq = AARQApdu::decode(pdu(&frames)).unwrap();
        assert!(aarq.application_context.is_logical_name());
        assert!(aarq.mechanism_id.is_none());
        let initiate = InitiateRequest::decode(aarq.user_information.as_deref().unwrap()).unwrap();
        assert_eq!(initiate.proposed_conformance, Conformance::DEFAULT_LN);
        assert_eq!(initiate.client_max_receive_pdu_size, 0xFFFF);
    }

    #[test]
    fn test_aarq_low_level_needs_password() {
        let config = ClientConfig {
            interface_type: InterfaceType::Wrapper,
            authentication: Authentication::Low,
            ..ClientConfig::default()
        };
        let mut client = DlmsClient::new(&config).unwrap();
        assert!(client.aarq_request().is_err());

        client.settings_mut().password = b"00000000".to_vec();
        let aarq = AARQApdu::decode(pdu(&client.aarq_request().unwrap())).unwrap();
        assert_eq!(aarq.mechanism_id, Some(1));
        assert_eq!(aarq.calling_authentication_value.as_deref(), Some(&b"00000000"[..]));
    }

    #[test]
    fn test_aare_accepted() {
        let mut client = wrapper_client(true);
        client.aarq_request().unwrap();
        let reply = receive(&mut client, &aare(SourceDiagnostic::Null, None));
        client.parse_aare_response(&reply).unwrap();
        assert!(client.is_connected());
        assert!(!client.is_authentication_required());
        assert_eq!(client.settings().max_pdu_size, 512);
        assert_eq!(client.settings().negotiated_conformance, Conformance::DEFAULT_LN);
    }

    #[test]
    fn test_aare_rejected() {
        let mut client = wrapper_client(true);
        client.aarq_request().unwrap();
        let rejected = AAREApdu::new(
            ApplicationContext::for_referencing(true),
            AssociateResult::RejectedPermanent,
            SourceDiagnostic::AuthenticationFailure,
        );
        let reply = receive(&mut client, &rejected.encode());
        match client.parse_aare_response(&reply) {
            Err(DlmsError::Rejected(reason)) => assert!(reason.contains("authentication failure")),
            other => panic!("Unexpected {:?}", other),
        }
        assert!(!client.is_connected());
    }

    #[test]
    fn test_hls_md5_association() {
        let config = ClientConfig {
            interface_type: InterfaceType::Wrapper,
            authentication: Authentication::HighMd5,
            password: b"Gurux".to_vec(),
            ctos_challenge: Some(b"P6wRJ21F".to_vec()),
            ..ClientConfig::default()
        };
        let mut client = DlmsClient::new(&config).unwrap();
        let aarq = AARQApdu::decode(pdu(&client.aarq_request().unwrap())).unwrap();
        assert_eq!(aarq.mechanism_id, Some(Authentication::HighMd5.id()));
        assert_eq!(aarq.calling_authentication_value.as_deref(), Some(&b"P6wRJ21F"[..]));

        let stoc = b"ABCDEFGHIJKLMNOP";
        let reply = receive(
            &mut client,
            &aare(SourceDiagnostic::AuthenticationRequired, Some(stoc)),
        );
        client.parse_aare_response(&reply).unwrap();
        assert!(client.is_authentication_required());

        let frames = client.application_association_request().unwrap();
        let proof = secure(None, Authentication::HighMd5, 0, stoc, b"Gurux").unwrap();
        let mut expected = from_hex("C3 01 C1 00 0F 00 00 28 00 00 FF 01 01 09 10").unwrap();
        expected.extend_from_slice(&proof);
        assert_eq!(pdu(&frames), expected.as_slice());

        let server_proof = secure(None, Authentication::HighMd5, 0, b"P6wRJ21F", b"Gurux").unwrap();
        let mut response = from_hex("C7 01 C1 00 01 00 09 10").unwrap();
        response.extend_from_slice(&server_proof);
        let reply = receive(&mut client, &response);
        client.parse_application_association_response(&reply).unwrap();
        assert!(client.is_connected());
    }

    #[test]
    fn test_hls_wrong_server_proof() {
        let config = ClientConfig {
            interface_type: InterfaceType::Wrapper,
            authentication: Authentication::HighSha256,
            password: b"Gurux".to_vec(),
            ..ClientConfig::default()
        };
        let mut client = DlmsClient::new(&config).unwrap();
        client.aarq_request().unwrap();
        let reply = receive(
            &mut client,
            &aare(SourceDiagnostic::AuthenticationRequired, Some(b"12345678")),
        );
        client.parse_aare_response(&reply).unwrap();
        client.application_association_request().unwrap();

        let mut response = from_hex("C7 01 C1 00 01 00 09 20").unwrap();
        response.extend_from_slice(&[0u8; 32]);
        let reply = receive(&mut client, &response);
        assert!(matches!(
            client.parse_application_association_response(&reply),
            Err(DlmsError::Security(_))
        ));
        assert_eq!(client.settings().status, AssociationStatus::Disconnected);

        let reply = receive(&mut client, &from_hex("C7 01 C1 03").unwrap());
        assert!(client.parse_application_association_response(&reply).is_err());
    }

    #[test]
    fn test_ln_requests() {
        let mut client = wrapper_client(true);
        let frames = client.read(ObjectType::Register, REGISTER.into(), 2).unwrap();
        assert_eq!(
            pdu(&frames),
            from_hex("C0 01 C1 00 03 01 00 01 08 00 FF 02 00").unwrap().as_slice()
        );

        let frames = client
            .write(ObjectType::Register, REGISTER.into(), 2, &Value::UInt32(5), DataType::UInt32)
            .unwrap();
        assert_eq!(
            pdu(&frames),
            from_hex("C1 01 C1 00 03 01 00 01 08 00 FF 02 00 06 00 00 00 05").unwrap().as_slice()
        );

        let frames = client
            .method(ObjectType::Register, REGISTER.into(), 1, Some(&Value::Int8(0)))
            .unwrap();
        assert_eq!(
            pdu(&frames),
            from_hex("C3 01 C1 00 03 01 00 01 08 00 FF 01 01 0F 00").unwrap().as_slice()
        );
        assert!(client.read(ObjectType::Register, REGISTER.into(), 0).is_err());
        assert!(client.read(ObjectType::Register, ObjectName::Short(0x100), 2).is_err());
    }

    #[test]
    fn test_sn_requests() {
        let mut client = wrapper_client(false);
        let frames = client.read(ObjectType::Register, ObjectName::Short(0x0100), 2).unwrap();
        assert_eq!(pdu(&frames), &[0x05, 0x01, 0x02, 0x01, 0x08]);

        let frames = client
            .write(ObjectType::Data, ObjectName::Short(0x0100), 2, &Value::UInt8(5), DataType::UInt8)
            .unwrap();
        assert_eq!(pdu(&frames), &[0x06, 0x01, 0x02, 0x01, 0x08, 0x01, 0x11, 0x05]);

        let frames = client
            .method(ObjectType::Register, ObjectName::Short(0x0100), 1, Some(&Value::Int8(0)))
            .unwrap();
        assert_eq!(pdu(&frames), &[0x05, 0x01, 0x04, 0x01, 0x28, 0x01, 0x0F, 0x00]);

        let frames = client
            .method(ObjectType::Register, ObjectName::Short(0x0100), 1, None)
            .unwrap();
        assert_eq!(pdu(&frames), &[0x05, 0x01, 0x02, 0x01, 0x28]);
        assert!(client.access_request(None, &[]).is_err());
    }

    #[test]
    fn test_get_with_data_blocks() {
        let mut client = wrapper_client(true);
        client.read(ObjectType::Data, REGISTER.into(), 2).unwrap();
        let mut reply = ReplyData::new();
        assert!(client
            .get_data(&from_server(&from_hex("C4 02 C1 00 00 00 00 01 00 03 09 04 01").unwrap()), &mut reply)
            .unwrap());
        assert_eq!(reply.more_data, MoreData::Block);

        let next = client.receiver_ready(&reply).unwrap();
        assert_eq!(&next[8..], &[0xC0, 0x02, 0xC1, 0x00, 0x00, 0x00, 0x01]);

        assert!(client
            .get_data(&from_server(&from_hex("C4 02 C1 01 00 00 00 02 00 03 02 03 04").unwrap()), &mut reply)
            .unwrap());
        assert!(reply.is_complete());
        assert_eq!(client.get_value(&reply).unwrap(), Value::OctetString(vec![1, 2, 3, 4]));
        assert!(client.receiver_ready(&reply).is_err());
    }

    #[test]
    fn test_sn_read_blocks() {
        let mut client = wrapper_client(false);
        let mut reply = ReplyData::new();
        client
            .get_data(&from_server(&from_hex("0C 01 02 00 00 01 02 09 03").unwrap()), &mut reply)
            .unwrap();
        assert_eq!(reply.more_data, MoreData::Block);
        let next = client.receiver_ready(&reply).unwrap();
        assert_eq!(&next[8..], &[0x05, 0x01, 0x05, 0x00, 0x01]);
    }

    #[test]
    fn test_read_list() {
        let mut client = wrapper_client(true);
        let frames = client
            .read_list(&[
                (ObjectType::Register, REGISTER.into(), 2),
                (ObjectType::Clock, ObisCode::CLOCK.into(), 2),
            ])
            .unwrap();
        assert_eq!(
            pdu(&frames),
            from_hex(
                "C0 03 C1 02 00 03 01 00 01 08 00 FF 02 00 00 08 00 00 01 00 00 FF 02 00"
            )
            .unwrap()
            .as_slice()
        );
        let reply = receive(&mut client, &from_hex("C4 03 C1 02 00 11 07 01 03").unwrap());
        assert_eq!(
            client.parse_list_response(&reply).unwrap(),
            vec![Ok(Value::UInt8(7)), Err(ErrorCode::ReadWriteDenied)]
        );

        // two items per request
        client.settings_mut().max_pdu_size = 40;
        let items = vec![(ObjectType::Register, ObjectName::from(REGISTER), 2); 5];
        assert_eq!(client.read_list(&items).unwrap().len(), 3);
        assert!(client.read_list(&[]).is_err());
    }

    #[test]
    fn test_sn_read_list() {
        let mut client = wrapper_client(false);
        let frames = client
            .read_list(&[
                (ObjectType::Register, ObjectName::Short(0x0100), 2),
                (ObjectType::Clock, ObjectName::Short(0x0200), 2),
            ])
            .unwrap();
        assert_eq!(pdu(&frames), &[0x05, 0x02, 0x02, 0x01, 0x08, 0x02, 0x02, 0x08]);

        let reply = receive(&mut client, &from_hex("0C 02 00 11 01 01 04").unwrap());
        assert_eq!(
            client.parse_list_response(&reply).unwrap(),
            vec![Ok(Value::UInt8(1)), Err(ErrorCode::UndefinedObject)]
        );
        let reply = receive(&mut client, &from_hex("0C 01 01 03").unwrap());
        assert_eq!(
            client.parse_list_response(&reply).unwrap(),
            vec![Err(ErrorCode::ReadWriteDenied)]
        );
    }

    #[test]
    fn test_access_request_and_response() {
        let mut client = wrapper_client(true);
        let frames = client
            .access_request(None, &[AccessItem::get(ObjectType::Register, REGISTER, 2)])
            .unwrap();
        assert_eq!(
            pdu(&frames),
            from_hex("D9 C0 00 00 00 00 01 01 00 03 01 00 01 08 00 FF 02 01 00")
                .unwrap()
                .as_slice()
        );
        let reply = receive(&mut client, &from_hex("DA C0 00 00 01 00 01 11 05 01 01 00").unwrap());
        assert_eq!(
            client.parse_access_response(&reply).unwrap(),
            vec![(Value::UInt8(5), ErrorCode::Ok)]
        );
    }

    #[test]
    fn test_read_rows_by_entry() {
        let mut client = wrapper_client(true);
        let mut profile = ProfileGeneric::new(ObisCode::new(1, 0, 99, 1, 0, 255));
        let energy = CaptureObject::new(ObjectType::Register, REGISTER, 2);
        assert!(client.read_rows_by_entry(&profile, 1, 10, &[energy]).is_err());

        profile.capture_objects = vec![
            CaptureObject::new(ObjectType::Clock, ObisCode::CLOCK, 2),
            energy,
            CaptureObject::new(ObjectType::Register, ObisCode::new(1, 0, 2, 8, 0, 255), 2),
        ];
        let frames = client.read_rows_by_entry(&profile, 1, 10, &[energy]).unwrap();
        assert_eq!(
            &pdu(&frames)[12..],
            from_hex("01 02 02 04 06 00 00 00 01 06 00 00 00 0A 12 00 02 12 00 02")
                .unwrap()
                .as_slice()
        );

        let frames = client.read_rows_by_entry(&profile, 5, 0, &[]).unwrap();
        assert_eq!(
            &pdu(&frames)[12..],
            from_hex("01 02 02 04 06 00 00 00 05 06 00 00 00 00 12 00 01 12 00 00")
                .unwrap()
                .as_slice()
        );
        let unknown = CaptureObject::new(ObjectType::Data, ObisCode::CLOCK, 2);
        assert!(client.read_rows_by_entry(&profile, 1, 1, &[unknown]).is_err());
    }

    #[test]
    fn test_read_rows_by_range() {
        let mut client = wrapper_client(true);
        let profile = ProfileGeneric::new(ObisCode::new(1, 0, 99, 1, 0, 255));
        let start = CosemDateTime::new(2024, 1, 1, 0, 0, 0, 0, 0).unwrap();
        let end = CosemDateTime::new(2024, 1, 2, 0, 0, 0, 0, 0).unwrap();
        let frames = client.read_rows_by_range(&profile, &start, &end, &[]).unwrap();
        let pdu = pdu(&frames);
        // selector, structure of 4, clock restriction
        assert_eq!(
            &pdu[12..29],
            from_hex("01 01 02 04 02 04 12 00 08 09 06 00 00 01 00 00 FF").unwrap().as_slice()
        );
        assert_eq!(&pdu[pdu.len() - 2..], &[0x01, 0x00]);
    }

    #[test]
    fn test_parse_objects() {
        let mut client = wrapper_client(true);
        let mut server_objects = ObjectCollection::new();
        server_objects.push(Clock::new(ObisCode::CLOCK));
        server_objects.push(ProfileGeneric::new(ObisCode::new(1, 0, 99, 1, 0, 255)));
        let list = Value::Array(
            server_objects
                .descriptors()
                .iter()
                .map(|d| d.to_ln_value(2))
                .collect(),
        );
        let mut response = ByteBuffer::from_slice(&[0xC4, 0x01, 0xC1, 0x00]);
        set_data(&CodecOptions::default(), &mut response, DataType::Array, &list).unwrap();

        let frames = client.get_objects_request().unwrap();
        assert_eq!(&pdu(&frames)[..4], &[0xC0, 0x01, 0xC1, 0x00]);
        let reply = receive(&mut client, response.data());
        let objects = client.parse_objects(&reply).unwrap();
        assert_eq!(objects.len(), 2);
        assert!(objects.find_by_ln(ObjectType::Clock, &ObisCode::CLOCK).is_some());
    }

    #[test]
    fn test_update_value() {
        let mut client = wrapper_client(true);
        let mut clock = Clock::new(ObisCode::CLOCK);
        let time = CosemDateTime::new(2024, 3, 31, 10, 30, 0, 0, 60).unwrap();
        let bytes = time.to_date_time_bytes(false).to_vec();
        client.update_value(&mut clock, 2, Value::OctetString(bytes)).unwrap();
        assert_eq!(
            clock.get_value(client.settings(), 2, None).unwrap(),
            Value::DateTime(time)
        );
    }

    #[test]
    fn test_release_and_disconnect() {
        let mut client = wrapper_client(true);
        client.aarq_request().unwrap();
        let reply = receive(&mut client, &aare(SourceDiagnostic::Null, None));
        client.parse_aare_response(&reply).unwrap();

        let frames = client.disconnect_request().unwrap();
        assert_eq!(pdu(&frames)[0], 0x62);
        assert!(!client.is_connected());
        assert!(client.disconnect_request().unwrap().is_empty());
        assert!(client.keep_alive().unwrap().is_empty());

        let reply = receive(&mut client, &RLREApdu::new().encode());
        assert_eq!(reply.command, Some(Command::ReleaseResponse));
    }

    fn server_link(limits: Limits) -> HdlcLink {
        HdlcLink::new(
            LinkRole::Server,
            HdlcAddress::server(1, 0x11, None).unwrap(),
            HdlcAddress::client(0x10).unwrap(),
            limits,
        )
    }

    #[test]
    fn test_hdlc_link_and_segmented_reply() {
        let mut client = DlmsClient::new(&ClientConfig::default()).unwrap();
        let mut server = server_link(Limits {
            max_info_tx: 32,
            ..Limits::default()
        });

        let snrm = client.snrm_request().unwrap().unwrap();
        server.feed(&snrm);
        let Some(LinkEvent::Snrm(peer)) = server.poll().unwrap() else {
            panic!("SNRM expected");
        };
        let ua = server.accept_snrm(&peer).unwrap();
        let mut reply = ReplyData::new();
        assert!(client.get_data(&ua, &mut reply).unwrap());
        assert_eq!(reply.command, Some(Command::Ua));

        let request = client.read(ObjectType::Data, REGISTER.into(), 2).unwrap();
        assert_eq!(request.len(), 1);
        server.feed(&request[0]);
        assert!(matches!(server.poll().unwrap(), Some(LinkEvent::Pdu(_))));

        let mut response = vec![0xC4, 0x01, 0xC1, 0x00, 0x09, 100];
        response.extend(0..100u8);
        let mut frame = server.send_pdu(&response).unwrap();
        let mut reply = ReplyData::new();
        let mut segments = 1;
        loop {
            assert!(client.get_data(&frame, &mut reply).unwrap());
            if reply.is_complete() {
                break;
            }
            assert_eq!(reply.more_data, MoreData::Frame);
            server.feed(&client.receiver_ready(&reply).unwrap());
            assert_eq!(server.poll().unwrap(), Some(LinkEvent::ReceiverReady));
            frame = server.next_segment().unwrap();
            segments += 1;
        }
        assert!(segments > 3);
        assert_eq!(
            client.get_value(&reply).unwrap(),
            Value::OctetString((0..100u8).collect())
        );

        let disc = client.disconnect_request().unwrap();
        server.feed(&disc[0]);
        assert_eq!(server.poll().unwrap(), Some(LinkEvent::Disconnect));
        let ua = server.disconnect_reply().unwrap();
        reply.clear();
        assert!(client.get_data(&ua, &mut reply).unwrap());
        assert_eq!(reply.command, Some(Command::Ua));
    }

    #[test]
    fn test_hdlc_segmented_request() {
        let config = ClientConfig {
            limits: Limits {
                max_info_tx: 32,
                ..Limits::default()
            },
            ..ClientConfig::default()
        };
        let mut client = DlmsClient::new(&config).unwrap();
        let mut server = server_link(Limits::default());
        server.feed(&client.snrm_request().unwrap().unwrap());
        let Some(LinkEvent::Snrm(peer)) = server.poll().unwrap() else {
            panic!("SNRM expected");
        };
        let mut reply = ReplyData::new();
        client.get_data(&server.accept_snrm(&peer).unwrap(), &mut reply).unwrap();

        let value = Value::OctetString(vec![0x55; 80]);
        let frames = client
            .write(ObjectType::Data, REGISTER.into(), 2, &value, DataType::OctetString)
            .unwrap();
        assert!(frames.len() > 2);
        let mut received = None;
        for frame in &frames {
            server.feed(frame);
            match server.poll().unwrap() {
                Some(LinkEvent::Segment { .. }) => {}
                Some(LinkEvent::Pdu(pdu)) => received = Some(pdu),
                other => panic!("Unexpected {:?}", other),
            }
        }
        let received = received.unwrap();
        assert_eq!(&received[..3], &[0xC1, 0x01, 0xC1]);
        assert_eq!(received.len(), 13 + 2 + 80);
    }
}
