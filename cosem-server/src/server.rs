//! DLMS/COSEM server engine
//!
//! [`DlmsServer`] answers the requests of one connection. It does no I/O:
//! received bytes go into [`DlmsServer::handle_request`] and every frame it
//! returns is written back to the client. [`crate::listener`] does this over
//! TCP.
//!
//! # Association
//!
//! ```text
//! Disconnected --AARQ accepted--------------------------------> Connected
//! Disconnected --AARQ with HLS--> AssociationPending --reply_to_HLS--> Connected
//! any          --RLRQ, DISC or SNRM-------------------------------> Disconnected
//! ```
//!
//! Before the association is connected only the reply_to_HLS method of the
//! association object is served; everything else gets a
//! confirmed-service-error.

use crate::config::ServerConfig;
use crate::transaction::LongTransaction;
use bytes::BytesMut;
use cosem_application::pdu::{ActionRequestType, ExceptionServiceError, StateError};
use cosem_application::{
    get_ln_pdu, AssociationStatus, LnDescriptor, LnParameters, Priority, ServiceClass, Settings,
};
use cosem_asn1::xdlms::initiate;
use cosem_asn1::{
    change_type, get_data, set_data, value_type, AAREApdu, AARQApdu, ApplicationContext,
    AssociateResult, Conformance, ConfirmedServiceError, InitiateRequest, InitiateResponse,
    RLREApdu, RLRQApdu, SourceDiagnostic,
};
use cosem_core::{
    ByteBuffer, Command, DataInfo, DataType, DlmsError, DlmsResult, ErrorCode, InterfaceType,
    MethodAccessMode, ObisCode, ObjectType, Value,
};
use cosem_interface::{AssociationLn, AssociationSn, ObjectCollection, Selection, SnTarget};
use cosem_security::{generate_challenge, Authentication};
use cosem_session::{HdlcAddress, HdlcLink, LinkEvent, LinkRole, Wrapper};

/// Smallest client receive PDU size accepted in an AARQ
pub const MIN_PDU_SIZE: u16 = 64;

#[derive(Debug)]
enum Framing {
    Hdlc(HdlcLink),
    Wrapper { wrapper: Wrapper, input: BytesMut },
}

/// Why an AARQ is refused
struct Rejection {
    diagnostic: SourceDiagnostic,
    /// Initiate error sent as confirmed-service-error in the user information
    initiate_error: Option<u8>,
}

impl Rejection {
    fn diagnostic(diagnostic: SourceDiagnostic) -> Self {
        Self {
            diagnostic,
            initiate_error: None,
        }
    }

    fn initiate(value: u8) -> Self {
        Self {
            diagnostic: SourceDiagnostic::NoReasonGiven,
            initiate_error: Some(value),
        }
    }
}

/// Exception-response PDU
pub(crate) fn exception_response(state: StateError, service: ExceptionServiceError) -> Vec<u8> {
    vec![
        Command::ExceptionResponse.to_u8(),
        state.as_u8(),
        service.as_u8(),
    ]
}

/// Server side of one connection
#[derive(Debug)]
pub struct DlmsServer {
    framing: Framing,
    pub(crate) settings: Settings,
    pub(crate) objects: ObjectCollection,
    /// Block transfer in progress
    pub(crate) transaction: Option<LongTransaction>,
    /// Fixed server challenge instead of a random one
    stoc_challenge: Option<Vec<u8>>,
}

impl DlmsServer {
    /// Server session exposing `objects`. The object lists of association
    /// objects are filled from the collection.
    ///
    /// # Errors
    ///
    /// Addresses that cannot be encoded for the configured interface.
    pub fn new(config: &ServerConfig, mut objects: ObjectCollection) -> DlmsResult<Self> {
        let settings = config.settings()?;
        let framing = match config.interface_type {
            InterfaceType::Hdlc => Framing::Hdlc(HdlcLink::new(
                LinkRole::Server,
                config.hdlc_address()?,
                HdlcAddress::client(0)?,
                config.limits,
            )),
            InterfaceType::Wrapper => Framing::Wrapper {
                wrapper: Wrapper::new(config.logical_address, None),
                input: BytesMut::new(),
            },
        };
        objects.update_object_lists();
        Ok(Self {
            framing,
            settings,
            objects,
            transaction: None,
            stoc_challenge: config.stoc_challenge.clone(),
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut Settings {
        &mut self.settings
    }

    pub fn objects(&self) -> &ObjectCollection {
        &self.objects
    }

    pub fn objects_mut(&mut self) -> &mut ObjectCollection {
        &mut self.objects
    }

    pub fn status(&self) -> AssociationStatus {
        self.settings.status
    }

    pub fn is_connected(&self) -> bool {
        self.settings.is_connected()
    }

    /// A Get, Read or Set block transfer is in progress.
    pub fn has_transaction(&self) -> bool {
        self.transaction.is_some()
    }

    /// Handle received bytes.
    ///
    /// # Returns
    ///
    /// The frames to send back, in order. Empty while a frame is incomplete.
    ///
    /// # Errors
    ///
    /// Corrupt wrapper headers. Corrupt HDLC frames are logged and dropped.
    pub fn handle_request(&mut self, data: &[u8]) -> DlmsResult<Vec<Vec<u8>>> {
        match &mut self.framing {
            Framing::Hdlc(link) => link.feed(data),
            Framing::Wrapper { input, .. } => input.extend_from_slice(data),
        }
        let mut replies = Vec::new();
        while let Some(event) = self.next_event()? {
            if let Some(frame) = self.handle_event(event)? {
                replies.push(frame);
            }
        }
        Ok(replies)
    }

    fn next_event(&mut self) -> DlmsResult<Option<LinkEvent>> {
        match &mut self.framing {
            Framing::Hdlc(link) => loop {
                match link.poll() {
                    Ok(event) => return Ok(event),
                    Err(e) => log::warn!("Dropping HDLC frame: {}", e),
                }
            },
            Framing::Wrapper { wrapper, input } => {
                let pdu = wrapper.unwrap(input)?;
                if let Some(remote) = wrapper.remote() {
                    self.settings.client_address = remote;
                }
                Ok(pdu.map(LinkEvent::Pdu))
            }
        }
    }

    fn handle_event(&mut self, event: LinkEvent) -> DlmsResult<Option<Vec<u8>>> {
        match event {
            LinkEvent::Pdu(pdu) => {
                if let Framing::Hdlc(link) = &mut self.framing {
                    if !link.state().is_connected() {
                        log::warn!("Information frame from {} before SNRM", link.remote());
                        return link.disconnect_reply().map(Some);
                    }
                }
                let response = self.handle_pdu(&pdu);
                self.frame(&response).map(Some)
            }
            LinkEvent::Snrm(limits) => {
                self.reset_association();
                let Framing::Hdlc(link) = &mut self.framing else {
                    return Ok(None);
                };
                let ua = link.accept_snrm(&limits)?;
                self.settings.client_address = link.remote().value() as u16;
                self.settings.limits = *link.limits();
                log::info!("HDLC link from client {} opened", self.settings.client_address);
                Ok(Some(ua))
            }
            LinkEvent::Disconnect => {
                self.reset_association();
                log::info!("HDLC link from client {} closed", self.settings.client_address);
                match &mut self.framing {
                    Framing::Hdlc(link) => link.disconnect_reply().map(Some),
                    Framing::Wrapper { .. } => Ok(None),
                }
            }
            LinkEvent::ReceiverReady => match &mut self.framing {
                Framing::Hdlc(link) => {
                    let segment = link.next_segment();
                    if segment.is_none() {
                        log::debug!("RR without pending segments");
                    }
                    Ok(segment)
                }
                Framing::Wrapper { .. } => Ok(None),
            },
            LinkEvent::Segment { reply } => Ok(Some(reply)),
            LinkEvent::Ua(_) | LinkEvent::DisconnectMode => {
                log::debug!("Ignoring unnumbered response from client");
                Ok(None)
            }
            LinkEvent::FrameReject => {
                log::warn!("Client rejected a frame");
                Ok(None)
            }
        }
    }

    fn frame(&mut self, pdu: &[u8]) -> DlmsResult<Vec<u8>> {
        match &mut self.framing {
            Framing::Hdlc(link) => link.send_pdu(pdu),
            Framing::Wrapper { wrapper, .. } => wrapper.wrap(pdu),
        }
    }

    fn reset_association(&mut self) {
        self.settings.reset();
        self.abort_transaction();
    }

    /// Drop the block transfer in progress, if any.
    pub(crate) fn abort_transaction(&mut self) {
        if let Some(transaction) = self.transaction.take() {
            log::debug!("Discarding unfinished {} transaction", transaction.name());
        }
        self.settings.reset_block_index();
    }

    /// Answer one deframed request PDU.
    ///
    /// Malformed requests are answered with an exception response; the
    /// returned PDU is always sendable.
    pub fn handle_pdu(&mut self, pdu: &[u8]) -> Vec<u8> {
        let Some(command) = pdu.first().copied().and_then(Command::from_u8) else {
            log::warn!("Unknown service {:02X?}", pdu.first());
            return exception_response(
                StateError::ServiceUnknown,
                ExceptionServiceError::ServiceNotSupported,
            );
        };
        match command {
            Command::Aarq => return self.handle_aarq(pdu),
            Command::ReleaseRequest => return self.handle_release(pdu),
            _ => {}
        }
        if !self.settings.is_connected() && !self.is_hls_reply(command, pdu) {
            log::warn!(
                "{:?} from client {} before association",
                command,
                self.settings.client_address
            );
            return ConfirmedServiceError::service_unsupported().encode();
        }
        let mut buff = ByteBuffer::from_slice(&pdu[1..]);
        let result = match command {
            Command::GetRequest => self.handle_get_request(&mut buff),
            Command::SetRequest => self.handle_set_request(&mut buff),
            Command::MethodRequest => self.handle_method_request(&mut buff),
            Command::AccessRequest => self.handle_access_request(&mut buff),
            Command::ReadRequest => self.handle_read_request(&mut buff),
            Command::WriteRequest => self.handle_write_request(&mut buff),
            other => {
                log::warn!("Unsupported service {:?}", other);
                return exception_response(
                    StateError::ServiceUnknown,
                    ExceptionServiceError::ServiceNotSupported,
                );
            }
        };
        result.unwrap_or_else(|e| {
            log::warn!("Invalid {:?}: {}", command, e);
            self.abort_transaction();
            exception_response(
                StateError::ServiceNotAllowed,
                ExceptionServiceError::OperationNotPossible,
            )
        })
    }

    /// The PDU is the reply_to_HLS call of a pending association.
    fn is_hls_reply(&self, command: Command, pdu: &[u8]) -> bool {
        if self.settings.status != AssociationStatus::AssociationPending {
            return false;
        }
        match command {
            Command::MethodRequest => {
                let mut buff = ByteBuffer::from_slice(pdu.get(3..).unwrap_or_default());
                pdu.get(1) == Some(&ActionRequestType::Normal.as_u8())
                    && LnDescriptor::read(&mut buff).is_ok_and(|descriptor| {
                        descriptor.object_type == ObjectType::AssociationLogicalName
                            && descriptor.index == AssociationLn::METHOD_REPLY_TO_HLS
                    })
            }
            Command::ReadRequest => {
                // single item: count, access, short name
                if pdu.len() < 5 || pdu[1] != 1 {
                    return false;
                }
                let sn = u16::from_be_bytes([pdu[3], pdu[4]]);
                match self.objects.resolve_sn(sn) {
                    Some((position, SnTarget::Method(AssociationSn::METHOD_REPLY_TO_HLS))) => self
                        .objects
                        .get(position)
                        .is_some_and(|o| o.object_type() == ObjectType::AssociationShortName),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    fn handle_aarq(&mut self, pdu: &[u8]) -> Vec<u8> {
        self.reset_association();
        let context = ApplicationContext::for_referencing(self.settings.use_logical_name_referencing);
        let mut aare = AAREApdu::new(context, AssociateResult::Accepted, SourceDiagnostic::Null);
        let outcome = match AARQApdu::decode(pdu) {
            Ok(aarq) => self.accept_aarq(&aarq, &mut aare),
            Err(e) => {
                log::warn!("Invalid AARQ: {}", e);
                Err(Rejection::diagnostic(SourceDiagnostic::NoReasonGiven))
            }
        };
        if let Err(rejection) = outcome {
            log::warn!(
                "Association of client {} rejected: {}",
                self.settings.client_address,
                rejection.diagnostic
            );
            self.settings.reset();
            aare.result = AssociateResult::RejectedPermanent;
            aare.diagnostic = rejection.diagnostic;
            aare.responder_acse_requirements = false;
            aare.responding_authentication_value = None;
            aare.user_information = rejection
                .initiate_error
                .map(|value| ConfirmedServiceError::initiate(value).encode());
        }
        aare.encode()
    }

    fn accept_aarq(&mut self, aarq: &AARQApdu, aare: &mut AAREApdu) -> Result<(), Rejection> {
        if aarq.application_context != aare.application_context {
            return Err(Rejection::diagnostic(
                SourceDiagnostic::ApplicationContextNameNotSupported,
            ));
        }
        let mechanism = self.settings.authentication;
        match aarq.mechanism_id {
            Some(id) if id == mechanism.id() => {}
            None if mechanism == Authentication::None => {}
            None => {
                return Err(Rejection::diagnostic(
                    SourceDiagnostic::AuthenticationMechanismNameRequired,
                ))
            }
            Some(_) => {
                return Err(Rejection::diagnostic(
                    SourceDiagnostic::AuthenticationMechanismNameNotRecognised,
                ))
            }
        }

        let information = aarq
            .user_information
            .as_deref()
            .ok_or_else(|| Rejection::diagnostic(SourceDiagnostic::NoReasonGiven))?;
        let initiate = InitiateRequest::decode(information).map_err(|e| {
            log::warn!("Invalid InitiateRequest: {}", e);
            Rejection::diagnostic(SourceDiagnostic::NoReasonGiven)
        })?;
        if initiate.proposed_dlms_version < self.settings.dlms_version {
            return Err(Rejection::initiate(initiate::DLMS_VERSION_TOO_LOW));
        }
        let conformance = initiate.proposed_conformance & self.settings.proposed_conformance;
        if conformance == Conformance::NONE {
            return Err(Rejection::initiate(initiate::INCOMPATIBLE_CONFORMANCE));
        }
        let client_pdu_size = initiate.client_max_receive_pdu_size;
        if client_pdu_size != 0 && client_pdu_size < MIN_PDU_SIZE {
            return Err(Rejection::initiate(initiate::PDU_SIZE_TOO_SHORT));
        }

        match mechanism {
            Authentication::None => self.settings.set_status(AssociationStatus::Connected),
            Authentication::Low => {
                if aarq.calling_authentication_value.as_deref() != Some(&self.settings.password[..]) {
                    return Err(Rejection::diagnostic(SourceDiagnostic::AuthenticationFailure));
                }
                aare.mechanism_id = Some(mechanism.id());
                self.settings.set_status(AssociationStatus::Connected);
            }
            _ => {
                let challenge = aarq
                    .calling_authentication_value
                    .clone()
                    .filter(|challenge| !challenge.is_empty())
                    .ok_or_else(|| Rejection::diagnostic(SourceDiagnostic::AuthenticationFailure))?;
                if mechanism == Authentication::HighGmac {
                    let title = aarq.calling_ap_title.as_deref().unwrap_or_default();
                    self.settings
                        .cipher
                        .set_source_system_title(title)
                        .map_err(|e| {
                            log::warn!("Invalid client system title: {}", e);
                            Rejection::diagnostic(SourceDiagnostic::AuthenticationFailure)
                        })?;
                    aare.responding_ap_title = Some(self.settings.cipher.system_title().to_vec());
                }
                let stoc = self.stoc_challenge.clone().unwrap_or_else(generate_challenge);
                self.settings.ctos_challenge = Some(challenge);
                self.settings.stoc_challenge = Some(stoc.clone());
                aare.diagnostic = SourceDiagnostic::AuthenticationRequired;
                aare.responder_acse_requirements = true;
                aare.mechanism_id = Some(mechanism.id());
                aare.responding_authentication_value = Some(stoc);
                self.settings.set_status(AssociationStatus::AssociationPending);
            }
        }

        self.settings.negotiated_conformance = conformance;
        self.settings.max_pdu_size = match client_pdu_size {
            0 => self.settings.max_server_pdu_size,
            size => size.min(self.settings.max_server_pdu_size),
        };
        let mut response = InitiateResponse::new(
            conformance,
            self.settings.max_server_pdu_size,
            self.settings.use_logical_name_referencing,
        );
        response.negotiated_dlms_version = self.settings.dlms_version;
        aare.user_information = Some(response.encode());
        log::info!(
            "Client {} associated with {}, PDU size {}, {:?}",
            self.settings.client_address,
            mechanism,
            self.settings.max_pdu_size,
            conformance
        );
        Ok(())
    }

    fn handle_release(&mut self, pdu: &[u8]) -> Vec<u8> {
        if let Err(e) = RLRQApdu::decode(pdu) {
            log::debug!("Release request not decoded: {}", e);
        }
        log::info!("Association of client {} released", self.settings.client_address);
        self.reset_association();
        RLREApdu::new().encode()
    }

    /// Take invoke id, priority and service class from a request so that
    /// the response echoes them.
    pub(crate) fn update_invoke_id(&mut self, value: u8) {
        self.settings.invoke_id = value & 0x0F;
        self.settings.priority = if value & 0x80 != 0 {
            Priority::High
        } else {
            Priority::Normal
        };
        self.settings.service_class = if value & 0x40 != 0 {
            ServiceClass::Confirmed
        } else {
            ServiceClass::Unconfirmed
        };
    }

    /// Position of an LN object. The current association name addresses
    /// the first association object.
    pub(crate) fn position_by_ln(&self, descriptor: &LnDescriptor) -> Option<usize> {
        let position = |ln: Option<&ObisCode>| {
            self.objects.iter().position(|o| {
                o.object_type() == descriptor.object_type
                    && ln.is_none_or(|ln| o.logical_name() == *ln)
            })
        };
        position(Some(&descriptor.logical_name)).or_else(|| {
            if descriptor.object_type == ObjectType::AssociationLogicalName
                && descriptor.logical_name == ObisCode::CURRENT_ASSOCIATION
            {
                position(None)
            } else {
                None
            }
        })
    }

    /// Decode one value of a request.
    pub(crate) fn read_value(&self, buff: &mut ByteBuffer) -> DlmsResult<Value> {
        let mut info = DataInfo::new();
        get_data(&self.settings.codec, buff, &mut info)?
            .ok_or_else(|| DlmsError::InvalidData("Request value is incomplete".to_string()))
    }

    /// Access selection flag and, when set, selector and parameters.
    pub(crate) fn read_selection(&self, buff: &mut ByteBuffer) -> DlmsResult<Option<Selection>> {
        if buff.get_u8()? == 0 {
            return Ok(None);
        }
        let selector = buff.get_u8()?;
        let parameters = self.read_value(buff)?;
        Ok(Some(Selection {
            selector,
            parameters,
        }))
    }

    /// A-XDR encoding of a value produced by an object.
    pub(crate) fn encode_value(&self, value: &Value, data_type: DataType) -> Result<ByteBuffer, ErrorCode> {
        let data_type = match data_type {
            DataType::None => value_type(value),
            data_type => data_type,
        };
        let mut buff = ByteBuffer::new();
        set_data(&self.settings.codec, &mut buff, data_type, value).map_err(|e| {
            log::warn!("Cannot encode {} as {}: {}", value.data_type(), data_type, e);
            ErrorCode::HardwareFault
        })?;
        Ok(buff)
    }

    /// Encoded value of attribute `index` of the object at `position`.
    pub(crate) fn read_attribute(
        &mut self,
        position: usize,
        index: u8,
        selection: Option<&Selection>,
    ) -> Result<ByteBuffer, ErrorCode> {
        let object = self
            .objects
            .get_mut(position)
            .ok_or(ErrorCode::UndefinedObject)?;
        if !object.access(index).can_read() {
            log::debug!("{} {}:{} is not readable", object.object_type(), object.logical_name(), index);
            return Err(ErrorCode::ReadWriteDenied);
        }
        let data_type = object.data_type(index);
        let value = object
            .get_value(&self.settings, index, selection)
            .map_err(|e| {
                log::warn!("Reading {} {}:{} failed: {}", object.object_type(), object.logical_name(), index, e);
                e.error_code()
            })?;
        self.encode_value(&value, data_type)
    }

    /// Write attribute `index` of the object at `position`.
    pub(crate) fn write_attribute(&mut self, position: usize, index: u8, value: Value) -> ErrorCode {
        let Some(object) = self.objects.get_mut(position) else {
            return ErrorCode::UndefinedObject;
        };
        if !object.access(index).can_write() {
            log::debug!("{} {}:{} is not writable", object.object_type(), object.logical_name(), index);
            return ErrorCode::ReadWriteDenied;
        }
        let value = match (&value, object.data_type(index)) {
            (Value::OctetString(bytes), data_type)
                if !matches!(
                    data_type,
                    DataType::None | DataType::OctetString | DataType::Array | DataType::Structure
                ) =>
            {
                match change_type(&self.settings.codec, bytes, data_type) {
                    Ok(value) => value,
                    Err(e) => {
                        log::warn!("Cannot convert octet string to {}: {}", data_type, e);
                        return ErrorCode::UnmatchedType;
                    }
                }
            }
            _ => value,
        };
        match object.set_value(&mut self.settings, index, value) {
            Ok(()) => ErrorCode::Ok,
            Err(e) => {
                log::warn!("Writing {} {}:{} failed: {}", object.object_type(), object.logical_name(), index, e);
                e.error_code()
            }
        }
    }

    /// Run method `index` of the object at `position`.
    pub(crate) fn invoke_method(
        &mut self,
        position: usize,
        index: u8,
        parameters: &Value,
    ) -> Result<Option<Value>, ErrorCode> {
        let object = self
            .objects
            .get_mut(position)
            .ok_or(ErrorCode::UndefinedObject)?;
        if object.method_access(index) == MethodAccessMode::NoAccess {
            log::debug!("{} {} method {} is not accessible", object.object_type(), object.logical_name(), index);
            return Err(ErrorCode::ReadWriteDenied);
        }
        object.invoke(&mut self.settings, index, parameters).map_err(|e| {
            log::warn!("{} {} method {} failed: {}", object.object_type(), object.logical_name(), index, e);
            e.error_code()
        })
    }

    /// Single LN response PDU that is never split into blocks.
    pub(crate) fn ln_response(
        &mut self,
        command: Command,
        response_type: u8,
        status: u8,
        data: Option<ByteBuffer>,
    ) -> DlmsResult<Vec<u8>> {
        let mut p = LnParameters::new(&self.settings, command, response_type, None, data, status);
        let mut reply = ByteBuffer::new();
        get_ln_pdu(&mut self.settings, &mut p, &mut reply)?;
        Ok(reply.into_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{associate, client_config, exchange, ln_objects, server_config};
    use cosem_application::ObjectName;
    use cosem_client::DlmsClient;
    use cosem_core::ObisCode;

    fn pair(
        interface_type: InterfaceType,
        authentication: Authentication,
        server_secret: &[u8],
        client_secret: &[u8],
    ) -> (DlmsClient, DlmsServer) {
        let mut config = server_config(interface_type, true);
        config.authentication = authentication;
        config.password = server_secret.to_vec();
        let server = DlmsServer::new(&config, ln_objects()).unwrap();
        let mut client_config = client_config(interface_type, true);
        client_config.authentication = authentication;
        client_config.password = client_secret.to_vec();
        (DlmsClient::new(&client_config).unwrap(), server)
    }

    #[test]
    fn test_associate_without_authentication() {
        for interface_type in [InterfaceType::Hdlc, InterfaceType::Wrapper] {
            let (mut client, mut server) = pair(interface_type, Authentication::None, b"", b"");
            associate(&mut client, &mut server).unwrap();
            assert!(server.is_connected());
            assert!(client.is_connected());
            assert_eq!(server.settings().client_address, 0x10);
            assert_eq!(server.settings().negotiated_conformance, Conformance::DEFAULT_LN);
        }
    }

    #[test]
    fn test_low_level_password() {
        let (mut client, mut server) =
            pair(InterfaceType::Wrapper, Authentication::Low, b"12345678", b"12345678");
        associate(&mut client, &mut server).unwrap();
        assert!(server.is_connected());

        let (mut client, mut server) =
            pair(InterfaceType::Wrapper, Authentication::Low, b"12345678", b"00000000");
        let err = associate(&mut client, &mut server).unwrap_err();
        assert!(matches!(err, DlmsError::Rejected(_)));
        assert_eq!(server.status(), AssociationStatus::Disconnected);
    }

    #[test]
    fn test_high_level_handshake() {
        for mechanism in [
            Authentication::High,
            Authentication::HighMd5,
            Authentication::HighSha1,
            Authentication::HighSha256,
        ] {
            let (mut client, mut server) =
                pair(InterfaceType::Hdlc, mechanism, b"0123456789ABCDEF", b"0123456789ABCDEF");
            associate(&mut client, &mut server).unwrap();
            assert!(server.is_connected(), "{}", mechanism);
            assert!(client.is_connected(), "{}", mechanism);
        }
    }

    #[test]
    fn test_high_level_wrong_secret() {
        let (mut client, mut server) = pair(
            InterfaceType::Wrapper,
            Authentication::HighMd5,
            b"0123456789ABCDEF",
            b"FEDCBA9876543210",
        );
        let err = associate(&mut client, &mut server).unwrap_err();
        assert!(matches!(err, DlmsError::Security(_)));
        assert_eq!(server.status(), AssociationStatus::Disconnected);
        assert!(!client.is_connected());

        // nothing but a new AARQ is served now
        let frames = client
            .read(ObjectType::Clock, ObjectName::Logical(ObisCode::CLOCK), 2)
            .unwrap();
        assert!(exchange(&mut client, &mut server, frames).is_err());
    }

    fn gmac_pair(client_title: &[u8]) -> (DlmsClient, DlmsServer) {
        let keys = |title: &[u8]| {
            cosem_security::CipherContext::new(title, &[0x11; 16], &[0x22; 16]).unwrap()
        };
        let mut config = server_config(InterfaceType::Wrapper, true);
        config.authentication = Authentication::HighGmac;
        config.cipher = keys(b"SERVER01");
        let server = DlmsServer::new(&config, ln_objects()).unwrap();
        let mut client_config = client_config(InterfaceType::Wrapper, true);
        client_config.authentication = Authentication::HighGmac;
        client_config.cipher = keys(client_title);
        (DlmsClient::new(&client_config).unwrap(), server)
    }

    #[test]
    fn test_gmac_handshake() {
        let (mut client, mut server) = gmac_pair(b"CLIENT01");
        client.settings_mut().cipher.set_invocation_counter(100);
        associate(&mut client, &mut server).unwrap();
        assert!(server.is_connected());
        assert!(client.is_connected());
        assert_eq!(server.settings().cipher.source_system_title(), Some(&b"CLIENT01"[..]));
        assert_eq!(server.settings().cipher.last_peer_counter(), Some(100));
        assert_eq!(client.settings().cipher.last_peer_counter(), Some(0));
    }

    #[test]
    fn test_gmac_proof_replayed_in_same_association() {
        let (mut client, mut server) = gmac_pair(b"CLIENT01");
        let frames = client.aarq_request().unwrap();
        let reply = exchange(&mut client, &mut server, frames).unwrap();
        client.parse_aare_response(&reply).unwrap();
        let proof = client.application_association_request().unwrap();
        let reply = exchange(&mut client, &mut server, proof.clone()).unwrap();
        client.parse_application_association_response(&reply).unwrap();
        assert!(server.is_connected());

        for frame in &proof {
            server.handle_request(frame).unwrap();
        }
        assert!(!server.is_connected());
        assert_eq!(server.settings().cipher.last_peer_counter(), Some(0));
    }

    #[test]
    fn test_gmac_counter_cannot_go_back_on_new_association() {
        let (mut client, mut server) = gmac_pair(b"CLIENT01");
        client.settings_mut().cipher.set_invocation_counter(100);
        associate(&mut client, &mut server).unwrap();
        let frames = client.release_request().unwrap();
        exchange(&mut client, &mut server, frames).unwrap();
        assert!(!server.is_connected());

        // same counter again
        client.settings_mut().cipher.set_invocation_counter(100);
        assert!(associate(&mut client, &mut server).is_err());
        assert!(!server.is_connected());

        client.settings_mut().cipher.set_invocation_counter(5);
        assert!(associate(&mut client, &mut server).is_err());
        assert!(!server.is_connected());

        client.settings_mut().cipher.set_invocation_counter(101);
        associate(&mut client, &mut server).unwrap();
        assert!(server.is_connected());
        assert_eq!(server.settings().cipher.last_peer_counter(), Some(101));
    }

    #[test]
    fn test_gmac_counters_are_kept_per_client() {
        let (mut first, mut server) = gmac_pair(b"CLIENT01");
        first.settings_mut().cipher.set_invocation_counter(50);
        associate(&mut first, &mut server).unwrap();
        let frames = first.release_request().unwrap();
        exchange(&mut first, &mut server, frames).unwrap();

        // another meter reader starts low without affecting the first one
        let (mut second, _) = gmac_pair(b"CLIENT02");
        second.settings_mut().cipher.set_invocation_counter(1);
        associate(&mut second, &mut server).unwrap();
        assert!(server.is_connected());
        let frames = second.release_request().unwrap();
        exchange(&mut second, &mut server, frames).unwrap();

        first.settings_mut().cipher.set_invocation_counter(2);
        assert!(associate(&mut first, &mut server).is_err());

        // new keys start every client over
        server
            .settings_mut()
            .cipher
            .set_keys(&[0x33; 16], &[0x44; 16])
            .unwrap();
        first.settings_mut().cipher.set_keys(&[0x33; 16], &[0x44; 16]).unwrap();
        first.settings_mut().cipher.set_invocation_counter(2);
        associate(&mut first, &mut server).unwrap();
        assert!(server.is_connected());
    }

    #[test]
    fn test_mechanism_mismatch() {
        let (mut client, mut server) =
            pair(InterfaceType::Wrapper, Authentication::HighSha1, b"secret00", b"");
        client.settings_mut().authentication = Authentication::None;
        let err = associate(&mut client, &mut server).unwrap_err();
        assert!(matches!(err, DlmsError::Rejected(_)));

        let mut aarq = AARQApdu::new(ApplicationContext::LogicalName);
        aarq.mechanism_id = Some(Authentication::HighMd5.id());
        aarq.user_information = Some(InitiateRequest::new(Conformance::DEFAULT_LN, 0x400).encode());
        let aare = AAREApdu::decode(&server.handle_pdu(&aarq.encode())).unwrap();
        assert_eq!(aare.result, AssociateResult::RejectedPermanent);
        assert_eq!(
            aare.diagnostic,
            SourceDiagnostic::AuthenticationMechanismNameNotRecognised
        );
    }

    #[test]
    fn test_aarq_rejections() {
        let mut server =
            DlmsServer::new(&server_config(InterfaceType::Wrapper, true), ln_objects()).unwrap();

        let aarq = AARQApdu::new(ApplicationContext::ShortName);
        let aare = AAREApdu::decode(&server.handle_pdu(&aarq.encode())).unwrap();
        assert_eq!(aare.diagnostic, SourceDiagnostic::ApplicationContextNameNotSupported);

        let mut initiate = InitiateRequest::new(Conformance::DEFAULT_LN, 0x400);
        initiate.proposed_dlms_version = 5;
        let mut aarq = AARQApdu::new(ApplicationContext::LogicalName);
        aarq.user_information = Some(initiate.encode());
        let aare = AAREApdu::decode(&server.handle_pdu(&aarq.encode())).unwrap();
        assert_eq!(aare.result, AssociateResult::RejectedPermanent);
        assert_eq!(
            aare.user_information,
            Some(ConfirmedServiceError::initiate(initiate::DLMS_VERSION_TOO_LOW).encode())
        );

        aarq.user_information = Some(InitiateRequest::new(Conformance::READ, 0x400).encode());
        let aare = AAREApdu::decode(&server.handle_pdu(&aarq.encode())).unwrap();
        assert_eq!(
            aare.user_information,
            Some(ConfirmedServiceError::initiate(initiate::INCOMPATIBLE_CONFORMANCE).encode())
        );
        assert!(!server.is_connected());
    }

    #[test]
    fn test_pdu_size_is_the_smaller_one() {
        let mut server =
            DlmsServer::new(&server_config(InterfaceType::Wrapper, true), ln_objects()).unwrap();
        let mut aarq = AARQApdu::new(ApplicationContext::LogicalName);
        aarq.user_information = Some(InitiateRequest::new(Conformance::DEFAULT_LN, 200).encode());
        let aare = AAREApdu::decode(&server.handle_pdu(&aarq.encode())).unwrap();
        assert_eq!(aare.result, AssociateResult::Accepted);
        assert_eq!(server.settings().max_pdu_size, 200);
        let response = InitiateResponse::decode(&aare.user_information.unwrap()).unwrap();
        assert_eq!(response.server_max_receive_pdu_size, 1024);
        assert_eq!(response.negotiated_conformance, Conformance::DEFAULT_LN);
    }

    #[test]
    fn test_requests_before_association() {
        let mut server =
            DlmsServer::new(&server_config(InterfaceType::Wrapper, true), ln_objects()).unwrap();
        let get = [0xC0, 0x01, 0xC1, 0x00, 0x08, 0, 0, 1, 0, 0, 255, 0x02, 0x00];
        assert_eq!(
            server.handle_pdu(&get),
            ConfirmedServiceError::service_unsupported().encode()
        );
    }

    #[test]
    fn test_unknown_and_malformed_requests() {
        let (mut client, mut server) = pair(InterfaceType::Wrapper, Authentication::None, b"", b"");
        associate(&mut client, &mut server).unwrap();
        assert_eq!(server.handle_pdu(&[0x42, 0x00]), vec![0xD8, 0x02, 0x02]);
        assert_eq!(server.handle_pdu(&[0xC0, 0x01, 0xC1, 0x00]), vec![0xD8, 0x01, 0x01]);
        assert!(server.is_connected());
    }

    #[test]
    fn test_release() {
        let (mut client, mut server) = pair(InterfaceType::Wrapper, Authentication::None, b"", b"");
        associate(&mut client, &mut server).unwrap();
        let frames = client.release_request().unwrap();
        exchange(&mut client, &mut server, frames).unwrap();
        assert!(!server.is_connected());
        assert!(!client.is_connected());
    }

    #[test]
    fn test_hdlc_disconnect() {
        let (mut client, mut server) = pair(InterfaceType::Hdlc, Authentication::None, b"", b"");
        associate(&mut client, &mut server).unwrap();
        let frames = client.disconnect_request().unwrap();
        exchange(&mut client, &mut server, frames).unwrap();
        assert!(!server.is_connected());
    }

    #[test]
    fn test_update_invoke_id() {
        let mut server =
            DlmsServer::new(&server_config(InterfaceType::Wrapper, true), ln_objects()).unwrap();
        server.update_invoke_id(0x47);
        assert_eq!(server.settings().invoke_id, 7);
        assert_eq!(server.settings().priority, Priority::Normal);
        assert_eq!(server.settings().service_class, ServiceClass::Confirmed);
        assert_eq!(server.settings().invoke_id_and_priority(), 0x47);
    }
}
