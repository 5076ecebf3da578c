//! xDLMS Initiate PDUs, conformance block and confirmed service errors
//!
//! These travel inside the user-information field of AARQ/AARE and are
//! A-XDR encoded.

use cosem_core::{ByteBuffer, DlmsError, DlmsResult};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// InitiateRequest tag
pub const INITIATE_REQUEST_TAG: u8 = 0x01;
/// InitiateResponse tag
pub const INITIATE_RESPONSE_TAG: u8 = 0x08;
/// Confirmed service error tag
pub const CONFIRMED_SERVICE_ERROR_TAG: u8 = 0x0E;
/// `[APPLICATION 31] IMPLICIT BIT STRING (SIZE(24))` header
const CONFORMANCE_HEADER: [u8; 4] = [0x5F, 0x1F, 0x04, 0x00];

pub const DLMS_VERSION: u8 = 6;
/// VAA name for logical name referencing
pub const VAA_NAME_LN: u16 = 0x0007;
/// VAA name (base short name) for short name referencing
pub const VAA_NAME_SN: u16 = 0xFA00;

/// Conformance block
///
/// Bit `n` of the value is bit `n` of the 24 bit wire string, so
/// `RESERVED_ZERO` is the most significant bit of the first byte.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Conformance(u32);

impl Conformance {
    pub const NONE: Self = Self(0);
    pub const RESERVED_ZERO: Self = Self(0x1);
    pub const GENERAL_PROTECTION: Self = Self(0x2);
    pub const GENERAL_BLOCK_TRANSFER: Self = Self(0x4);
    pub const READ: Self = Self(0x8);
    pub const WRITE: Self = Self(0x10);
    pub const UNCONFIRMED_WRITE: Self = Self(0x20);
    pub const ATTRIBUTE_0_SUPPORTED_WITH_SET: Self = Self(0x100);
    pub const PRIORITY_MGMT_SUPPORTED: Self = Self(0x200);
    pub const ATTRIBUTE_0_SUPPORTED_WITH_GET: Self = Self(0x400);
    pub const BLOCK_TRANSFER_WITH_GET_OR_READ: Self = Self(0x800);
    pub const BLOCK_TRANSFER_WITH_SET_OR_WRITE: Self = Self(0x1000);
    pub const BLOCK_TRANSFER_WITH_ACTION: Self = Self(0x2000);
    pub const MULTIPLE_REFERENCES: Self = Self(0x4000);
    pub const INFORMATION_REPORT: Self = Self(0x8000);
    pub const DATA_NOTIFICATION: Self = Self(0x10000);
    pub const ACCESS: Self = Self(0x20000);
    pub const PARAMETERIZED_ACCESS: Self = Self(0x40000);
    pub const GET: Self = Self(0x80000);
    pub const SET: Self = Self(0x100000);
    pub const SELECTIVE_ACCESS: Self = Self(0x200000);
    pub const EVENT_NOTIFICATION: Self = Self(0x400000);
    pub const ACTION: Self = Self(0x800000);

    /// Services a logical name client proposes by default (`00 7E 1F`)
    pub const DEFAULT_LN: Self = Self(
        Self::PRIORITY_MGMT_SUPPORTED.0
            | Self::ATTRIBUTE_0_SUPPORTED_WITH_GET.0
            | Self::BLOCK_TRANSFER_WITH_GET_OR_READ.0
            | Self::BLOCK_TRANSFER_WITH_SET_OR_WRITE.0
            | Self::BLOCK_TRANSFER_WITH_ACTION.0
            | Self::MULTIPLE_REFERENCES.0
            | Self::GET.0
            | Self::SET.0
            | Self::SELECTIVE_ACCESS.0
            | Self::EVENT_NOTIFICATION.0
            | Self::ACTION.0,
    );

    /// Services a short name client proposes by default (`1C 03 20`)
    pub const DEFAULT_SN: Self = Self(
        Self::READ.0
            | Self::WRITE.0
            | Self::UNCONFIRMED_WRITE.0
            | Self::INFORMATION_REPORT.0
            | Self::MULTIPLE_REFERENCES.0
            | Self::PARAMETERIZED_ACCESS.0,
    );

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & 0x00FF_FFFF)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Wire form of the 24 bit string.
    pub fn to_wire(self) -> [u8; 3] {
        let mut out = [0u8; 3];
        for bit in 0..24 {
            if self.0 & (1 << bit) != 0 {
                out[bit / 8] |= 0x80 >> (bit % 8);
            }
        }
        out
    }

    pub fn from_wire(bytes: [u8; 3]) -> Self {
        let mut value = 0u32;
        for bit in 0..24 {
            if bytes[bit / 8] & (0x80 >> (bit % 8)) != 0 {
                value |= 1 << bit;
            }
        }
        Self(value)
    }
}

impl BitOr for Conformance {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for Conformance {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for Conformance {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for Conformance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Conformance(0x{:06X})", self.0)
    }
}

fn write_conformance(buff: &mut ByteBuffer, conformance: Conformance) {
    buff.set_slice(&CONFORMANCE_HEADER);
    buff.set_slice(&conformance.to_wire());
}

fn read_conformance(buff: &mut ByteBuffer) -> DlmsResult<Conformance> {
    let header = buff.get_slice(CONFORMANCE_HEADER.len())?;
    if header[..2] != CONFORMANCE_HEADER[..2] {
        return Err(DlmsError::InvalidData(format!(
            "Invalid conformance tag {:02X}{:02X}",
            header[0], header[1]
        )));
    }
    let mut bytes = [0u8; 3];
    buff.get(&mut bytes)?;
    Ok(Conformance::from_wire(bytes))
}

fn read_tag(buff: &mut ByteBuffer, expected: u8, name: &str) -> DlmsResult<()> {
    let tag = buff.get_u8()?;
    if tag != expected {
        return Err(DlmsError::Protocol(format!(
            "Expected {} ({:02X}), found {:02X}",
            name, expected, tag
        )));
    }
    Ok(())
}

/// Client proposal carried in the AARQ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateRequest {
    pub dedicated_key: Option<Vec<u8>>,
    pub response_allowed: bool,
    pub proposed_quality_of_service: Option<i8>,
    pub proposed_dlms_version: u8,
    pub proposed_conformance: Conformance,
    pub client_max_receive_pdu_size: u16,
}

impl InitiateRequest {
    pub fn new(conformance: Conformance, max_pdu_size: u16) -> Self {
        Self {
            dedicated_key: None,
            response_allowed: true,
            proposed_quality_of_service: None,
            proposed_dlms_version: DLMS_VERSION,
            proposed_conformance: conformance,
            client_max_receive_pdu_size: max_pdu_size,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buff = ByteBuffer::with_capacity(16);
        buff.set_u8(INITIATE_REQUEST_TAG);
        match &self.dedicated_key {
            Some(key) => {
                buff.set_u8(1);
                buff.set_u8(key.len() as u8);
                buff.set_slice(key);
            }
            None => buff.set_u8(0),
        }
        // response-allowed is encoded as absent when it has its default TRUE
        if self.response_allowed {
            buff.set_u8(0);
        } else {
            buff.set_u8(1);
            buff.set_u8(0);
        }
        match self.proposed_quality_of_service {
            Some(qos) => {
                buff.set_u8(1);
                buff.set_i8(qos);
            }
            None => buff.set_u8(0),
        }
        buff.set_u8(self.proposed_dlms_version);
        write_conformance(&mut buff, self.proposed_conformance);
        buff.set_u16(self.client_max_receive_pdu_size);
        buff.into_vec()
    }

    /// Decode an InitiateRequest.
    ///
    /// # Errors
    ///
    /// Truncated input and a wrong leading tag are errors.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buff = ByteBuffer::from_slice(data);
        read_tag(&mut buff, INITIATE_REQUEST_TAG, "InitiateRequest")?;
        let dedicated_key = if buff.get_u8()? != 0 {
            let len = buff.get_u8()? as usize;
            Some(buff.get_slice(len)?)
        } else {
            None
        };
        let response_allowed = if buff.get_u8()? != 0 {
            buff.get_u8()? != 0
        } else {
            true
        };
        let proposed_quality_of_service = if buff.get_u8()? != 0 {
            Some(buff.get_i8()?)
        } else {
            None
        };
        let proposed_dlms_version = buff.get_u8()?;
        let proposed_conformance = read_conformance(&mut buff)?;
        let client_max_receive_pdu_size = buff.get_u16()?;
        Ok(Self {
            dedicated_key,
            response_allowed,
            proposed_quality_of_service,
            proposed_dlms_version,
            proposed_conformance,
            client_max_receive_pdu_size,
        })
    }
}

/// Server answer carried in the AARE
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateResponse {
    pub negotiated_quality_of_service: Option<i8>,
    pub negotiated_dlms_version: u8,
    pub negotiated_conformance: Conformance,
    pub server_max_receive_pdu_size: u16,
    pub vaa_name: u16,
}

impl InitiateResponse {
    pub fn new(conformance: Conformance, max_pdu_size: u16, logical_name: bool) -> Self {
        Self {
            negotiated_quality_of_service: None,
            negotiated_dlms_version: DLMS_VERSION,
            negotiated_conformance: conformance,
            server_max_receive_pdu_size: max_pdu_size,
            vaa_name: if logical_name { VAA_NAME_LN } else { VAA_NAME_SN },
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut buff = ByteBuffer::with_capacity(16);
        buff.set_u8(INITIATE_RESPONSE_TAG);
        match self.negotiated_quality_of_service {
            Some(qos) => {
                buff.set_u8(1);
                buff.set_i8(qos);
            }
            None => buff.set_u8(0),
        }
        buff.set_u8(self.negotiated_dlms_version);
        write_conformance(&mut buff, self.negotiated_conformance);
        buff.set_u16(self.server_max_receive_pdu_size);
        buff.set_u16(self.vaa_name);
        buff.into_vec()
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buff = ByteBuffer::from_slice(data);
        read_tag(&mut buff, INITIATE_RESPONSE_TAG, "InitiateResponse")?;
        let negotiated_quality_of_service = if buff.get_u8()? != 0 {
            Some(buff.get_i8()?)
        } else {
            None
        };
        Ok(Self {
            negotiated_quality_of_service,
            negotiated_dlms_version: buff.get_u8()?,
            negotiated_conformance: read_conformance(&mut buff)?,
            server_max_receive_pdu_size: buff.get_u16()?,
            vaa_name: buff.get_u16()?,
        })
    }
}

/// Service that failed, first byte after the confirmed-service-error tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfirmedServiceKind {
    InitiateError = 1,
    GetStatus = 2,
    GetNameList = 3,
    GetVariableAttribute = 4,
    Read = 5,
    Write = 6,
    GetDataSetAttribute = 7,
    GetTiAttribute = 8,
    ChangeScope = 9,
    Start = 10,
    Stop = 11,
    Resume = 12,
    MakeUsable = 13,
    InitiateLoad = 14,
    LoadSegment = 15,
    TerminateLoad = 16,
    InitiateUpLoad = 17,
    UpLoadSegment = 18,
    TerminateUpLoad = 19,
}

impl ConfirmedServiceKind {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        use ConfirmedServiceKind::*;
        let kind = match value {
            1 => InitiateError,
            2 => GetStatus,
            3 => GetNameList,
            4 => GetVariableAttribute,
            5 => Read,
            6 => Write,
            7 => GetDataSetAttribute,
            8 => GetTiAttribute,
            9 => ChangeScope,
            10 => Start,
            11 => Stop,
            12 => Resume,
            13 => MakeUsable,
            14 => InitiateLoad,
            15 => LoadSegment,
            16 => TerminateLoad,
            17 => InitiateUpLoad,
            18 => UpLoadSegment,
            19 => TerminateUpLoad,
            _ => {
                return Err(DlmsError::InvalidData(format!(
                    "Unknown confirmed service {}",
                    value
                )))
            }
        };
        Ok(kind)
    }
}

/// ServiceError choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceError {
    ApplicationReference = 0,
    HardwareResource = 1,
    VdeStateError = 2,
    Service = 3,
    Definition = 4,
    Access = 5,
    Initiate = 6,
    LoadDataSet = 7,
    ChangeScope = 8,
    Task = 9,
    Other = 10,
}

impl ServiceError {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        use ServiceError::*;
        let error = match value {
            0 => ApplicationReference,
            1 => HardwareResource,
            2 => VdeStateError,
            3 => Service,
            4 => Definition,
            5 => Access,
            6 => Initiate,
            7 => LoadDataSet,
            8 => ChangeScope,
            9 => Task,
            10 => Other,
            _ => {
                return Err(DlmsError::InvalidData(format!(
                    "Unknown service error {}",
                    value
                )))
            }
        };
        Ok(error)
    }
}

/// Values of the `Initiate` service error
pub mod initiate {
    pub const OTHER: u8 = 0;
    pub const DLMS_VERSION_TOO_LOW: u8 = 1;
    pub const INCOMPATIBLE_CONFORMANCE: u8 = 2;
    pub const PDU_SIZE_TOO_SHORT: u8 = 3;
    pub const REFUSED_BY_VDE_HANDLER: u8 = 4;
}

/// Values of the `Service` service error
pub mod service {
    pub const OTHER: u8 = 0;
    pub const PDU_SIZE: u8 = 1;
    pub const UNSUPPORTED: u8 = 2;
}

/// `confirmedServiceError` PDU
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmedServiceError {
    pub service: ConfirmedServiceKind,
    pub error: ServiceError,
    pub value: u8,
}

impl ConfirmedServiceError {
    pub fn new(service: ConfirmedServiceKind, error: ServiceError, value: u8) -> Self {
        Self {
            service,
            error,
            value,
        }
    }

    /// Reply to a service request received before association.
    pub fn service_unsupported() -> Self {
        Self::new(
            ConfirmedServiceKind::InitiateError,
            ServiceError::Service,
            service::UNSUPPORTED,
        )
    }

    pub fn initiate(value: u8) -> Self {
        Self::new(
            ConfirmedServiceKind::InitiateError,
            ServiceError::Initiate,
            value,
        )
    }

    pub fn encode(&self) -> Vec<u8> {
        vec![
            CONFIRMED_SERVICE_ERROR_TAG,
            self.service as u8,
            self.error as u8,
            self.value,
        ]
    }

    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut buff = ByteBuffer::from_slice(data);
        read_tag(&mut buff, CONFIRMED_SERVICE_ERROR_TAG, "ConfirmedServiceError")?;
        Ok(Self {
            service: ConfirmedServiceKind::from_u8(buff.get_u8()?)?,
            error: ServiceError::from_u8(buff.get_u8()?)?,
            value: buff.get_u8()?,
        })
    }
}

impl fmt::Display for ConfirmedServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?} ({})", self.service, self.error, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_conformance_wire() {
        assert_eq!(Conformance::DEFAULT_LN.to_wire(), [0x00, 0x7E, 0x1F]);
        assert_eq!(Conformance::DEFAULT_SN.to_wire(), [0x1C, 0x03, 0x20]);
        assert_eq!(
            Conformance::from_wire([0x00, 0x7E, 0x1F]),
            Conformance::DEFAULT_LN
        );
        assert_eq!(Conformance::RESERVED_ZERO.to_wire(), [0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_conformance_ops() {
        let mut conformance = Conformance::GET | Conformance::SET;
        assert!(conformance.contains(Conformance::GET));
        conformance.remove(Conformance::GET);
        assert!(!conformance.contains(Conformance::GET));
        let negotiated = Conformance::DEFAULT_LN & (Conformance::GET | Conformance::READ);
        assert_eq!(negotiated, Conformance::GET);
    }

    #[test]
    fn test_initiate_request_bytes() {
        let request = InitiateRequest::new(Conformance::DEFAULT_LN, 0xFFFF);
        let bytes = request.encode();
        assert_eq!(
            bytes,
            vec![0x01, 0x00, 0x00, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x7E, 0x1F, 0xFF, 0xFF]
        );
        assert_eq!(InitiateRequest::decode(&bytes).unwrap(), request);
    }

    #[test]
    fn test_initiate_request_with_key() {
        let mut request = InitiateRequest::new(Conformance::DEFAULT_SN, 0x200);
        request.dedicated_key = Some(vec![0xAA; 16]);
        request.proposed_quality_of_service = Some(-1);
        let decoded = InitiateRequest::decode(&request.encode()).unwrap();
        assert_eq!(decoded, request);
        assert!(InitiateRequest::decode(&request.encode()[..10]).is_err());
    }

    #[test]
    fn test_initiate_response_bytes() {
        let response = InitiateResponse::new(Conformance::DEFAULT_LN, 0x01F4, true);
        let bytes = response.encode();
        assert_eq!(
            bytes,
            vec![0x08, 0x00, 0x06, 0x5F, 0x1F, 0x04, 0x00, 0x00, 0x7E, 0x1F, 0x01, 0xF4, 0x00, 0x07]
        );
        assert_eq!(InitiateResponse::decode(&bytes).unwrap(), response);
        assert!(InitiateResponse::decode(&[0x01, 0x00]).is_err());
    }

    #[test]
    fn test_confirmed_service_error() {
        assert_eq!(
            ConfirmedServiceError::service_unsupported().encode(),
            vec![0x0E, 0x01, 0x03, 0x02]
        );
        let error = ConfirmedServiceError::decode(&[0x0E, 0x01, 0x06, 0x01]).unwrap();
        assert_eq!(error, ConfirmedServiceError::initiate(initiate::DLMS_VERSION_TOO_LOW));
        assert!(ConfirmedServiceError::decode(&[0x0E, 0x01, 0x20, 0x01]).is_err());
    }
}
