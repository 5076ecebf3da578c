//! Protocol enumerations shared by every layer

use serde::{Deserialize, Serialize};
use std::fmt;

/// Data-access-result codes carried inside responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ErrorCode {
    Ok = 0,
    HardwareFault = 1,
    TemporaryFailure = 2,
    ReadWriteDenied = 3,
    UndefinedObject = 4,
    InconsistentClass = 9,
    UnavailableObject = 11,
    UnmatchedType = 12,
    AccessViolated = 13,
    DataBlockUnavailable = 14,
    LongGetOrReadAborted = 15,
    NoLongGetOrReadInProgress = 16,
    LongSetOrWriteAborted = 17,
    NoLongSetOrWriteInProgress = 18,
    DataBlockNumberInvalid = 19,
    OtherReason = 250,
}

impl ErrorCode {
    /// Decode a wire value. Codes outside the table map to `OtherReason`.
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => ErrorCode::Ok,
            1 => ErrorCode::HardwareFault,
            2 => ErrorCode::TemporaryFailure,
            3 => ErrorCode::ReadWriteDenied,
            4 => ErrorCode::UndefinedObject,
            9 => ErrorCode::InconsistentClass,
            11 => ErrorCode::UnavailableObject,
            12 => ErrorCode::UnmatchedType,
            13 => ErrorCode::AccessViolated,
            14 => ErrorCode::DataBlockUnavailable,
            15 => ErrorCode::LongGetOrReadAborted,
            16 => ErrorCode::NoLongGetOrReadInProgress,
            17 => ErrorCode::LongSetOrWriteAborted,
            18 => ErrorCode::NoLongSetOrWriteInProgress,
            19 => ErrorCode::DataBlockNumberInvalid,
            _ => ErrorCode::OtherReason,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn is_ok(self) -> bool {
        self == ErrorCode::Ok
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            ErrorCode::Ok => "ok",
            ErrorCode::HardwareFault => "hardware fault",
            ErrorCode::TemporaryFailure => "temporary failure",
            ErrorCode::ReadWriteDenied => "read-write denied",
            ErrorCode::UndefinedObject => "undefined object",
            ErrorCode::InconsistentClass => "inconsistent class",
            ErrorCode::UnavailableObject => "unavailable object",
            ErrorCode::UnmatchedType => "unmatched type",
            ErrorCode::AccessViolated => "access violated",
            ErrorCode::DataBlockUnavailable => "data block unavailable",
            ErrorCode::LongGetOrReadAborted => "long get or read aborted",
            ErrorCode::NoLongGetOrReadInProgress => "no long get or read in progress",
            ErrorCode::LongSetOrWriteAborted => "long set or write aborted",
            ErrorCode::NoLongSetOrWriteInProgress => "no long set or write in progress",
            ErrorCode::DataBlockNumberInvalid => "data block number invalid",
            ErrorCode::OtherReason => "other reason",
        };
        write!(f, "{} ({})", text, *self as u8)
    }
}

/// COSEM interface class identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectType {
    None,
    Data,
    Register,
    ExtendedRegister,
    DemandRegister,
    RegisterActivation,
    ProfileGeneric,
    Clock,
    ScriptTable,
    Schedule,
    SpecialDaysTable,
    AssociationShortName,
    AssociationLogicalName,
    SapAssignment,
    ImageTransfer,
    ActivityCalendar,
    RegisterMonitor,
    SingleActionSchedule,
    IecHdlcSetup,
    PushSetup,
    SecuritySetup,
    DisconnectControl,
    Limiter,
    /// Any class id this crate has no name for
    Other(u16),
}

impl ObjectType {
    pub fn class_id(self) -> u16 {
        match self {
            ObjectType::None => 0,
            ObjectType::Data => 1,
            ObjectType::Register => 3,
            ObjectType::ExtendedRegister => 4,
            ObjectType::DemandRegister => 5,
            ObjectType::RegisterActivation => 6,
            ObjectType::ProfileGeneric => 7,
            ObjectType::Clock => 8,
            ObjectType::ScriptTable => 9,
            ObjectType::Schedule => 10,
            ObjectType::SpecialDaysTable => 11,
            ObjectType::AssociationShortName => 12,
            ObjectType::AssociationLogicalName => 15,
            ObjectType::SapAssignment => 17,
            ObjectType::ImageTransfer => 18,
            ObjectType::ActivityCalendar => 20,
            ObjectType::RegisterMonitor => 21,
            ObjectType::SingleActionSchedule => 22,
            ObjectType::IecHdlcSetup => 23,
            ObjectType::PushSetup => 40,
            ObjectType::SecuritySetup => 64,
            ObjectType::DisconnectControl => 70,
            ObjectType::Limiter => 71,
            ObjectType::Other(id) => id,
        }
    }

    pub fn from_class_id(id: u16) -> Self {
        match id {
            0 => ObjectType::None,
            1 => ObjectType::Data,
            3 => ObjectType::Register,
            4 => ObjectType::ExtendedRegister,
            5 => ObjectType::DemandRegister,
            6 => ObjectType::RegisterActivation,
            7 => ObjectType::ProfileGeneric,
            8 => ObjectType::Clock,
            9 => ObjectType::ScriptTable,
            10 => ObjectType::Schedule,
            11 => ObjectType::SpecialDaysTable,
            12 => ObjectType::AssociationShortName,
            15 => ObjectType::AssociationLogicalName,
            17 => ObjectType::SapAssignment,
            18 => ObjectType::ImageTransfer,
            20 => ObjectType::ActivityCalendar,
            21 => ObjectType::RegisterMonitor,
            22 => ObjectType::SingleActionSchedule,
            23 => ObjectType::IecHdlcSetup,
            40 => ObjectType::PushSetup,
            64 => ObjectType::SecuritySetup,
            70 => ObjectType::DisconnectControl,
            71 => ObjectType::Limiter,
            other => ObjectType::Other(other),
        }
    }

    /// Offset of the first method and the method count in short-name
    /// addressing. Methods of an SN object live at
    /// `base + offset + (index - 1) * 8`.
    pub fn sn_action_info(self) -> (u16, u8) {
        match self {
            ObjectType::Clock => (0x60, 6),
            ObjectType::ImageTransfer => (0x40, 4),
            ObjectType::ActivityCalendar => (0x50, 1),
            ObjectType::AssociationLogicalName => (0x60, 4),
            ObjectType::AssociationShortName => (0x20, 8),
            ObjectType::DemandRegister => (0x48, 2),
            ObjectType::ExtendedRegister => (0x38, 1),
            ObjectType::Register => (0x28, 1),
            ObjectType::ProfileGeneric => (0x58, 4),
            ObjectType::ScriptTable => (0x20, 1),
            ObjectType::Schedule => (0x20, 3),
            ObjectType::SpecialDaysTable => (0x10, 2),
            ObjectType::DisconnectControl => (0x20, 2),
            ObjectType::PushSetup => (0x38, 1),
            ObjectType::SecuritySetup => (0x30, 2),
            _ => (0, 0),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectType::Other(id) => write!(f, "Class{}", id),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Leading byte of an application-layer PDU or HDLC command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Command {
    None = 0x00,
    ReadRequest = 0x05,
    WriteRequest = 0x06,
    ReadResponse = 0x0C,
    WriteResponse = 0x0D,
    ConfirmedServiceError = 0x0E,
    Aarq = 0x60,
    Aare = 0x61,
    ReleaseRequest = 0x62,
    ReleaseResponse = 0x63,
    GetRequest = 0xC0,
    SetRequest = 0xC1,
    MethodRequest = 0xC3,
    GetResponse = 0xC4,
    SetResponse = 0xC5,
    MethodResponse = 0xC7,
    ExceptionResponse = 0xD8,
    AccessRequest = 0xD9,
    AccessResponse = 0xDA,
    DisconnectRequest = 0x53,
    Ua = 0x73,
    Snrm = 0x93,
}

impl Command {
    pub fn from_u8(value: u8) -> Option<Self> {
        let command = match value {
            0x00 => Command::None,
            0x05 => Command::ReadRequest,
            0x06 => Command::WriteRequest,
            0x0C => Command::ReadResponse,
            0x0D => Command::WriteResponse,
            0x0E => Command::ConfirmedServiceError,
            0x60 => Command::Aarq,
            0x61 => Command::Aare,
            0x62 => Command::ReleaseRequest,
            0x63 => Command::ReleaseResponse,
            0xC0 => Command::GetRequest,
            0xC1 => Command::SetRequest,
            0xC3 => Command::MethodRequest,
            0xC4 => Command::GetResponse,
            0xC5 => Command::SetResponse,
            0xC7 => Command::MethodResponse,
            0xD8 => Command::ExceptionResponse,
            0xD9 => Command::AccessRequest,
            0xDA => Command::AccessResponse,
            0x53 => Command::DisconnectRequest,
            0x73 => Command::Ua,
            0x93 => Command::Snrm,
            _ => return None,
        };
        Some(command)
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Attribute access rights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum AccessMode {
    NoAccess = 0,
    Read = 1,
    Write = 2,
    ReadWrite = 3,
    AuthenticatedRead = 4,
    AuthenticatedWrite = 5,
    AuthenticatedReadWrite = 6,
}

impl AccessMode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => AccessMode::Read,
            2 => AccessMode::Write,
            3 => AccessMode::ReadWrite,
            4 => AccessMode::AuthenticatedRead,
            5 => AccessMode::AuthenticatedWrite,
            6 => AccessMode::AuthenticatedReadWrite,
            _ => AccessMode::NoAccess,
        }
    }

    pub fn can_read(self) -> bool {
        !matches!(
            self,
            AccessMode::NoAccess | AccessMode::Write | AccessMode::AuthenticatedWrite
        )
    }

    pub fn can_write(self) -> bool {
        matches!(
            self,
            AccessMode::Write
                | AccessMode::ReadWrite
                | AccessMode::AuthenticatedWrite
                | AccessMode::AuthenticatedReadWrite
        )
    }
}

/// Method access rights
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MethodAccessMode {
    NoAccess = 0,
    Access = 1,
    AuthenticatedAccess = 2,
}

impl MethodAccessMode {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => MethodAccessMode::Access,
            2 => MethodAccessMode::AuthenticatedAccess,
            _ => MethodAccessMode::NoAccess,
        }
    }
}

/// Link layer used below the application layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterfaceType {
    #[default]
    Hdlc,
    Wrapper,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_round_trip() {
        for code in [
            ErrorCode::Ok,
            ErrorCode::UndefinedObject,
            ErrorCode::DataBlockNumberInvalid,
            ErrorCode::OtherReason,
        ] {
            assert_eq!(ErrorCode::from_u8(code.to_u8()), code);
        }
        assert_eq!(ErrorCode::from_u8(200), ErrorCode::OtherReason);
    }

    #[test]
    fn test_object_type_class_ids() {
        assert_eq!(ObjectType::AssociationLogicalName.class_id(), 15);
        assert_eq!(ObjectType::from_class_id(7), ObjectType::ProfileGeneric);
        assert_eq!(ObjectType::from_class_id(999), ObjectType::Other(999));
        assert_eq!(ObjectType::Other(999).class_id(), 999);
    }

    #[test]
    fn test_command_from_u8() {
        assert_eq!(Command::from_u8(0xC0), Some(Command::GetRequest));
        assert_eq!(Command::from_u8(0x61), Some(Command::Aare));
        assert_eq!(Command::from_u8(0xFF), None);
    }

    #[test]
    fn test_access_mode() {
        assert!(AccessMode::ReadWrite.can_write());
        assert!(AccessMode::Read.can_read());
        assert!(!AccessMode::Read.can_write());
        assert!(!AccessMode::NoAccess.can_read());
    }
}
