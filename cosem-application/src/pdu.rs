//! APDU choice tags
//!
//! The leading command byte of a PDU is [`cosem_core::Command`]; the enums
//! here are the second byte (request/response type) of LN services and the
//! choice tags used inside SN Read/Write and access services.

use cosem_core::{DlmsError, DlmsResult};
use std::fmt;

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$vmeta:meta])* $variant:ident = $value:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $value),+
        }

        impl $name {
            #[must_use]
            pub const fn from_u8(value: u8) -> Option<Self> {
                match value {
                    $($value => Some(Self::$variant),)+
                    _ => None,
                }
            }

            #[must_use]
            pub const fn as_u8(self) -> u8 {
                self as u8
            }

            /// Like [`Self::from_u8`] but fails with `InvalidData`.
            pub fn parse(value: u8) -> DlmsResult<Self> {
                Self::from_u8(value).ok_or_else(|| {
                    DlmsError::InvalidData(format!(
                        "Invalid {} {}",
                        stringify!($name),
                        value
                    ))
                })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Debug::fmt(self, f)
            }
        }
    };
}

wire_enum! {
    /// Get-Request choice
    GetRequestType {
        Normal = 1,
        NextDataBlock = 2,
        WithList = 3,
    }
}

wire_enum! {
    /// Get-Response choice
    GetResponseType {
        Normal = 1,
        WithDataBlock = 2,
        WithList = 3,
    }
}

wire_enum! {
    /// Set-Request choice
    SetRequestType {
        Normal = 1,
        FirstDataBlock = 2,
        WithDataBlock = 3,
        WithList = 4,
    }
}

wire_enum! {
    /// Set-Response choice
    SetResponseType {
        Normal = 1,
        DataBlock = 2,
        LastDataBlock = 3,
        LastDataBlockWithList = 4,
        WithList = 5,
    }
}

wire_enum! {
    /// Action-Request choice
    ActionRequestType {
        Normal = 1,
        NextBlock = 2,
        WithList = 3,
    }
}

wire_enum! {
    /// Action-Response choice
    ActionResponseType {
        Normal = 1,
        WithBlock = 2,
        WithList = 3,
    }
}

wire_enum! {
    /// Service of one access-request specification
    AccessServiceCommandType {
        Get = 1,
        Set = 2,
        Action = 3,
    }
}

wire_enum! {
    /// Variable-Access-Specification of SN Read/Write requests
    VariableAccessSpecification {
        VariableName = 2,
        ParameterisedAccess = 4,
        BlockNumberAccess = 5,
        ReadDataBlockAccess = 6,
        WriteDataBlockAccess = 7,
    }
}

wire_enum! {
    /// Read-Response item choice
    SingleReadResponse {
        Data = 0,
        DataAccessError = 1,
        DataBlockResult = 2,
        BlockNumber = 3,
    }
}

wire_enum! {
    /// Write-Response item choice
    SingleWriteResponse {
        Success = 0,
        DataAccessError = 1,
        BlockNumber = 2,
    }
}

wire_enum! {
    /// State error of an exception response
    StateError {
        ServiceNotAllowed = 1,
        ServiceUnknown = 2,
    }
}

wire_enum! {
    /// Service error of an exception response
    ExceptionServiceError {
        OperationNotPossible = 1,
        ServiceNotSupported = 2,
        OtherReason = 3,
        PduTooLong = 4,
        DecipheringError = 5,
        InvocationCounterError = 6,
    }
}

/// Not-a-status marker of [`crate::LnParameters::status`]
pub const NO_STATUS: u8 = 0xFF;
