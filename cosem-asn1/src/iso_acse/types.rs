//! ISO-ACSE field types used by COSEM associations

use cosem_core::{DlmsError, DlmsResult};

/// Arcs shared by every COSEM application context and mechanism name:
/// `joint-iso-ccitt(2) country(16) country-name(756) identified-organization(5) DLMS-UA(8)`
pub const DLMS_UA_ARCS: [u32; 5] = [2, 16, 756, 5, 8];

/// Arc after [`DLMS_UA_ARCS`] selecting application contexts
pub const APPLICATION_CONTEXT_ARC: u32 = 1;

/// Arc after [`DLMS_UA_ARCS`] selecting authentication mechanism names
pub const MECHANISM_NAME_ARC: u32 = 2;

/// COSEM application context name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplicationContext {
    #[default]
    LogicalName = 1,
    ShortName = 2,
    LogicalNameCiphered = 3,
    ShortNameCiphered = 4,
}

impl ApplicationContext {
    pub fn from_u8(value: u8) -> DlmsResult<Self> {
        match value {
            1 => Ok(ApplicationContext::LogicalName),
            2 => Ok(ApplicationContext::ShortName),
            3 => Ok(ApplicationContext::LogicalNameCiphered),
            4 => Ok(ApplicationContext::ShortNameCiphered),
            _ => Err(DlmsError::InvalidData(format!(
                "Unknown application context {}",
                value
            ))),
        }
    }

    pub fn for_referencing(logical_name: bool) -> Self {
        if logical_name {
            ApplicationContext::LogicalName
        } else {
            ApplicationContext::ShortName
        }
    }

    pub fn is_logical_name(self) -> bool {
        matches!(
            self,
            ApplicationContext::LogicalName | ApplicationContext::LogicalNameCiphered
        )
    }

    /// Full object identifier arcs.
    pub fn arcs(self) -> Vec<u32> {
        dlms_oid(APPLICATION_CONTEXT_ARC, self as u32)
    }
}

/// Object identifier `DLMS-UA . kind . id`
pub fn dlms_oid(kind: u32, id: u32) -> Vec<u32> {
    let mut arcs = DLMS_UA_ARCS.to_vec();
    arcs.push(kind);
    arcs.push(id);
    arcs
}

/// Last arc of a DLMS-UA object identifier of the given kind.
///
/// # Errors
///
/// Returns `InvalidData` when `arcs` is not under `DLMS-UA . kind`.
pub fn dlms_oid_id(arcs: &[u32], kind: u32) -> DlmsResult<u8> {
    let valid = arcs.len() == DLMS_UA_ARCS.len() + 2
        && arcs[..DLMS_UA_ARCS.len()] == DLMS_UA_ARCS
        && arcs[DLMS_UA_ARCS.len()] == kind;
    if !valid {
        return Err(DlmsError::InvalidData(format!(
            "Unexpected object identifier {:?}",
            arcs
        )));
    }
    u8::try_from(arcs[DLMS_UA_ARCS.len() + 1])
        .map_err(|_| DlmsError::InvalidData(format!("Object identifier id out of range {:?}", arcs)))
}

/// Association result carried in the AARE
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociateResult {
    Accepted = 0,
    RejectedPermanent = 1,
    RejectedTransient = 2,
}

impl AssociateResult {
    pub fn from_value(value: i64) -> DlmsResult<Self> {
        match value {
            0 => Ok(AssociateResult::Accepted),
            1 => Ok(AssociateResult::RejectedPermanent),
            2 => Ok(AssociateResult::RejectedTransient),
            _ => Err(DlmsError::InvalidData(format!(
                "Invalid association result {}",
                value
            ))),
        }
    }
}

/// acse-service-user diagnostic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SourceDiagnostic {
    #[default]
    Null = 0,
    NoReasonGiven = 1,
    ApplicationContextNameNotSupported = 2,
    AuthenticationMechanismNameNotRecognised = 11,
    AuthenticationMechanismNameRequired = 12,
    AuthenticationFailure = 13,
    AuthenticationRequired = 14,
}

impl SourceDiagnostic {
    /// Unknown values are reported as `NoReasonGiven`.
    pub fn from_value(value: i64) -> Self {
        match value {
            0 => SourceDiagnostic::Null,
            2 => SourceDiagnostic::ApplicationContextNameNotSupported,
            11 => SourceDiagnostic::AuthenticationMechanismNameNotRecognised,
            12 => SourceDiagnostic::AuthenticationMechanismNameRequired,
            13 => SourceDiagnostic::AuthenticationFailure,
            14 => SourceDiagnostic::AuthenticationRequired,
            _ => SourceDiagnostic::NoReasonGiven,
        }
    }
}

impl std::fmt::Display for SourceDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            SourceDiagnostic::Null => "null",
            SourceDiagnostic::NoReasonGiven => "no reason given",
            SourceDiagnostic::ApplicationContextNameNotSupported => {
                "application context name not supported"
            }
            SourceDiagnostic::AuthenticationMechanismNameNotRecognised => {
                "authentication mechanism name not recognised"
            }
            SourceDiagnostic::AuthenticationMechanismNameRequired => {
                "authentication mechanism name required"
            }
            SourceDiagnostic::AuthenticationFailure => "authentication failure",
            SourceDiagnostic::AuthenticationRequired => "authentication required",
        };
        f.write_str(text)
    }
}

/// Release request/response reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReleaseReason {
    #[default]
    Normal = 0,
    Urgent = 1,
    UserDefined = 30,
}

impl ReleaseReason {
    pub fn from_value(value: i64) -> DlmsResult<Self> {
        match value {
            0 => Ok(ReleaseReason::Normal),
            1 => Ok(ReleaseReason::Urgent),
            30 => Ok(ReleaseReason::UserDefined),
            _ => Err(DlmsError::InvalidData(format!(
                "Invalid release reason {}",
                value
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_arcs() {
        assert_eq!(
            ApplicationContext::ShortName.arcs(),
            vec![2, 16, 756, 5, 8, 1, 2]
        );
        let id = dlms_oid_id(&ApplicationContext::LogicalName.arcs(), APPLICATION_CONTEXT_ARC)
            .unwrap();
        assert_eq!(ApplicationContext::from_u8(id).unwrap(), ApplicationContext::LogicalName);
        assert!(dlms_oid_id(&[2, 16, 756, 5, 8, 2, 5], APPLICATION_CONTEXT_ARC).is_err());
        assert!(dlms_oid_id(&[1, 0, 17], APPLICATION_CONTEXT_ARC).is_err());
    }

    #[test]
    fn test_diagnostic_values() {
        assert_eq!(SourceDiagnostic::from_value(14), SourceDiagnostic::AuthenticationRequired);
        assert_eq!(SourceDiagnostic::from_value(99), SourceDiagnostic::NoReasonGiven);
        assert_eq!(SourceDiagnostic::AuthenticationFailure as u8, 13);
    }
}
