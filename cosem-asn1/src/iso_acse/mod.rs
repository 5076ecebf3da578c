//! ISO-ACSE association control
//!
//! AARQ/AARE establish an association, RLRQ/RLRE release it. The xDLMS
//! Initiate PDUs travel inside the user-information field, see
//! [`crate::xdlms`].

pub mod pdu;
pub mod types;

pub use pdu::{AAREApdu, AARQApdu, RLREApdu, RLRQApdu};
pub use types::{
    dlms_oid, dlms_oid_id, ApplicationContext, AssociateResult, ReleaseReason, SourceDiagnostic,
    APPLICATION_CONTEXT_ARC, DLMS_UA_ARCS, MECHANISM_NAME_ARC,
};
