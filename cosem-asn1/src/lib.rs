//! Encodings used above the link layer
//!
//! - [`axdr`]: the self-describing tagged value encoding of COSEM data
//! - [`ber`] and [`iso_acse`]: association control PDUs
//! - [`xdlms`]: Initiate request/response and the conformance block

pub mod axdr;
pub mod ber;
pub mod iso_acse;
pub mod xdlms;

pub use axdr::{change_type, get_data, set_data, value_type, CodecOptions};
pub use ber::{BerDecoder, BerEncoder, BerLength, BerTag, BerTagClass};
pub use iso_acse::{
    AAREApdu, AARQApdu, ApplicationContext, AssociateResult, RLREApdu, RLRQApdu, ReleaseReason,
    SourceDiagnostic,
};
pub use xdlms::{
    Conformance, ConfirmedServiceError, ConfirmedServiceKind, InitiateRequest, InitiateResponse,
    ServiceError,
};
