//! BER (Basic Encoding Rules) helpers
//!
//! Only definite lengths and single-octet tags are supported, which covers
//! every ACSE element a COSEM association uses.

pub mod decoder;
pub mod encoder;
pub mod types;

pub use decoder::BerDecoder;
pub use encoder::BerEncoder;
pub use types::{BerLength, BerTag, BerTagClass};
