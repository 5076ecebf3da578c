//! A-XDR encoding/decoding module
//!
//! Values are self-describing: a one byte type tag followed by the payload.
//! Decoding is resumable, see [`decoder::get_data`].

pub mod decoder;
pub mod encoder;

pub use decoder::{change_type, get_data};
pub use encoder::{set_data, value_type};

/// Options that change how date-time values are encoded
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecOptions {
    /// Deviation is sent as local time minus UTC instead of UTC minus local
    pub use_utc2_normal_time: bool,
}
