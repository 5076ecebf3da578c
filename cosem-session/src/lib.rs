//! Session layer module for DLMS/COSEM protocol
//!
//! Frame codecs for the two DLMS lower layers: HDLC (with link setup,
//! segmentation and sequence numbers) and the TCP/UDP wrapper. Both work
//! on byte buffers; reading and writing the transport is left to the
//! caller.

pub mod hdlc;
pub mod wrapper;

pub use hdlc::*;
pub use wrapper::{Wrapper, WrapperHeader, WRAPPER_HEADER_LENGTH, WRAPPER_VERSION};
