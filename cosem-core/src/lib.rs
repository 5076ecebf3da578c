//! Core types and utilities for the DLMS/COSEM stack
//!
//! This crate provides the error type, the byte buffer every codec reads
//! from and writes to, the value model and the protocol enumerations shared
//! by all other crates.

pub mod byte_buffer;
pub mod datatypes;
pub mod enums;
pub mod error;
pub mod obis_code;

pub use byte_buffer::ByteBuffer;
pub use datatypes::{BitString, ClockStatus, CosemDateTime, DataInfo, DataType, DateTimeSkips, Value};
pub use enums::{AccessMode, Command, ErrorCode, InterfaceType, MethodAccessMode, ObjectType};
pub use error::{DlmsError, DlmsResult};
pub use obis_code::ObisCode;
