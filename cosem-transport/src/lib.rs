//! Byte stream access for DLMS/COSEM connections
//!
//! The codec and session crates never touch sockets. Client and server
//! drivers move bytes through a [`StreamAccessor`]; TCP is provided here.

pub mod stream;
pub mod tcp;

pub use stream::{StreamAccessor, TransportLayer};
pub use tcp::{TcpSettings, TcpTransport};
