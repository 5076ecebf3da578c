//! DLMS/COSEM client implementation
//!
//! The crate has two layers:
//!
//! - [`DlmsClient`]: a synchronous engine that builds request frames and
//!   parses reply frames for HDLC or wrapper framing, logical or short
//!   name referencing. It does no I/O and can be driven by any transport.
//! - [`Connection`]: an async driver running a [`DlmsClient`] over a
//!   [`cosem_transport::StreamAccessor`], created directly or with the
//!   [`ConnectionBuilder`].

pub mod client;
pub mod config;
pub mod connection;

pub use client::{AccessItem, DlmsClient};
pub use config::ClientConfig;
pub use connection::{Connection, ConnectionBuilder, ConnectionState};
