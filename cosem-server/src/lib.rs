//! DLMS/COSEM server
//!
//! [`DlmsServer`] is a sans-IO server session: it takes the bytes received
//! from one client and returns the frames to send back. It accepts or
//! rejects associations, authenticates clients and answers Get, Set,
//! Action and Access requests (logical name referencing) or Read and Write
//! requests (short name referencing) from its [`ObjectCollection`].
//!
//! [`ServerListener`] serves TCP clients with one session each, [`serve`]
//! drives a session over any [`StreamAccessor`].
//!
//! [`ObjectCollection`]: cosem_interface::ObjectCollection
//! [`StreamAccessor`]: cosem_transport::StreamAccessor

pub mod config;
mod ln;
pub mod listener;
pub mod server;
mod sn;
pub mod transaction;

pub use config::ServerConfig;
pub use listener::{serve, ServerListener};
pub use server::{DlmsServer, MIN_PDU_SIZE};
pub use transaction::LongTransaction;
