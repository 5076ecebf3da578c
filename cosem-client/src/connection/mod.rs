//! Connection management module

pub mod builder;
pub mod connection;

pub use builder::ConnectionBuilder;
pub use connection::{Connection, ConnectionState};
