//! DLMS/COSEM for Rust
//!
//! Client and server sides of the DLMS/COSEM smart meter protocol over
//! HDLC or the TCP wrapper.
//!
//! # Architecture
//!
//! - `cosem-core`: data types, OBIS codes, enumerations and errors
//! - `cosem-asn1`: A-XDR value codec, ACSE and xDLMS initiate PDUs
//! - `cosem-transport`: byte streams (TCP)
//! - `cosem-session`: HDLC link layer and the wrapper
//! - `cosem-security`: authentication mechanisms and HLS proofs
//! - `cosem-application`: service PDUs, session settings and replies
//! - `cosem-interface`: COSEM interface classes
//! - `cosem-client`: client sessions and connections
//! - `cosem-server`: server sessions and the TCP listener
//!
//! # Usage
//!
//! ```no_run
//! use cosem::client::ConnectionBuilder;
//! use cosem::{ObisCode, ObjectType};
//! use cosem::application::ObjectName;
//!
//! # async fn run() -> cosem::DlmsResult<()> {
//! let mut connection = ConnectionBuilder::new()
//!     .tcp("192.168.1.100:4059")
//!     .wrapper_ids(0x10, 1)
//!     .connect()
//!     .await?;
//! let time = connection
//!     .read(ObjectType::Clock, ObjectName::Logical(ObisCode::CLOCK), 2)
//!     .await?;
//! println!("{}", time);
//! connection.close().await?;
//! # Ok(())
//! # }
//! ```

pub use cosem_core::{
    ByteBuffer, CosemDateTime, DataType, DlmsError, DlmsResult, ErrorCode, InterfaceType,
    ObisCode, ObjectType, Value,
};

pub mod application {
    pub use cosem_application::*;
}

pub mod client {
    pub use cosem_client::*;
}

pub mod server {
    pub use cosem_server::*;
}

pub mod interface {
    pub use cosem_interface::*;
}

pub mod security {
    pub use cosem_security::*;
}
