//! Long transactions
//!
//! A Get or Read reply that does not fit one PDU, or a Set request sent in
//! data blocks, spans several request/response pairs. The server keeps at
//! most one of them per connection.

use cosem_application::{LnDescriptor, LnParameters, SnParameters};
use cosem_core::ByteBuffer;

#[derive(Debug)]
pub enum LongTransaction {
    /// Get response still being sent in blocks
    Get(LnParameters),
    /// Read response still being sent in blocks
    Read(SnParameters),
    /// Set request whose blocks are being received
    Set {
        descriptor: LnDescriptor,
        data: ByteBuffer,
    },
}

impl LongTransaction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Get(_) => "get",
            Self::Read(_) => "read",
            Self::Set { .. } => "set",
        }
    }
}
