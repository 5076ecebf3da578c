//! Per-connection session state
//!
//! One [`Settings`] value exists for every logical connection, on the client
//! as well as on the server. It is threaded by reference through the PDU
//! builders, the reply parser and the server handlers, and is reset when the
//! connection is closed.

use cosem_asn1::xdlms::{Conformance, DLMS_VERSION};
use cosem_asn1::CodecOptions;
use cosem_core::InterfaceType;
use cosem_security::{Authentication, CipherContext};
use cosem_session::Limits;
use std::fmt::{self, Display};

/// Largest PDU either side accepts unless negotiated lower
pub const DEFAULT_MAX_PDU_SIZE: u16 = 0xFFFF;

/// Association state of a connection
///
/// ```text
/// Disconnected --AARQ accepted--> Connected
/// Disconnected --AARQ with HLS--> AssociationPending --valid proof--> Connected
///                                                    --wrong proof--> Disconnected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssociationStatus {
    #[default]
    Disconnected,
    /// AARE sent/received, HLS proof not yet exchanged
    AssociationPending,
    Connected,
}

impl Display for AssociationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::AssociationPending => write!(f, "AssociationPending"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Priority bit of the invoke-id-and-priority field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Priority {
    Normal,
    #[default]
    High,
}

/// Service class bit of the invoke-id-and-priority field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ServiceClass {
    Unconfirmed,
    #[default]
    Confirmed,
}

/// Leniencies for meters that do not follow the standard
///
/// All entries are off by default so that parsing stays strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Quirks {
    /// Stop reading an object list at the end of the buffer even if the
    /// announced item count has not been reached.
    pub tolerate_wrong_item_count: bool,
    /// Method access rights given as one flat structure instead of an
    /// array of structures (with a zero-based method id).
    pub flat_method_access: bool,
    /// Accept an AARE with a DLMS version other than 6.
    pub any_dlms_version: bool,
}

/// Session context of one connection
#[derive(Debug, Clone)]
pub struct Settings {
    is_server: bool,
    pub status: AssociationStatus,
    pub interface_type: InterfaceType,
    pub use_logical_name_referencing: bool,
    /// Conformance this side proposes (client) or supports (server)
    pub proposed_conformance: Conformance,
    /// Conformance agreed in the AARE, empty while disconnected
    pub negotiated_conformance: Conformance,
    /// Largest PDU the peer accepts
    pub max_pdu_size: u16,
    /// Largest PDU this server accepts
    pub max_server_pdu_size: u16,
    block_index: u32,
    starting_block_index: u32,
    pub client_address: u16,
    pub server_address: u32,
    /// Invoke id, only the low four bits are sent
    pub invoke_id: u8,
    long_invoke_id: u32,
    pub priority: Priority,
    pub service_class: ServiceClass,
    pub limits: Limits,
    pub cipher: CipherContext,
    pub authentication: Authentication,
    pub password: Vec<u8>,
    /// Client to server challenge
    pub ctos_challenge: Option<Vec<u8>>,
    /// Server to client challenge
    pub stoc_challenge: Option<Vec<u8>>,
    /// `ctos_challenge` is set by the user and not generated
    pub use_custom_challenge: bool,
    pub dlms_version: u8,
    pub codec: CodecOptions,
    pub quirks: Quirks,
}

impl Settings {
    pub fn new(is_server: bool) -> Self {
        Self {
            is_server,
            status: AssociationStatus::Disconnected,
            interface_type: InterfaceType::Hdlc,
            use_logical_name_referencing: true,
            proposed_conformance: Conformance::DEFAULT_LN,
            negotiated_conformance: Conformance::NONE,
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            max_server_pdu_size: DEFAULT_MAX_PDU_SIZE,
            block_index: 1,
            starting_block_index: 1,
            client_address: 0x10,
            server_address: 0x01,
            invoke_id: 1,
            long_invoke_id: 0,
            priority: Priority::High,
            service_class: ServiceClass::Confirmed,
            limits: Limits::default(),
            cipher: CipherContext::default(),
            authentication: Authentication::None,
            password: Vec::new(),
            ctos_challenge: None,
            stoc_challenge: None,
            use_custom_challenge: false,
            dlms_version: DLMS_VERSION,
            codec: CodecOptions::default(),
            quirks: Quirks::default(),
        }
    }

    pub fn is_server(&self) -> bool {
        self.is_server
    }

    pub fn is_connected(&self) -> bool {
        self.status == AssociationStatus::Connected
    }

    pub fn set_status(&mut self, status: AssociationStatus) {
        if self.status != status {
            log::debug!("Association {} -> {}", self.status, status);
            self.status = status;
        }
    }

    /// Block number expected next in a block transfer
    pub fn block_index(&self) -> u32 {
        self.block_index
    }

    pub fn reset_block_index(&mut self) {
        self.block_index = self.starting_block_index;
    }

    pub fn increase_block_index(&mut self) {
        self.block_index = self.block_index.wrapping_add(1);
    }

    /// Some meters number blocks from 0.
    pub fn set_starting_block_index(&mut self, value: u32) {
        self.starting_block_index = value;
        self.reset_block_index();
    }

    /// Conformance proposed in the AARQ for the referencing in use.
    pub fn default_conformance(&self) -> Conformance {
        if self.use_logical_name_referencing {
            Conformance::DEFAULT_LN
        } else {
            Conformance::DEFAULT_SN
        }
    }

    /// Invoke-id-and-priority byte of LN requests.
    pub fn invoke_id_and_priority(&self) -> u8 {
        let mut value = self.invoke_id & 0x0F;
        if self.priority == Priority::High {
            value |= 0x80;
        }
        if self.service_class == ServiceClass::Confirmed {
            value |= 0x40;
        }
        value
    }

    /// Long invoke-id-and-priority of access requests. The id part is
    /// incremented on every call.
    pub fn next_long_invoke_id(&mut self) -> u32 {
        let mut value = self.long_invoke_id & 0x00FF_FFFF;
        if self.priority == Priority::High {
            value |= 0x8000_0000;
        }
        if self.service_class == ServiceClass::Confirmed {
            value |= 0x4000_0000;
        }
        self.long_invoke_id = (self.long_invoke_id + 1) & 0x00FF_FFFF;
        value
    }

    /// Forget everything negotiated for the current association.
    pub fn reset(&mut self) {
        self.set_status(AssociationStatus::Disconnected);
        self.negotiated_conformance = Conformance::NONE;
        self.max_pdu_size = DEFAULT_MAX_PDU_SIZE;
        self.stoc_challenge = None;
        if !self.use_custom_challenge {
            self.ctos_challenge = None;
        }
        self.cipher.reset_peer();
        self.reset_block_index();
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::new(false)
    }
}
