//! Application layer for DLMS/COSEM
//!
//! This crate holds the per-connection [`Settings`], builds LN and SN
//! service PDUs (splitting them into data blocks where needed) and parses
//! reply PDUs. It does no I/O: link framing lives in `cosem-session` and
//! the client and server drive both.

pub mod addressing;
pub mod ln;
pub mod pdu;
pub mod reply;
pub mod settings;
pub mod sn;

pub use addressing::{parse_logical_name, sn_attribute, sn_method, LnDescriptor, ObjectName};
pub use ln::{get_ln_messages, get_ln_pdu, LnParameters};
pub use pdu::NO_STATUS;
pub use reply::{get_pdu, parse_result_list, MoreData, ReplyData};
pub use settings::{AssociationStatus, Priority, Quirks, ServiceClass, Settings, DEFAULT_MAX_PDU_SIZE};
pub use sn::{get_sn_messages, get_sn_pdu, SnParameters};
