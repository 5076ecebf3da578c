//! HDLC session layer module

pub mod address;
pub mod decoder;
pub mod fcs;
pub mod frame;
pub mod link;
pub mod parameters;
pub mod segmentation;
pub mod state;
pub mod statistics;

pub use address::{reserved, HdlcAddress};
pub use decoder::HdlcMessageDecoder;
pub use fcs::FcsCalc;
pub use frame::{FrameType, HdlcFrame, FLAG, LLC_REQUEST, LLC_RESPONSE};
pub use link::{HdlcLink, LinkEvent, LinkRole};
pub use parameters::Limits;
pub use state::{HdlcConnectionState, SequenceCounters};
pub use statistics::HdlcStatistics;
