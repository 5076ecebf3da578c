//! HDLC frame layout
//!
//! ```text
//! 7E | A0+S+len(11 bits) | dest | src | control | HCS | info | FCS | 7E
//! ```
//!
//! FCS is only present when the frame carries an information field.

use crate::hdlc::address::HdlcAddress;
use crate::hdlc::fcs::{self, FcsCalc};
use cosem_core::byte_buffer::to_hex;
use cosem_core::{DlmsError, DlmsResult};
use std::fmt;

pub const FLAG: u8 = 0x7E;

/// LLC header of a request sent by the client
pub const LLC_REQUEST: [u8; 3] = [0xE6, 0xE6, 0x00];
/// LLC header of a response sent by the server
pub const LLC_RESPONSE: [u8; 3] = [0xE6, 0xE7, 0x00];

const FRAME_FORMAT_TYPE: u8 = 0xA0;
const SEGMENTATION_BIT: u8 = 0x08;
const LENGTH_MASK: u16 = 0x07FF;

/// Control field values with the poll/final bit set
pub mod control {
    pub const POLL_FINAL: u8 = 0x10;
    pub const SNRM: u8 = 0x93;
    pub const UA: u8 = 0x73;
    pub const DISC: u8 = 0x53;
    pub const DM: u8 = 0x1F;
    pub const FRMR: u8 = 0x97;
    pub const UI: u8 = 0x13;
    pub const RR: u8 = 0x11;
    pub const RNR: u8 = 0x15;
}

/// Frame type decoded from the control field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Information {
        send_sequence: u8,
        receive_sequence: u8,
    },
    ReceiveReady {
        receive_sequence: u8,
    },
    ReceiveNotReady {
        receive_sequence: u8,
    },
    SetNormalResponseMode,
    Disconnect,
    UnnumberedAcknowledge,
    DisconnectMode,
    FrameReject,
    UnnumberedInformation,
}

impl FrameType {
    /// Classify a control byte, ignoring the poll/final bit.
    pub fn from_control_byte(byte: u8) -> DlmsResult<Self> {
        if byte & 0x01 == 0 {
            return Ok(FrameType::Information {
                send_sequence: (byte >> 1) & 0x07,
                receive_sequence: byte >> 5,
            });
        }
        match byte & 0x0F {
            0x01 => {
                return Ok(FrameType::ReceiveReady {
                    receive_sequence: byte >> 5,
                })
            }
            0x05 => {
                return Ok(FrameType::ReceiveNotReady {
                    receive_sequence: byte >> 5,
                })
            }
            _ => {}
        }
        match byte | control::POLL_FINAL {
            control::SNRM => Ok(FrameType::SetNormalResponseMode),
            control::DISC => Ok(FrameType::Disconnect),
            control::UA => Ok(FrameType::UnnumberedAcknowledge),
            control::DM => Ok(FrameType::DisconnectMode),
            control::FRMR => Ok(FrameType::FrameReject),
            control::UI => Ok(FrameType::UnnumberedInformation),
            _ => Err(DlmsError::FrameInvalid(format!(
                "Control field unknown: 0x{:02X}",
                byte
            ))),
        }
    }

    /// Control byte with the poll/final bit set.
    pub fn to_control_byte(&self) -> u8 {
        match *self {
            FrameType::Information {
                send_sequence,
                receive_sequence,
            } => (receive_sequence & 0x07) << 5 | control::POLL_FINAL | (send_sequence & 0x07) << 1,
            FrameType::ReceiveReady { receive_sequence } => {
                (receive_sequence & 0x07) << 5 | control::RR
            }
            FrameType::ReceiveNotReady { receive_sequence } => {
                (receive_sequence & 0x07) << 5 | control::RNR
            }
            FrameType::SetNormalResponseMode => control::SNRM,
            FrameType::Disconnect => control::DISC,
            FrameType::UnnumberedAcknowledge => control::UA,
            FrameType::DisconnectMode => control::DM,
            FrameType::FrameReject => control::FRMR,
            FrameType::UnnumberedInformation => control::UI,
        }
    }
}

/// One HDLC frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HdlcFrame {
    pub destination: HdlcAddress,
    pub source: HdlcAddress,
    pub frame_type: FrameType,
    /// More segments of the same PDU follow
    pub segmented: bool,
    pub information: Vec<u8>,
}

/// Total length of the frame starting at `data[0]`, flags included.
///
/// `None` when fewer than three bytes are available.
pub fn frame_length(data: &[u8]) -> Option<usize> {
    if data.len() < 3 {
        return None;
    }
    let length = u16::from_be_bytes([data[1], data[2]]) & LENGTH_MASK;
    Some(length as usize + 2)
}

/// `true` when `byte` can start a frame format field.
pub fn is_frame_format(byte: u8) -> bool {
    byte & 0xF0 == FRAME_FORMAT_TYPE
}

impl HdlcFrame {
    pub fn new(destination: HdlcAddress, source: HdlcAddress, frame_type: FrameType) -> Self {
        Self {
            destination,
            source,
            frame_type,
            segmented: false,
            information: Vec::new(),
        }
    }

    pub fn with_information(mut self, information: Vec<u8>, segmented: bool) -> Self {
        self.information = information;
        self.segmented = segmented;
        self
    }

    /// Bytes between the flags.
    fn inner_length(&self) -> usize {
        let header = 2 + self.destination.byte_length() + self.source.byte_length() + 1;
        if self.information.is_empty() {
            header + 2
        } else {
            header + 2 + self.information.len() + 2
        }
    }

    /// Serialize the frame, flags included.
    ///
    /// # Errors
    ///
    /// Fails when the frame does not fit the 11 bit length field.
    pub fn encode(&self) -> DlmsResult<Vec<u8>> {
        let length = self.inner_length();
        if length > LENGTH_MASK as usize {
            return Err(DlmsError::FrameInvalid(format!(
                "HDLC frame of {} bytes is too long",
                length
            )));
        }
        let mut out = Vec::with_capacity(length + 2);
        out.push(FLAG);
        let segmented = if self.segmented { SEGMENTATION_BIT } else { 0 };
        out.push(FRAME_FORMAT_TYPE | segmented | ((length >> 8) as u8 & 0x07));
        out.push(length as u8);
        out.extend_from_slice(&self.destination.encode());
        out.extend_from_slice(&self.source.encode());
        out.push(self.frame_type.to_control_byte());
        let hcs = fcs::checksum(&out[1..]);
        out.extend_from_slice(&hcs);
        if !self.information.is_empty() {
            out.extend_from_slice(&self.information);
            let frame_fcs = fcs::checksum(&out[1..]);
            out.extend_from_slice(&frame_fcs);
        }
        out.push(FLAG);
        Ok(out)
    }

    /// Parse one complete frame, flags included.
    ///
    /// # Errors
    ///
    /// Wrong flags or frame format, invalid addresses, unknown control
    /// bytes and check sequence mismatches.
    pub fn decode(frame: &[u8]) -> DlmsResult<Self> {
        let total = frame_length(frame)
            .ok_or_else(|| DlmsError::FrameInvalid("Frame too short".to_string()))?;
        if frame[0] != FLAG || frame.len() != total || frame[total - 1] != FLAG {
            return Err(DlmsError::FrameInvalid(format!(
                "Frame is not delimited by flags: {}",
                to_hex(frame)
            )));
        }
        if !is_frame_format(frame[1]) {
            return Err(DlmsError::FrameInvalid(format!(
                "Illegal frame format 0x{:02X}",
                frame[1]
            )));
        }
        let body = &frame[1..total - 1];
        let segmented = body[0] & SEGMENTATION_BIT != 0;
        let mut pos = 2;
        let (destination, len) = Self::read_address(&body[pos..])?;
        pos += len;
        let (source, len) = Self::read_address(&body[pos..])?;
        pos += len;
        let control_byte = *body
            .get(pos)
            .ok_or_else(|| DlmsError::FrameInvalid("Frame too short for control field".to_string()))?;
        let frame_type = FrameType::from_control_byte(control_byte)?;
        pos += 1;
        if body.len() < pos + 2 {
            return Err(DlmsError::FrameInvalid("Frame too short for HCS".to_string()));
        }
        let mut hcs = FcsCalc::new();
        hcs.update_bytes(&body[..pos + 2]);
        hcs.validate()
            .map_err(|e| DlmsError::FrameInvalid(format!("HCS: {}", e)))?;
        pos += 2;
        let information = if pos < body.len() {
            if body.len() < pos + 2 {
                return Err(DlmsError::FrameInvalid("Frame too short for FCS".to_string()));
            }
            let mut frame_fcs = FcsCalc::new();
            frame_fcs.update_bytes(body);
            frame_fcs
                .validate()
                .map_err(|e| DlmsError::FrameInvalid(format!("FCS: {}", e)))?;
            body[pos..body.len() - 2].to_vec()
        } else {
            Vec::new()
        };
        Ok(Self {
            destination,
            source,
            frame_type,
            segmented,
            information,
        })
    }

    fn read_address(data: &[u8]) -> DlmsResult<(HdlcAddress, usize)> {
        HdlcAddress::decode(data)?.ok_or_else(|| {
            DlmsError::FrameInvalid("HDLC address is not terminated".to_string())
        })
    }
}

impl fmt::Display for HdlcFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?} {} -> {}, {} bytes{}",
            self.frame_type,
            self.source,
            self.destination,
            self.information.len(),
            if self.segmented { ", segmented" } else { "" }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> HdlcAddress {
        HdlcAddress::new(1).unwrap()
    }

    fn client() -> HdlcAddress {
        HdlcAddress::client(0x10).unwrap()
    }

    #[test]
    fn test_control_bytes() {
        assert_eq!(
            FrameType::from_control_byte(0x93).unwrap(),
            FrameType::SetNormalResponseMode
        );
        assert_eq!(
            FrameType::from_control_byte(0x83).unwrap(),
            FrameType::SetNormalResponseMode
        );
        assert_eq!(
            FrameType::from_control_byte(0x32).unwrap(),
            FrameType::Information {
                send_sequence: 1,
                receive_sequence: 1
            }
        );
        assert_eq!(
            FrameType::from_control_byte(0x51).unwrap(),
            FrameType::ReceiveReady {
                receive_sequence: 2
            }
        );
        assert_eq!(FrameType::DisconnectMode.to_control_byte(), 0x1F);
        assert_eq!(
            FrameType::Information {
                send_sequence: 0,
                receive_sequence: 0
            }
            .to_control_byte(),
            0x10
        );
        assert!(FrameType::from_control_byte(0xFF).is_err());
    }

    #[test]
    fn test_snrm_without_information() {
        let frame = HdlcFrame::new(server(), client(), FrameType::SetNormalResponseMode);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes, vec![0x7E, 0xA0, 0x07, 0x03, 0x21, 0x93, 0x0F, 0x01, 0x7E]);
        assert_eq!(HdlcFrame::decode(&bytes).unwrap(), frame);
    }

    #[test]
    fn test_information_frame() {
        let info = vec![0xE6, 0xE6, 0x00, 0xC0, 0x01, 0xC1];
        let frame = HdlcFrame::new(
            server(),
            client(),
            FrameType::Information {
                send_sequence: 0,
                receive_sequence: 0,
            },
        )
        .with_information(info.clone(), false);
        let bytes = frame.encode().unwrap();
        assert_eq!(frame_length(&bytes), Some(bytes.len()));
        assert_eq!(bytes[1], 0xA0);
        assert_eq!(bytes[2] as usize, bytes.len() - 2);
        let decoded = HdlcFrame::decode(&bytes).unwrap();
        assert_eq!(decoded.information, info);
        assert!(!decoded.segmented);
    }

    #[test]
    fn test_segmented_flag() {
        let frame = HdlcFrame::new(
            client(),
            server(),
            FrameType::Information {
                send_sequence: 3,
                receive_sequence: 2,
            },
        )
        .with_information(vec![0xAA; 10], true);
        let bytes = frame.encode().unwrap();
        assert_eq!(bytes[1] & 0x08, 0x08);
        assert!(HdlcFrame::decode(&bytes).unwrap().segmented);
    }

    #[test]
    fn test_bad_check_sequences() {
        let frame = HdlcFrame::new(
            server(),
            client(),
            FrameType::Information {
                send_sequence: 0,
                receive_sequence: 0,
            },
        )
        .with_information(vec![1, 2, 3], false);
        let bytes = frame.encode().unwrap();
        let mut bad_fcs = bytes.clone();
        let n = bad_fcs.len();
        bad_fcs[n - 2] ^= 0xFF;
        assert!(HdlcFrame::decode(&bad_fcs).is_err());
        let mut bad_hcs = bytes;
        bad_hcs[6] ^= 0xFF;
        assert!(HdlcFrame::decode(&bad_hcs).is_err());
    }
}
