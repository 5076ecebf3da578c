//! SNRM/UA link parameter negotiation

use cosem_core::{ByteBuffer, DlmsError, DlmsResult};

const FORMAT_IDENTIFIER: u8 = 0x81;
const GROUP_IDENTIFIER: u8 = 0x80;
const MAX_INFO_TX: u8 = 0x05;
const MAX_INFO_RX: u8 = 0x06;
const WINDOW_SIZE_TX: u8 = 0x07;
const WINDOW_SIZE_RX: u8 = 0x08;

pub const DEFAULT_MAX_INFO: u16 = 128;
pub const DEFAULT_WINDOW_SIZE: u8 = 1;

/// HDLC link limits seen from the local station
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Largest information field this station sends
    pub max_info_tx: u16,
    /// Largest information field this station accepts
    pub max_info_rx: u16,
    pub window_size_tx: u8,
    pub window_size_rx: u8,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_info_tx: DEFAULT_MAX_INFO,
            max_info_rx: DEFAULT_MAX_INFO,
            window_size_tx: DEFAULT_WINDOW_SIZE,
            window_size_rx: DEFAULT_WINDOW_SIZE,
        }
    }
}

fn put_parameter(buff: &mut ByteBuffer, id: u8, value: u32) {
    buff.set_u8(id);
    if value < 0x100 {
        buff.set_u8(1);
        buff.set_u8(value as u8);
    } else if value < 0x10000 {
        buff.set_u8(2);
        buff.set_u16(value as u16);
    } else {
        buff.set_u8(4);
        buff.set_u32(value);
    }
}

impl Limits {
    /// Information field of an SNRM or UA frame.
    ///
    /// Only values that differ from the defaults are sent; when all are
    /// default the result is empty and the frame carries no information.
    pub fn encode(&self) -> Vec<u8> {
        let defaults = Limits::default();
        let mut params = ByteBuffer::new();
        if self.max_info_tx != defaults.max_info_tx {
            put_parameter(&mut params, MAX_INFO_TX, self.max_info_tx as u32);
        }
        if self.max_info_rx != defaults.max_info_rx {
            put_parameter(&mut params, MAX_INFO_RX, self.max_info_rx as u32);
        }
        if self.window_size_tx != defaults.window_size_tx {
            put_parameter(&mut params, WINDOW_SIZE_TX, self.window_size_tx as u32);
        }
        if self.window_size_rx != defaults.window_size_rx {
            put_parameter(&mut params, WINDOW_SIZE_RX, self.window_size_rx as u32);
        }
        if params.is_empty() {
            return Vec::new();
        }
        let mut out = ByteBuffer::with_capacity(params.size() + 3);
        out.set_u8(FORMAT_IDENTIFIER);
        out.set_u8(GROUP_IDENTIFIER);
        out.set_u8(params.size() as u8);
        out.set_slice(params.data());
        out.into_vec()
    }

    /// Parse the information field of an SNRM or UA frame as sent by the
    /// peer, from the peer's point of view. Missing values keep their
    /// defaults.
    ///
    /// # Errors
    ///
    /// Wrong format/group identifiers, unknown parameter widths and
    /// truncated input.
    pub fn decode(data: &[u8]) -> DlmsResult<Self> {
        let mut limits = Limits::default();
        if data.is_empty() {
            return Ok(limits);
        }
        let mut buff = ByteBuffer::from_slice(data);
        if buff.get_u8()? != FORMAT_IDENTIFIER || buff.get_u8()? != GROUP_IDENTIFIER {
            return Err(DlmsError::FrameInvalid(
                "Invalid HDLC parameter format".to_string(),
            ));
        }
        let length = buff.get_u8()? as usize;
        if buff.available() < length {
            return Err(DlmsError::FrameInvalid(
                "Truncated HDLC parameters".to_string(),
            ));
        }
        while buff.available() > 0 {
            let id = buff.get_u8()?;
            let value = match buff.get_u8()? {
                1 => buff.get_u8()? as u32,
                2 => buff.get_u16()? as u32,
                4 => buff.get_u32()?,
                other => {
                    return Err(DlmsError::FrameInvalid(format!(
                        "Invalid HDLC parameter width {}",
                        other
                    )))
                }
            };
            match id {
                MAX_INFO_TX => limits.max_info_tx = value.min(u16::MAX as u32) as u16,
                MAX_INFO_RX => limits.max_info_rx = value.min(u16::MAX as u32) as u16,
                WINDOW_SIZE_TX => limits.window_size_tx = value.min(7) as u8,
                WINDOW_SIZE_RX => limits.window_size_rx = value.min(7) as u8,
                other => log::debug!("Unknown HDLC parameter 0x{:02X}", other),
            }
        }
        Ok(limits)
    }

    /// Limits of the peer converted to the local point of view.
    pub fn swapped(&self) -> Self {
        Self {
            max_info_tx: self.max_info_rx,
            max_info_rx: self.max_info_tx,
            window_size_tx: self.window_size_rx,
            window_size_rx: self.window_size_tx,
        }
    }

    /// Agree on limits from what this station supports and what the peer
    /// proposed (peer's point of view).
    pub fn negotiate(&self, peer: &Limits) -> Self {
        let peer = peer.swapped();
        Self {
            max_info_tx: self.max_info_tx.min(peer.max_info_tx),
            max_info_rx: self.max_info_rx.min(peer.max_info_rx),
            window_size_tx: self.window_size_tx.min(peer.window_size_tx),
            window_size_rx: self.window_size_rx.min(peer.window_size_rx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_send_nothing() {
        assert!(Limits::default().encode().is_empty());
        assert_eq!(Limits::decode(&[]).unwrap(), Limits::default());
    }

    #[test]
    fn test_only_changed_values() {
        let limits = Limits {
            max_info_tx: 0x200,
            max_info_rx: 128,
            window_size_tx: 1,
            window_size_rx: 7,
        };
        assert_eq!(
            limits.encode(),
            vec![0x81, 0x80, 0x07, 0x05, 0x02, 0x02, 0x00, 0x08, 0x01, 0x07]
        );
        assert_eq!(Limits::decode(&limits.encode()).unwrap(), limits);
    }

    #[test]
    fn test_four_byte_window() {
        let data = [
            0x81, 0x80, 0x12, 0x05, 0x01, 0xF8, 0x06, 0x01, 0xF8, 0x07, 0x04, 0x00, 0x00, 0x00,
            0x01, 0x08, 0x04, 0x00, 0x00, 0x00, 0x01,
        ];
        let limits = Limits::decode(&data).unwrap();
        assert_eq!(limits.max_info_tx, 0xF8);
        assert_eq!(limits.window_size_rx, 1);
    }

    #[test]
    fn test_ua_is_swapped() {
        let ours = Limits {
            max_info_tx: 1024,
            max_info_rx: 1024,
            ..Limits::default()
        };
        let peer = Limits {
            max_info_tx: 256,
            max_info_rx: 512,
            ..Limits::default()
        };
        let agreed = ours.negotiate(&peer);
        assert_eq!(agreed.max_info_tx, 512);
        assert_eq!(agreed.max_info_rx, 256);
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(Limits::decode(&[0x81, 0x81, 0x00]).is_err());
        assert!(Limits::decode(&[0x81, 0x80, 0x03, 0x05, 0x03, 0x00]).is_err());
        assert!(Limits::decode(&[0x81, 0x80, 0x05, 0x05]).is_err());
    }
}
