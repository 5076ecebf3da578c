//! Cutting HDLC frames out of a receive buffer

use crate::hdlc::frame::{frame_length, is_frame_format, HdlcFrame, FLAG};
use bytes::{Buf, BytesMut};
use cosem_core::byte_buffer::to_hex;
use cosem_core::DlmsResult;

/// Flags, format, one byte addresses, control and HCS
const MIN_FRAME_LENGTH: usize = 9;

/// HDLC message decoder
pub struct HdlcMessageDecoder;

impl HdlcMessageDecoder {
    /// Take the next complete frame from `buffer`.
    ///
    /// Bytes before an opening flag are discarded. A closing flag is left
    /// in the buffer because peers may share it with the next frame.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when the buffer does not yet hold a whole frame. Nothing
    /// of an incomplete frame is consumed.
    ///
    /// # Errors
    ///
    /// A frame that fails its checks is consumed and reported, so the
    /// caller can continue with the rest of the buffer.
    pub fn next_frame(buffer: &mut BytesMut) -> DlmsResult<Option<HdlcFrame>> {
        loop {
            match buffer.iter().position(|b| *b == FLAG) {
                Some(0) => {}
                Some(garbage) => {
                    log::trace!("Dropping {} bytes before HDLC flag", garbage);
                    buffer.advance(garbage);
                }
                None => {
                    buffer.clear();
                    return Ok(None);
                }
            }
            if buffer.len() < 3 {
                return Ok(None);
            }
            if buffer[1] == FLAG || !is_frame_format(buffer[1]) {
                buffer.advance(1);
                continue;
            }
            let total = match frame_length(&buffer[..]) {
                Some(total) if total >= MIN_FRAME_LENGTH => total,
                _ => {
                    buffer.advance(1);
                    continue;
                }
            };
            if buffer.len() < total {
                return Ok(None);
            }
            let result = HdlcFrame::decode(&buffer[..total]);
            if result.is_err() {
                log::debug!("Invalid HDLC frame: {}", to_hex(&buffer[..total]));
            }
            buffer.advance(total - 1);
            return result.map(Some);
        }
    }
}
