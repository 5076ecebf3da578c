//! Wrapper session layer for DLMS/COSEM over TCP/UDP
//!
//! Every PDU is preceded by an eight byte big-endian header:
//! version (always 1), source wPort, destination wPort and PDU length.

use bytes::{Buf, Bytes, BytesMut};
use cosem_core::{DlmsError, DlmsResult};

/// Wrapper header length
pub const WRAPPER_HEADER_LENGTH: usize = 8;
pub const WRAPPER_VERSION: u16 = 1;

/// Wrapper header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WrapperHeader {
    source: u16,
    destination: u16,
    length: u16,
}

impl WrapperHeader {
    pub fn new(source: u16, destination: u16, length: u16) -> Self {
        Self {
            source,
            destination,
            length,
        }
    }

    /// Encode header to bytes (big-endian)
    pub fn encode(&self) -> [u8; WRAPPER_HEADER_LENGTH] {
        let mut result = [0u8; WRAPPER_HEADER_LENGTH];
        result[..2].copy_from_slice(&WRAPPER_VERSION.to_be_bytes());
        result[2..4].copy_from_slice(&self.source.to_be_bytes());
        result[4..6].copy_from_slice(&self.destination.to_be_bytes());
        result[6..].copy_from_slice(&self.length.to_be_bytes());
        result
    }

    /// Decode header from bytes.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when fewer than eight bytes are available.
    ///
    /// # Errors
    ///
    /// Any version other than 1.
    pub fn decode(data: &[u8]) -> DlmsResult<Option<Self>> {
        if data.len() < WRAPPER_HEADER_LENGTH {
            return Ok(None);
        }
        let version = u16::from_be_bytes([data[0], data[1]]);
        if version != WRAPPER_VERSION {
            return Err(DlmsError::FrameInvalid(format!(
                "Header version was {}, this stack is only compatible to version 1",
                version
            )));
        }
        Ok(Some(Self {
            source: u16::from_be_bytes([data[2], data[3]]),
            destination: u16::from_be_bytes([data[4], data[5]]),
            length: u16::from_be_bytes([data[6], data[7]]),
        }))
    }

    pub fn source(&self) -> u16 {
        self.source
    }

    pub fn destination(&self) -> u16 {
        self.destination
    }

    /// Get payload length
    pub fn payload_length(&self) -> usize {
        self.length as usize
    }
}

/// Wrapper endpoint
///
/// `remote` is `None` on a server until the first PDU names the client.
#[derive(Debug, Clone)]
pub struct Wrapper {
    local: u16,
    remote: Option<u16>,
}

impl Wrapper {
    pub fn new(local: u16, remote: Option<u16>) -> Self {
        Self { local, remote }
    }

    pub fn local(&self) -> u16 {
        self.local
    }

    pub fn remote(&self) -> Option<u16> {
        self.remote
    }

    /// Prefix `pdu` with a header addressed to the remote wPort.
    ///
    /// # Errors
    ///
    /// Fails when the remote address is unknown or the PDU is longer than
    /// 65535 bytes.
    pub fn wrap(&self, pdu: &[u8]) -> DlmsResult<Vec<u8>> {
        let remote = self
            .remote
            .ok_or_else(|| DlmsError::Protocol("Wrapper remote address unknown".to_string()))?;
        let length = u16::try_from(pdu.len()).map_err(|_| {
            DlmsError::InvalidData(format!("PDU of {} bytes does not fit a wrapper frame", pdu.len()))
        })?;
        let mut result = Vec::with_capacity(WRAPPER_HEADER_LENGTH + pdu.len());
        result.extend_from_slice(&WrapperHeader::new(self.local, remote, length).encode());
        result.extend_from_slice(pdu);
        Ok(result)
    }

    /// Take the next PDU addressed to this endpoint from `buffer`.
    ///
    /// PDUs for other wPorts are logged and dropped. An incomplete PDU is
    /// left in the buffer and `Ok(None)` returned.
    pub fn unwrap(&mut self, buffer: &mut BytesMut) -> DlmsResult<Option<Bytes>> {
        loop {
            let header = match WrapperHeader::decode(&buffer[..])? {
                Some(header) => header,
                None => return Ok(None),
            };
            let total = WRAPPER_HEADER_LENGTH + header.payload_length();
            if buffer.len() < total {
                return Ok(None);
            }
            let mut frame = buffer.split_to(total);
            let source_ok = self.remote.map_or(true, |remote| remote == header.source());
            if header.destination() != self.local || !source_ok {
                log::debug!(
                    "Skipping wrapper PDU {} -> {}, expected {:?} -> {}",
                    header.source(),
                    header.destination(),
                    self.remote,
                    self.local
                );
                continue;
            }
            if self.remote.is_none() {
                self.remote = Some(header.source());
            }
            frame.advance(WRAPPER_HEADER_LENGTH);
            return Ok(Some(frame.freeze()));
        }
    }
}
