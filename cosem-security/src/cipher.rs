//! Keys, system titles and invocation counters of one association

use crate::encryption::SecurityControl;
use cosem_core::{ByteBuffer, DlmsError, DlmsResult};
use std::collections::BTreeMap;

pub const SYSTEM_TITLE_LENGTH: usize = 8;
pub const KEY_LENGTH: usize = 16;

/// Security context used by HLS-GMAC
///
/// Carries the local system title and keys, the local invocation counter,
/// the system title of the current peer and the last invocation counter
/// accepted from every peer seen with these keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherContext {
    system_title: Vec<u8>,
    block_cipher_key: Vec<u8>,
    authentication_key: Vec<u8>,
    invocation_counter: u32,
    source_system_title: Option<Vec<u8>>,
    /// Last accepted counter by peer system title
    peer_counters: BTreeMap<Vec<u8>, u32>,
}

impl Default for CipherContext {
    fn default() -> Self {
        Self {
            system_title: b"COS12345".to_vec(),
            block_cipher_key: (0x00..=0x0F).collect(),
            authentication_key: (0xD0..=0xDF).collect(),
            invocation_counter: 0,
            source_system_title: None,
            peer_counters: BTreeMap::new(),
        }
    }
}

fn check_length(name: &str, value: &[u8], expected: usize) -> DlmsResult<()> {
    if value.len() != expected {
        return Err(DlmsError::Security(format!(
            "Invalid {} length: expected {} bytes, got {}",
            name,
            expected,
            value.len()
        )));
    }
    Ok(())
}

impl CipherContext {
    /// # Errors
    ///
    /// The system title must be 8 bytes and both keys 16 bytes.
    pub fn new(
        system_title: &[u8],
        block_cipher_key: &[u8],
        authentication_key: &[u8],
    ) -> DlmsResult<Self> {
        check_length("system title", system_title, SYSTEM_TITLE_LENGTH)?;
        check_length("block cipher key", block_cipher_key, KEY_LENGTH)?;
        check_length("authentication key", authentication_key, KEY_LENGTH)?;
        Ok(Self {
            system_title: system_title.to_vec(),
            block_cipher_key: block_cipher_key.to_vec(),
            authentication_key: authentication_key.to_vec(),
            ..Self::default()
        })
    }

    pub fn system_title(&self) -> &[u8] {
        &self.system_title
    }

    pub fn block_cipher_key(&self) -> &[u8] {
        &self.block_cipher_key
    }

    pub fn authentication_key(&self) -> &[u8] {
        &self.authentication_key
    }

    /// Replace both keys. Counters accepted under the old keys are dropped.
    ///
    /// # Errors
    ///
    /// Keys that are not 16 bytes long.
    pub fn set_keys(&mut self, block_cipher_key: &[u8], authentication_key: &[u8]) -> DlmsResult<()> {
        check_length("block cipher key", block_cipher_key, KEY_LENGTH)?;
        check_length("authentication key", authentication_key, KEY_LENGTH)?;
        if self.block_cipher_key != block_cipher_key || self.authentication_key != authentication_key {
            self.peer_counters.clear();
        }
        self.block_cipher_key = block_cipher_key.to_vec();
        self.authentication_key = authentication_key.to_vec();
        Ok(())
    }

    pub fn invocation_counter(&self) -> u32 {
        self.invocation_counter
    }

    pub fn set_invocation_counter(&mut self, value: u32) {
        self.invocation_counter = value;
    }

    /// Take the invocation counter for the next protected message.
    ///
    /// # Errors
    ///
    /// The counter is exhausted; the keys must be changed.
    pub fn next_invocation_counter(&mut self) -> DlmsResult<u32> {
        let value = self.invocation_counter;
        self.invocation_counter = value
            .checked_add(1)
            .ok_or_else(|| DlmsError::Security("Invocation counter exhausted".to_string()))?;
        Ok(value)
    }

    /// System title of the peer, learned from the AARQ or AARE.
    pub fn source_system_title(&self) -> Option<&[u8]> {
        self.source_system_title.as_deref()
    }

    pub fn set_source_system_title(&mut self, title: &[u8]) -> DlmsResult<()> {
        check_length("system title", title, SYSTEM_TITLE_LENGTH)?;
        self.source_system_title = Some(title.to_vec());
        Ok(())
    }

    /// Last counter accepted from the current peer.
    pub fn last_peer_counter(&self) -> Option<u32> {
        let title = self.source_system_title.as_deref()?;
        self.peer_counters.get(title).copied()
    }

    /// Record an invocation counter received from the peer.
    ///
    /// # Errors
    ///
    /// The peer is unknown or the counter is not greater than the last one
    /// accepted from it.
    pub fn accept_peer_counter(&mut self, counter: u32) -> DlmsResult<()> {
        let title = self
            .source_system_title
            .clone()
            .ok_or_else(|| DlmsError::Security("Peer system title unknown".to_string()))?;
        if let Some(&last) = self.peer_counters.get(&title) {
            if counter <= last {
                log::warn!(
                    "Replayed invocation counter {} (last accepted {})",
                    counter,
                    last
                );
                return Err(DlmsError::Security(format!(
                    "Invocation counter {} is not greater than {}",
                    counter, last
                )));
            }
        }
        self.peer_counters.insert(title, counter);
        Ok(())
    }

    /// Forget the peer of the ended association. Accepted counters are
    /// kept so that a peer cannot go back on a new association.
    pub fn reset_peer(&mut self) {
        self.source_system_title = None;
    }
}

/// Invocation counter carried in a GMAC proof (`SC || IC || tag`).
///
/// # Errors
///
/// Proofs shorter than five bytes or with a security control other than
/// authentication only.
pub fn gmac_invocation_counter(proof: &[u8]) -> DlmsResult<u32> {
    let mut buff = ByteBuffer::from_slice(proof);
    let control = SecurityControl::from_byte(buff.get_u8()?);
    if control != SecurityControl::AUTHENTICATION_ONLY {
        return Err(DlmsError::Security(format!(
            "Unexpected security control 0x{:02X}",
            control.to_byte()
        )));
    }
    buff.get_u32()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths_checked() {
        assert!(CipherContext::new(b"short", &[0; 16], &[0; 16]).is_err());
        assert!(CipherContext::new(b"ABCDEFGH", &[0; 15], &[0; 16]).is_err());
        let ctx = CipherContext::new(b"ABCDEFGH", &[1; 16], &[2; 16]).unwrap();
        assert_eq!(ctx.system_title(), b"ABCDEFGH");
        assert_eq!(ctx.invocation_counter(), 0);
    }

    #[test]
    fn test_invocation_counter_advances() {
        let mut ctx = CipherContext::default();
        assert_eq!(ctx.next_invocation_counter().unwrap(), 0);
        assert_eq!(ctx.next_invocation_counter().unwrap(), 1);
        ctx.set_invocation_counter(u32::MAX);
        assert!(ctx.next_invocation_counter().is_err());
    }

    #[test]
    fn test_peer_counter_must_increase() {
        let mut ctx = CipherContext::default();
        ctx.set_source_system_title(b"PEER0001").unwrap();
        ctx.accept_peer_counter(5).unwrap();
        assert!(ctx.accept_peer_counter(5).is_err());
        assert!(ctx.accept_peer_counter(4).is_err());
        ctx.accept_peer_counter(6).unwrap();
        assert_eq!(ctx.last_peer_counter(), Some(6));

        // A different peer starts over
        ctx.set_source_system_title(b"PEER0002").unwrap();
        ctx.accept_peer_counter(1).unwrap();

        // the first peer is still remembered after a new association
        ctx.reset_peer();
        assert_eq!(ctx.last_peer_counter(), None);
        assert!(ctx.accept_peer_counter(7).is_err());
        ctx.set_source_system_title(b"PEER0001").unwrap();
        assert_eq!(ctx.last_peer_counter(), Some(6));
        assert!(ctx.accept_peer_counter(2).is_err());
        ctx.accept_peer_counter(7).unwrap();
    }

    #[test]
    fn test_new_keys_forget_counters() {
        let mut ctx = CipherContext::default();
        ctx.set_source_system_title(b"PEER0001").unwrap();
        ctx.accept_peer_counter(100).unwrap();

        let (block, auth) = (ctx.block_cipher_key().to_vec(), ctx.authentication_key().to_vec());
        ctx.set_keys(&block, &auth).unwrap();
        assert_eq!(ctx.last_peer_counter(), Some(100));

        ctx.set_keys(&[0x11; 16], &[0x22; 16]).unwrap();
        assert_eq!(ctx.last_peer_counter(), None);
        ctx.accept_peer_counter(1).unwrap();
        assert!(ctx.set_keys(&[0x11; 15], &[0x22; 16]).is_err());
    }

    #[test]
    fn test_gmac_invocation_counter() {
        let proof = [0x10, 0x00, 0x00, 0x01, 0x02, 0xAA];
        assert_eq!(gmac_invocation_counter(&proof).unwrap(), 0x0102);
        assert!(gmac_invocation_counter(&[0x30, 0, 0, 0, 1]).is_err());
        assert!(gmac_invocation_counter(&[0x10, 0]).is_err());
    }
}
