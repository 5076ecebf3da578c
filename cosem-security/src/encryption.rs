//! AES primitives used by the HLS mechanisms

use aes::Aes128;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes128Gcm, Nonce};
use cipher::generic_array::GenericArray;
use cipher::BlockEncrypt;
use cosem_core::{DlmsError, DlmsResult};

pub const AES_BLOCK_SIZE: usize = 16;
/// Length of the truncated GMAC tag
pub const GMAC_TAG_LENGTH: usize = 12;

/// Security control byte, authentication only and suite 0
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecurityControl {
    byte: u8,
}

impl SecurityControl {
    pub const AUTHENTICATION_ONLY: SecurityControl = SecurityControl { byte: 0x10 };

    pub fn from_byte(byte: u8) -> Self {
        Self { byte }
    }

    pub fn to_byte(&self) -> u8 {
        self.byte
    }

    /// Get security suite ID
    pub fn security_suite_id(&self) -> u8 {
        self.byte & 0x0F
    }

    pub fn is_authenticated(&self) -> bool {
        (self.byte & 0x10) != 0
    }

    pub fn is_encrypted(&self) -> bool {
        (self.byte & 0x20) != 0
    }
}

/// Encrypt `data` with AES-128 in ECB mode.
///
/// The data is zero padded to the block size and the key is zero padded
/// to 16 bytes.
///
/// # Errors
///
/// Keys longer than 16 bytes.
pub fn aes128_ecb_encrypt(key: &[u8], data: &[u8]) -> DlmsResult<Vec<u8>> {
    if key.len() > AES_BLOCK_SIZE {
        return Err(DlmsError::Security(format!(
            "Invalid AES-128 key length: expected at most 16 bytes, got {}",
            key.len()
        )));
    }
    let mut padded_key = [0u8; AES_BLOCK_SIZE];
    padded_key[..key.len()].copy_from_slice(key);
    let cipher = Aes128::new(GenericArray::from_slice(&padded_key));

    let blocks = data.len().div_ceil(AES_BLOCK_SIZE).max(1);
    let mut out = vec![0u8; blocks * AES_BLOCK_SIZE];
    out[..data.len()].copy_from_slice(data);
    for block in out.chunks_mut(AES_BLOCK_SIZE) {
        cipher.encrypt_block(GenericArray::from_mut_slice(block));
    }
    Ok(out)
}

/// AES-GMAC tag (AES-GCM over an empty plaintext) truncated to 12 bytes.
///
/// # Arguments
///
/// * `key` - block cipher key, 16 bytes
/// * `iv` - system title followed by the invocation counter, 12 bytes
/// * `aad` - authenticated data
pub fn gmac(key: &[u8], iv: &[u8], aad: &[u8]) -> DlmsResult<[u8; GMAC_TAG_LENGTH]> {
    if key.len() != AES_BLOCK_SIZE {
        return Err(DlmsError::Security(format!(
            "Invalid AES-128 key length: expected 16 bytes, got {}",
            key.len()
        )));
    }
    if iv.len() != 12 {
        return Err(DlmsError::Security(format!(
            "Invalid nonce length: expected 12 bytes, got {}",
            iv.len()
        )));
    }
    let cipher = Aes128Gcm::new_from_slice(key)
        .map_err(|e| DlmsError::Security(format!("Failed to create cipher: {}", e)))?;
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(iv), aad, &mut [])
        .map_err(|e| DlmsError::Security(format!("GMAC failed: {}", e)))?;
    let mut out = [0u8; GMAC_TAG_LENGTH];
    out.copy_from_slice(&tag[..GMAC_TAG_LENGTH]);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosem_core::byte_buffer::to_hex;

    #[test]
    fn test_ecb_pads_challenge() {
        let key: Vec<u8> = (0..16).collect();
        let out = aes128_ecb_encrypt(&key, b"ABCDEFGH").unwrap();
        assert_eq!(out.len(), 16);
        assert_eq!(to_hex(&out), "90 A6 A1 A5 7D A6 4D 00 FC 09 C7 F4 99 BC 49 FB");
        assert!(aes128_ecb_encrypt(&[0u8; 17], b"x").is_err());
    }

    #[test]
    fn test_security_control() {
        let ctrl = SecurityControl::AUTHENTICATION_ONLY;
        assert!(ctrl.is_authenticated());
        assert!(!ctrl.is_encrypted());
        assert_eq!(ctrl.security_suite_id(), 0);
        assert_eq!(SecurityControl::from_byte(0x30).to_byte(), 0x30);
    }

    #[test]
    fn test_gmac_rejects_bad_lengths() {
        assert!(gmac(&[0u8; 15], &[0u8; 12], b"").is_err());
        assert!(gmac(&[0u8; 16], &[0u8; 8], b"").is_err());
    }
}
