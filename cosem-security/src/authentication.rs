//! HLS challenge-response
//!
//! Both sides send a random challenge in the AARQ/AARE. Each side then
//! proves knowledge of the shared secret by returning `secure()` of the
//! challenge it received.

use crate::cipher::{gmac_invocation_counter, CipherContext};
use crate::encryption::{aes128_ecb_encrypt, gmac, SecurityControl};
use crate::mechanism::Authentication;
use cosem_core::{DlmsError, DlmsResult};
use md5::Md5;
use rand::Rng;
use sha1::Sha1;
use sha2::{Digest, Sha256};

pub const MIN_CHALLENGE_LENGTH: usize = 8;
pub const MAX_CHALLENGE_LENGTH: usize = 64;

/// Random challenge of 8 to 64 printable bytes.
pub fn generate_challenge() -> Vec<u8> {
    let mut rng = rand::thread_rng();
    let length = rng.gen_range(MIN_CHALLENGE_LENGTH..=MAX_CHALLENGE_LENGTH);
    (0..length).map(|_| rng.gen_range(0x21u8..0x7A)).collect()
}

fn hash<D: Digest>(challenge: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut digest = D::new();
    digest.update(challenge);
    digest.update(secret);
    digest.finalize().to_vec()
}

/// Proof of possession of the shared secret for `challenge`.
///
/// # Arguments
///
/// * `cipher` - keys for HLS-GMAC, ignored by the other mechanisms
/// * `ic` - invocation counter put in a GMAC proof
/// * `secret` - the password, or for GMAC the system title of the station
///   producing the proof
///
/// # Errors
///
/// Mechanisms without a proof (None, Low), GMAC without a cipher context
/// and invalid key material.
pub fn secure(
    cipher: Option<&CipherContext>,
    mechanism: Authentication,
    ic: u32,
    challenge: &[u8],
    secret: &[u8],
) -> DlmsResult<Vec<u8>> {
    match mechanism {
        Authentication::High => aes128_ecb_encrypt(secret, challenge),
        Authentication::HighMd5 => Ok(hash::<Md5>(challenge, secret)),
        Authentication::HighSha1 => Ok(hash::<Sha1>(challenge, secret)),
        Authentication::HighSha256 => Ok(hash::<Sha256>(challenge, secret)),
        Authentication::HighGmac => {
            let cipher = cipher.ok_or_else(|| {
                DlmsError::Security("HLS-GMAC needs a cipher context".to_string())
            })?;
            let control = SecurityControl::AUTHENTICATION_ONLY.to_byte();
            let mut iv = Vec::with_capacity(12);
            iv.extend_from_slice(secret);
            iv.extend_from_slice(&ic.to_be_bytes());
            let mut aad = Vec::with_capacity(1 + cipher.authentication_key().len() + challenge.len());
            aad.push(control);
            aad.extend_from_slice(cipher.authentication_key());
            aad.extend_from_slice(challenge);
            let tag = gmac(cipher.block_cipher_key(), &iv, &aad)?;

            let mut proof = Vec::with_capacity(5 + tag.len());
            proof.push(control);
            proof.extend_from_slice(&ic.to_be_bytes());
            proof.extend_from_slice(&tag);
            Ok(proof)
        }
        Authentication::None | Authentication::Low => Err(DlmsError::Security(format!(
            "Authentication {} has no challenge response",
            mechanism
        ))),
    }
}

/// Check the proof the peer returned for the challenge we sent.
///
/// For GMAC `secret` is ignored: the peer system title from `cipher` is
/// used and the invocation counter of the proof must be greater than the
/// last one accepted from that peer.
///
/// # Returns
///
/// `Ok(false)` when the proof does not match.
///
/// # Errors
///
/// Malformed GMAC proofs and replayed invocation counters.
pub fn verify_proof(
    cipher: Option<&mut CipherContext>,
    mechanism: Authentication,
    challenge: &[u8],
    secret: &[u8],
    proof: &[u8],
) -> DlmsResult<bool> {
    if mechanism != Authentication::HighGmac {
        let expected = secure(None, mechanism, 0, challenge, secret)?;
        return Ok(expected == proof);
    }
    let cipher = cipher
        .ok_or_else(|| DlmsError::Security("HLS-GMAC needs a cipher context".to_string()))?;
    let ic = gmac_invocation_counter(proof)?;
    let peer_title = cipher
        .source_system_title()
        .ok_or_else(|| DlmsError::Security("Peer system title unknown".to_string()))?
        .to_vec();
    let expected = secure(Some(&*cipher), mechanism, ic, challenge, &peer_title)?;
    if expected != proof {
        return Ok(false);
    }
    cipher.accept_peer_counter(ic)?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cosem_core::byte_buffer::to_hex;

    const CHALLENGE: &[u8] = b"ABCDEFGH";

    #[test]
    fn test_challenge_is_printable() {
        for _ in 0..20 {
            let challenge = generate_challenge();
            assert!((MIN_CHALLENGE_LENGTH..=MAX_CHALLENGE_LENGTH).contains(&challenge.len()));
            assert!(challenge.iter().all(|b| (0x21..0x7A).contains(b)));
        }
    }

    #[test]
    fn test_hash_mechanisms() {
        let md5 = secure(None, Authentication::HighMd5, 0, CHALLENGE, b"Gurux").unwrap();
        assert_eq!(to_hex(&md5).replace(' ', ""), "EECF434667CBFF54F5E9661E8EEB361E");
        let sha1 = secure(None, Authentication::HighSha1, 0, CHALLENGE, b"Gurux").unwrap();
        assert_eq!(
            to_hex(&sha1).replace(' ', ""),
            "544F909D1C139C67B04994A61FE2D932E225F804"
        );
        let sha256 = secure(None, Authentication::HighSha256, 0, CHALLENGE, b"Gurux").unwrap();
        assert_eq!(
            to_hex(&sha256).replace(' ', ""),
            "B82D8286882DCBBF84CEECDF59E909B63923D04BC8D921CE31034B5CB5824939"
        );
    }

    #[test]
    fn test_high_uses_aes_ecb() {
        let key: Vec<u8> = (0..16).collect();
        let proof = secure(None, Authentication::High, 0, CHALLENGE, &key).unwrap();
        assert_eq!(
            to_hex(&proof),
            "90 A6 A1 A5 7D A6 4D 00 FC 09 C7 F4 99 BC 49 FB"
        );
    }

    #[test]
    fn test_gmac_proof_layout() {
        let ctx = CipherContext::default();
        let proof = secure(Some(&ctx), Authentication::HighGmac, 1, CHALLENGE, b"GRX12345").unwrap();
        assert_eq!(
            to_hex(&proof),
            "10 00 00 00 01 B7 CE DB 63 69 53 9E CE 91 BD 31 EB"
        );
        assert!(secure(None, Authentication::HighGmac, 1, CHALLENGE, b"GRX12345").is_err());
    }

    #[test]
    fn test_no_proof_for_low() {
        assert!(secure(None, Authentication::Low, 0, CHALLENGE, b"pw").is_err());
        assert!(secure(None, Authentication::None, 0, CHALLENGE, b"pw").is_err());
    }

    #[test]
    fn test_verify_proof() {
        let proof = secure(None, Authentication::HighSha256, 0, CHALLENGE, b"secret").unwrap();
        assert!(verify_proof(None, Authentication::HighSha256, CHALLENGE, b"secret", &proof).unwrap());
        assert!(!verify_proof(None, Authentication::HighSha256, CHALLENGE, b"wrong", &proof).unwrap());
    }

    #[test]
    fn test_verify_gmac_rejects_replay() {
        let client = CipherContext::new(b"CLIENT01", &[7; 16], &[9; 16]).unwrap();
        let mut server = CipherContext::new(b"SERVER01", &[7; 16], &[9; 16]).unwrap();
        server.set_source_system_title(client.system_title()).unwrap();

        let proof = secure(Some(&client), Authentication::HighGmac, 10, CHALLENGE, client.system_title())
            .unwrap();
        assert!(verify_proof(Some(&mut server), Authentication::HighGmac, CHALLENGE, &[], &proof).unwrap());
        assert_eq!(server.last_peer_counter(), Some(10));
        assert!(verify_proof(Some(&mut server), Authentication::HighGmac, CHALLENGE, &[], &proof).is_err());

        let stale = secure(Some(&client), Authentication::HighGmac, 9, CHALLENGE, client.system_title())
            .unwrap();
        assert!(verify_proof(Some(&mut server), Authentication::HighGmac, CHALLENGE, &[], &stale).is_err());
    }
}
