//! Security module for DLMS/COSEM protocol
//!
//! Authentication mechanisms, challenge generation and the `secure()`
//! transform used by the HLS handshake, plus the cipher context that holds
//! keys, system titles and invocation counters.

pub mod authentication;
pub mod cipher;
pub mod encryption;
pub mod mechanism;

pub use authentication::{generate_challenge, secure, verify_proof};
pub use cipher::{gmac_invocation_counter, CipherContext};
pub use encryption::SecurityControl;
pub use mechanism::Authentication;
