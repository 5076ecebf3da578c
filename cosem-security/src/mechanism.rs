//! Authentication mechanisms

use cosem_core::{DlmsError, DlmsResult};
use std::fmt;

/// Authentication mechanism, numbered as the last arc of the mechanism
/// name OID `2.16.756.5.8.2.x`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Authentication {
    /// No authentication used
    #[default]
    None = 0,
    /// Authentication of the client by sending a shared password as secret
    Low = 1,
    /// Challenge encrypted with AES-128 using the shared secret as key
    High = 2,
    HighMd5 = 3,
    HighSha1 = 4,
    /// Challenge authenticated with AES-GMAC, the secret is the system title
    HighGmac = 5,
    HighSha256 = 6,
}

impl Authentication {
    /// Get mechanism ID
    pub fn id(&self) -> u8 {
        *self as u8
    }

    /// Get mechanism from ID
    pub fn from_id(id: u8) -> DlmsResult<Self> {
        match id {
            0 => Ok(Authentication::None),
            1 => Ok(Authentication::Low),
            2 => Ok(Authentication::High),
            3 => Ok(Authentication::HighMd5),
            4 => Ok(Authentication::HighSha1),
            5 => Ok(Authentication::HighGmac),
            6 => Ok(Authentication::HighSha256),
            _ => Err(DlmsError::Security(format!(
                "Invalid authentication mechanism ID: {}",
                id
            ))),
        }
    }

    /// `true` for the challenge-response (HLS) mechanisms
    pub fn is_high_level(&self) -> bool {
        !matches!(self, Authentication::None | Authentication::Low)
    }
}

impl fmt::Display for Authentication {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Authentication::None => "None",
            Authentication::Low => "Low",
            Authentication::High => "High",
            Authentication::HighMd5 => "HighMD5",
            Authentication::HighSha1 => "HighSHA1",
            Authentication::HighGmac => "HighGMAC",
            Authentication::HighSha256 => "HighSHA256",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mechanism_ids() {
        for id in 0..=6 {
            assert_eq!(Authentication::from_id(id).unwrap().id(), id);
        }
        assert!(Authentication::from_id(7).is_err());
        assert!(!Authentication::Low.is_high_level());
        assert!(Authentication::HighGmac.is_high_level());
    }
}
