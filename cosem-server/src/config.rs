//! Server configuration

use cosem_application::{Quirks, Settings};
use cosem_asn1::{CodecOptions, Conformance};
use cosem_core::{DlmsResult, InterfaceType};
use cosem_security::{Authentication, CipherContext};
use cosem_session::{HdlcAddress, Limits};

/// Everything one logical device needs to answer clients
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Logical device. Upper HDLC address or wrapper wPort.
    pub logical_address: u16,
    /// Lower HDLC address, not used with the wrapper
    pub physical_address: u16,
    /// Byte length of the HDLC address, `None` for the shortest
    pub address_size: Option<usize>,
    pub interface_type: InterfaceType,
    pub use_logical_name_referencing: bool,
    /// Mechanism a client must use to associate
    pub authentication: Authentication,
    /// LLS password or HLS shared secret
    pub password: Vec<u8>,
    /// Largest PDU the server accepts, announced in the AARE
    pub max_receive_pdu_size: u16,
    pub dlms_version: u8,
    /// Supported conformance, `None` for the default of the referencing
    pub conformance: Option<Conformance>,
    pub limits: Limits,
    /// System title and keys, needed for HLS-GMAC
    pub cipher: CipherContext,
    /// Fixed server challenge instead of a random one
    pub stoc_challenge: Option<Vec<u8>>,
    pub quirks: Quirks,
    pub codec: CodecOptions,
    pub starting_block_index: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            logical_address: 1,
            physical_address: 0x11,
            address_size: None,
            interface_type: InterfaceType::Hdlc,
            use_logical_name_referencing: true,
            authentication: Authentication::None,
            password: Vec::new(),
            max_receive_pdu_size: 1024,
            dlms_version: 6,
            conformance: None,
            limits: Limits::default(),
            cipher: CipherContext::default(),
            stoc_challenge: None,
            quirks: Quirks::default(),
            codec: CodecOptions::default(),
            starting_block_index: 1,
        }
    }
}

impl ServerConfig {
    /// HDLC address the server answers to.
    ///
    /// # Errors
    ///
    /// Addresses that do not fit the requested size.
    pub fn hdlc_address(&self) -> DlmsResult<HdlcAddress> {
        HdlcAddress::server(self.logical_address, self.physical_address, self.address_size)
    }

    /// Session settings of a new server connection.
    ///
    /// # Errors
    ///
    /// Invalid HDLC address.
    pub fn settings(&self) -> DlmsResult<Settings> {
        let mut settings = Settings::new(true);
        settings.interface_type = self.interface_type;
        settings.use_logical_name_referencing = self.use_logical_name_referencing;
        settings.proposed_conformance = self
            .conformance
            .unwrap_or_else(|| settings.default_conformance());
        settings.max_pdu_size = self.max_receive_pdu_size;
        settings.max_server_pdu_size = self.max_receive_pdu_size;
        settings.server_address = match self.interface_type {
            InterfaceType::Hdlc => self.hdlc_address()?.value(),
            InterfaceType::Wrapper => u32::from(self.logical_address),
        };
        settings.limits = self.limits;
        settings.cipher = self.cipher.clone();
        settings.authentication = self.authentication;
        settings.password = self.password.clone();
        settings.dlms_version = self.dlms_version;
        settings.codec = self.codec;
        settings.quirks = self.quirks;
        settings.set_starting_block_index(self.starting_block_index);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = ServerConfig::default().settings().unwrap();
        assert!(settings.is_server());
        assert!(!settings.is_connected());
        assert_eq!(settings.proposed_conformance, Conformance::DEFAULT_LN);
        assert_eq!(settings.max_server_pdu_size, 1024);
        assert_eq!(settings.server_address, 1 << 7 | 0x11);
    }

    #[test]
    fn test_short_name_wrapper_settings() {
        let config = ServerConfig {
            interface_type: InterfaceType::Wrapper,
            use_logical_name_referencing: false,
            logical_address: 2,
            ..ServerConfig::default()
        };
        let settings = config.settings().unwrap();
        assert_eq!(settings.proposed_conformance, Conformance::DEFAULT_SN);
        assert_eq!(settings.server_address, 2);
    }
}
