//! Client configuration

use cosem_application::{Quirks, Settings, DEFAULT_MAX_PDU_SIZE};
use cosem_asn1::{CodecOptions, Conformance};
use cosem_core::{DlmsResult, InterfaceType};
use cosem_security::{Authentication, CipherContext};
use cosem_session::{HdlcAddress, Limits};
use std::time::Duration;

/// Everything needed to talk to one logical device
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Client SAP. HDLC source address or wrapper source wPort.
    pub client_address: u16,
    /// Logical device. Upper HDLC address or wrapper destination wPort.
    pub server_logical_address: u16,
    /// Lower HDLC address, not used with the wrapper
    pub server_physical_address: u16,
    /// Byte length of the HDLC server address, `None` for the shortest
    pub server_address_size: Option<usize>,
    pub interface_type: InterfaceType,
    pub use_logical_name_referencing: bool,
    pub authentication: Authentication,
    /// LLS password or HLS shared secret
    pub password: Vec<u8>,
    /// Largest PDU the client accepts, proposed in the AARQ
    pub max_pdu_size: u16,
    pub limits: Limits,
    /// Proposed conformance, `None` for the default of the referencing
    pub conformance: Option<Conformance>,
    /// System title and keys, needed for HLS-GMAC
    pub cipher: CipherContext,
    /// Fixed client challenge instead of a random one
    pub ctos_challenge: Option<Vec<u8>>,
    pub quirks: Quirks,
    pub codec: CodecOptions,
    /// Number of the first data block, some meters start from 0
    pub starting_block_index: u32,
    /// Reply timeout of the connection driver
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            client_address: 0x10,
            server_logical_address: 1,
            server_physical_address: 0x11,
            server_address_size: None,
            interface_type: InterfaceType::Hdlc,
            use_logical_name_referencing: true,
            authentication: Authentication::None,
            password: Vec::new(),
            max_pdu_size: DEFAULT_MAX_PDU_SIZE,
            limits: Limits::default(),
            conformance: None,
            cipher: CipherContext::default(),
            ctos_challenge: None,
            quirks: Quirks::default(),
            codec: CodecOptions::default(),
            starting_block_index: 1,
            timeout: Duration::from_secs(5),
        }
    }
}

impl ClientConfig {
    /// HDLC address of the server.
    ///
    /// # Errors
    ///
    /// Addresses that do not fit the requested size.
    pub fn hdlc_server_address(&self) -> DlmsResult<HdlcAddress> {
        HdlcAddress::server(
            self.server_logical_address,
            self.server_physical_address,
            self.server_address_size,
        )
    }

    /// Session settings of a new client connection.
    ///
    /// # Errors
    ///
    /// Invalid HDLC server address.
    pub fn settings(&self) -> DlmsResult<Settings> {
        let mut settings = Settings::new(false);
        settings.interface_type = self.interface_type;
        settings.use_logical_name_referencing = self.use_logical_name_referencing;
        settings.proposed_conformance = self
            .conformance
            .unwrap_or_else(|| settings.default_conformance());
        settings.max_pdu_size = self.max_pdu_size;
        settings.client_address = self.client_address;
        settings.server_address = match self.interface_type {
            InterfaceType::Hdlc => self.hdlc_server_address()?.value(),
            InterfaceType::Wrapper => u32::from(self.server_logical_address),
        };
        settings.limits = self.limits;
        settings.cipher = self.cipher.clone();
        settings.authentication = self.authentication;
        settings.password = self.password.clone();
        if let Some(challenge) = &self.ctos_challenge {
            settings.ctos_challenge = Some(challenge.clone());
            settings.use_custom_challenge = true;
        }
        settings.codec = self.codec;
        settings.quirks = self.quirks;
        settings.set_starting_block_index(self.starting_block_index);
        Ok(settings)
    }
}
