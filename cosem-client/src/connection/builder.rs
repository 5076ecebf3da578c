//! Connection builder for DLMS/COSEM client
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use cosem_client::ConnectionBuilder;
//! use cosem_security::Authentication;
//!
//! # async fn run() -> cosem_core::DlmsResult<()> {
//! let mut conn = ConnectionBuilder::new()
//!     .tcp("192.168.1.100:4059")
//!     .wrapper_ids(0x10, 0x01)
//!     .authentication(Authentication::Low, b"00000000")
//!     .connect()
//!     .await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

use super::connection::Connection;
use crate::config::ClientConfig;
use cosem_asn1::Conformance;
use cosem_core::{DlmsError, DlmsResult, InterfaceType};
use cosem_security::{Authentication, CipherContext};
use cosem_session::Limits;
use cosem_transport::{TcpSettings, TcpTransport};
use std::net::SocketAddr;
use std::time::Duration;

/// Fluent construction of a [`ClientConfig`] and a TCP [`Connection`]
#[derive(Debug, Clone, Default)]
pub struct ConnectionBuilder {
    /// TCP address in "host:port" form
    address: Option<String>,
    config: ClientConfig,
}

impl ConnectionBuilder {
    /// Builder with the defaults of [`ClientConfig`]: HDLC, client 0x10,
    /// server 1/0x11, logical name referencing, no authentication.
    pub fn new() -> Self {
        Self::default()
    }

    /// Connect over TCP, e.g. "192.168.1.100:4059"
    pub fn tcp(mut self, address: &str) -> Self {
        self.address = Some(address.to_string());
        self
    }

    /// Use HDLC framing with these addresses.
    ///
    /// # Arguments
    /// * `client` - Client SAP (0x10 for public client)
    /// * `server_logical` - Logical device, upper HDLC address
    /// * `server_physical` - Physical device, lower HDLC address
    pub fn hdlc_addresses(mut self, client: u8, server_logical: u16, server_physical: u16) -> Self {
        self.config.interface_type = InterfaceType::Hdlc;
        self.config.client_address = u16::from(client);
        self.config.server_logical_address = server_logical;
        self.config.server_physical_address = server_physical;
        self
    }

    /// Use the wrapper with these wPorts.
    pub fn wrapper_ids(mut self, client_id: u16, logical_device_id: u16) -> Self {
        self.config.interface_type = InterfaceType::Wrapper;
        self.config.client_address = client_id;
        self.config.server_logical_address = logical_device_id;
        self
    }

    pub fn short_name_referencing(mut self) -> Self {
        self.config.use_logical_name_referencing = false;
        self
    }

    /// Authentication mechanism and LLS password or HLS secret
    pub fn authentication(mut self, mechanism: Authentication, password: &[u8]) -> Self {
        self.config.authentication = mechanism;
        self.config.password = password.to_vec();
        self
    }

    /// System title and keys used by HLS-GMAC
    pub fn cipher(mut self, cipher: CipherContext) -> Self {
        self.config.cipher = cipher;
        self
    }

    pub fn conformance(mut self, conformance: Conformance) -> Self {
        self.config.conformance = Some(conformance);
        self
    }

    pub fn max_pdu_size(mut self, size: u16) -> Self {
        self.config.max_pdu_size = size;
        self
    }

    /// HDLC frame sizes and windows proposed in the SNRM
    pub fn limits(mut self, limits: Limits) -> Self {
        self.config.limits = limits;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn build_config(self) -> ClientConfig {
        self.config
    }

    /// Connection over a TCP transport that is not opened yet.
    ///
    /// # Errors
    ///
    /// No or invalid TCP address, invalid addressing.
    pub fn build(self) -> DlmsResult<Connection<TcpTransport>> {
        let address = self.address.as_deref().ok_or_else(|| {
            DlmsError::InvalidData("TCP address must be configured".to_string())
        })?;
        let address: SocketAddr = address.parse().map_err(|e| {
            DlmsError::InvalidData(format!("Invalid TCP address {}: {}", address, e))
        })?;
        let transport = TcpTransport::new(TcpSettings::with_timeout(address, self.config.timeout));
        Connection::new(transport, &self.config)
    }

    /// Open the TCP connection and the association.
    pub async fn connect(self) -> DlmsResult<Connection<TcpTransport>> {
        let mut connection = self.build()?;
        connection.connect().await?;
        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_configures_client() {
        let config = ConnectionBuilder::new()
            .wrapper_ids(0x20, 0x02)
            .short_name_referencing()
            .authentication(Authentication::Low, b"12345678")
            .max_pdu_size(512)
            .build_config();
        assert_eq!(config.interface_type, InterfaceType::Wrapper);
        assert_eq!(config.client_address, 0x20);
        assert_eq!(config.server_logical_address, 2);
        assert!(!config.use_logical_name_referencing);
        assert_eq!(config.password, b"12345678");
        assert_eq!(config.max_pdu_size, 512);
    }

    #[test]
    fn test_build_needs_address() {
        assert!(ConnectionBuilder::new().build().is_err());
        assert!(ConnectionBuilder::new().tcp("meter:4059").build().is_err());
        let connection = ConnectionBuilder::new()
            .tcp("127.0.0.1:4059")
            .hdlc_addresses(0x10, 1, 0x11)
            .build()
            .unwrap();
        assert!(!connection.is_open());
    }
}
