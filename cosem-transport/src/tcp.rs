//! TCP transport

use crate::stream::{StreamAccessor, TransportLayer};
use async_trait::async_trait;
use cosem_core::{DlmsError, DlmsResult};
use std::fmt;
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// IANA port of the DLMS/COSEM wrapper profile
pub const DEFAULT_PORT: u16 = 4059;

#[derive(Debug, Clone)]
pub struct TcpSettings {
    pub address: SocketAddr,
    pub timeout: Option<Duration>,
}

impl TcpSettings {
    pub fn new(address: SocketAddr) -> Self {
        Self {
            address,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    pub fn with_timeout(address: SocketAddr, timeout: Duration) -> Self {
        Self {
            address,
            timeout: Some(timeout),
        }
    }
}

/// TCP stream, either dialled by [`TransportLayer::open`] or accepted by a listener
pub struct TcpTransport {
    stream: Option<TcpStream>,
    settings: TcpSettings,
    closed: bool,
}

impl fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TcpTransport")
            .field("address", &self.settings.address)
            .field("closed", &self.closed)
            .finish()
    }
}

fn not_connected() -> DlmsError {
    DlmsError::Connection(io::Error::new(
        io::ErrorKind::NotConnected,
        "TCP stream not connected",
    ))
}

async fn with_timeout<T, F>(timeout: Option<Duration>, future: F) -> DlmsResult<T>
where
    F: Future<Output = io::Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, future)
            .await
            .map_err(|_| DlmsError::Timeout)?
            .map_err(DlmsError::Connection),
        None => future.await.map_err(DlmsError::Connection),
    }
}

impl TcpTransport {
    pub fn new(settings: TcpSettings) -> Self {
        Self {
            stream: None,
            settings,
            closed: true,
        }
    }

    /// Parse `host:port`.
    pub fn from_address(address: &str) -> DlmsResult<Self> {
        let address: SocketAddr = address
            .parse()
            .map_err(|e| DlmsError::InvalidData(format!("Invalid TCP address: {}", e)))?;
        Ok(Self::new(TcpSettings::new(address)))
    }

    /// Wrap a stream accepted by a listener.
    pub fn from_connected_stream(stream: TcpStream, timeout: Option<Duration>) -> Self {
        let address = stream
            .peer_addr()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 0)));
        Self {
            stream: Some(stream),
            settings: TcpSettings { address, timeout },
            closed: false,
        }
    }

    pub fn peer_address(&self) -> SocketAddr {
        self.settings.address
    }
}

#[async_trait]
impl TransportLayer for TcpTransport {
    async fn open(&mut self) -> DlmsResult<()> {
        if !self.closed {
            return Err(DlmsError::Connection(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Connection has already been opened",
            )));
        }
        let stream = with_timeout(self.settings.timeout, TcpStream::connect(self.settings.address)).await?;
        stream.set_nodelay(true).map_err(DlmsError::Connection)?;
        log::debug!("Connected to {}", self.settings.address);
        self.stream = Some(stream);
        self.closed = false;
        Ok(())
    }
}

#[async_trait]
impl StreamAccessor for TcpTransport {
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> DlmsResult<()> {
        self.settings.timeout = timeout;
        Ok(())
    }

    async fn read(&mut self, buf: &mut [u8]) -> DlmsResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        match with_timeout(timeout, stream.read(buf)).await {
            Ok(0) => {
                self.closed = true;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(DlmsError::Timeout) => Err(DlmsError::Timeout),
            Err(e) => {
                self.closed = true;
                Err(e)
            }
        }
    }

    async fn write(&mut self, buf: &[u8]) -> DlmsResult<usize> {
        let timeout = self.settings.timeout;
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        with_timeout(timeout, stream.write(buf)).await
    }

    async fn flush(&mut self) -> DlmsResult<()> {
        let stream = self.stream.as_mut().ok_or_else(not_connected)?;
        stream.flush().await.map_err(DlmsError::Connection)
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    async fn close(&mut self) -> DlmsResult<()> {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.shutdown().await {
                log::debug!("TCP shutdown failed: {}", e);
            }
        }
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_round_trip_over_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut peer = TcpTransport::from_connected_stream(socket, None);
            let mut buffer = BytesMut::new();
            while buffer.len() < 4 {
                peer.read_into(&mut buffer).await.unwrap();
            }
            peer.write_all(&buffer).await.unwrap();
        });

        let mut client = TcpTransport::new(TcpSettings::with_timeout(address, Duration::from_secs(5)));
        assert!(client.is_closed());
        client.open().await.unwrap();
        assert!(client.open().await.is_err());
        client.write_all(&[0x00, 0x01, 0x00, 0x10]).await.unwrap();
        let mut echoed = BytesMut::new();
        while echoed.len() < 4 {
            client.read_into(&mut echoed).await.unwrap();
        }
        assert_eq!(&echoed[..], &[0x00, 0x01, 0x00, 0x10]);
        server.await.unwrap();
        client.close().await.unwrap();
        assert!(client.is_closed());
    }

    #[tokio::test]
    async fn test_read_without_connection() {
        let mut transport = TcpTransport::from_address("127.0.0.1:4059").unwrap();
        let mut buf = [0u8; 4];
        assert!(transport.read(&mut buf).await.is_err());
        assert!(TcpTransport::from_address("not an address").is_err());
    }
}
