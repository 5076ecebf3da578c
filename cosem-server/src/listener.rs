//! TCP listener
//!
//! Every accepted connection gets its own [`DlmsServer`] from the factory
//! and is served on a separate task until the client closes the stream,
//! the read timeout elapses or the link breaks.
//!
//! # Usage Example
//! ```rust,no_run
//! use cosem_interface::{Clock, ObjectCollection};
//! use cosem_core::ObisCode;
//! use cosem_server::{DlmsServer, ServerConfig, ServerListener};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let listener = ServerListener::new("0.0.0.0:4059", || {
//!     let mut objects = ObjectCollection::new();
//!     objects.push(Clock::new(ObisCode::CLOCK));
//!     DlmsServer::new(&ServerConfig::default(), objects)
//! });
//! listener.start().await
//! # }
//! ```

use crate::server::DlmsServer;
use anyhow::Context;
use cosem_core::byte_buffer::to_hex;
use cosem_core::{DlmsError, DlmsResult};
use cosem_transport::stream::READ_CHUNK;
use cosem_transport::{StreamAccessor, TcpTransport};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

/// Accepts clients and serves each with a fresh server session
pub struct ServerListener<F>
where
    F: Fn() -> DlmsResult<DlmsServer> + Send + Sync + 'static,
{
    /// Address to bind, e.g. "0.0.0.0:4059"
    address: String,
    factory: Arc<F>,
    /// Idle time after which a connection is dropped
    timeout: Option<Duration>,
}

impl<F> ServerListener<F>
where
    F: Fn() -> DlmsResult<DlmsServer> + Send + Sync + 'static,
{
    pub fn new(address: &str, factory: F) -> Self {
        Self {
            address: address.to_string(),
            factory: Arc::new(factory),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bind the address and serve clients until the task is cancelled.
    ///
    /// # Errors
    ///
    /// The address cannot be bound.
    pub async fn start(self) -> anyhow::Result<()> {
        let listener = TcpListener::bind(&self.address)
            .await
            .with_context(|| format!("Failed to bind {}", self.address))?;
        log::info!("DLMS server listening on {}", listener.local_addr()?);
        self.run(listener).await
    }

    /// Serve clients of an already bound listener.
    pub async fn run(self, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    log::warn!("Accept failed: {}", e);
                    continue;
                }
            };
            log::info!("Client connected from {}", peer);
            let factory = Arc::clone(&self.factory);
            let timeout = self.timeout;
            tokio::spawn(async move {
                let mut transport = TcpTransport::from_connected_stream(stream, timeout);
                let result = match factory() {
                    Ok(mut server) => serve(&mut transport, &mut server).await,
                    Err(e) => Err(anyhow::Error::new(e).context("Failed to create server")),
                };
                match result {
                    Ok(()) => log::info!("Client {} disconnected", peer),
                    Err(e) => log::error!("Client {}: {:#}", peer, e),
                }
            });
        }
    }
}

/// Answer requests arriving on `stream` until it is closed by the peer or
/// stays idle for longer than its timeout.
///
/// # Errors
///
/// Broken streams and invalid addressing. Malformed frames are answered or
/// dropped by the server session and do not end the connection.
pub async fn serve<S>(stream: &mut S, server: &mut DlmsServer) -> anyhow::Result<()>
where
    S: StreamAccessor + ?Sized,
{
    let result = serve_requests(stream, server).await;
    if let Err(e) = stream.close().await {
        log::debug!("Closing the stream failed: {}", e);
    }
    result
}

async fn serve_requests<S>(stream: &mut S, server: &mut DlmsServer) -> anyhow::Result<()>
where
    S: StreamAccessor + ?Sized,
{
    let mut chunk = [0u8; READ_CHUNK];
    loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) => return Ok(()),
            Ok(n) => n,
            Err(DlmsError::Timeout) => {
                log::info!("Connection idle, closing");
                return Ok(());
            }
            Err(e) => return Err(e).context("Read failed"),
        };
        log::trace!("RX: {}", to_hex(&chunk[..n]));
        let frames = server
            .handle_request(&chunk[..n])
            .context("Request could not be handled")?;
        for frame in frames {
            log::trace!("TX: {}", to_hex(&frame));
            stream.write_all(&frame).await.context("Write failed")?;
        }
    }
}
