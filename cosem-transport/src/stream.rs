//! Stream accessor traits

use async_trait::async_trait;
use bytes::BytesMut;
use cosem_core::{DlmsError, DlmsResult};
use std::io;
use std::time::Duration;

/// Size of one read into a [`BytesMut`] receive buffer
pub const READ_CHUNK: usize = 1024;

/// Bidirectional byte stream to a remote meter or client
#[async_trait]
pub trait StreamAccessor: Send {
    /// Set the read/write timeout. `None` waits forever.
    async fn set_timeout(&mut self, timeout: Option<Duration>) -> DlmsResult<()>;

    /// Read available bytes into `buf`.
    ///
    /// # Returns
    ///
    /// Number of bytes read, 0 at end of stream.
    async fn read(&mut self, buf: &mut [u8]) -> DlmsResult<usize>;

    async fn write(&mut self, buf: &[u8]) -> DlmsResult<usize>;

    async fn flush(&mut self) -> DlmsResult<()>;

    fn is_closed(&self) -> bool;

    async fn close(&mut self) -> DlmsResult<()>;

    /// Append the next chunk of received bytes to `buffer`.
    ///
    /// # Errors
    ///
    /// End of stream is reported as `UnexpectedEof` so that a caller
    /// waiting for the rest of a frame does not spin.
    async fn read_into(&mut self, buffer: &mut BytesMut) -> DlmsResult<usize> {
        let mut chunk = [0u8; READ_CHUNK];
        let n = self.read(&mut chunk).await?;
        if n == 0 {
            return Err(DlmsError::Connection(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Stream closed by peer",
            )));
        }
        buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }

    async fn write_all(&mut self, buf: &[u8]) -> DlmsResult<()> {
        let mut written = 0;
        while written < buf.len() {
            let n = self.write(&buf[written..]).await?;
            if n == 0 {
                return Err(DlmsError::Connection(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "Failed to write all data",
                )));
            }
            written += n;
        }
        self.flush().await
    }
}

/// Stream that is opened by the client side
#[async_trait]
pub trait TransportLayer: StreamAccessor {
    async fn open(&mut self) -> DlmsResult<()>;
}
