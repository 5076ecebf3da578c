//! Connection driver for DLMS/COSEM client
//!
//! [`Connection`] runs the request/reply exchanges of a [`DlmsClient`] over
//! a [`StreamAccessor`]. It sends every frame of a request, waits for the
//! answer, and keeps asking for the next HDLC segment or data block until
//! the reply is complete.
//!
//! # Connection Lifecycle
//!
//! 1. **Open**: SNRM/UA for HDLC, AARQ/AARE, HLS proof exchange when the
//!    server asks for it
//! 2. **Use**: read, write, method, read list, profile rows, access
//! 3. **Close**: release request, DISC for HDLC, close the stream
//!
//! # Usage Example
//!
//! ```rust,no_run
//! use cosem_client::{ClientConfig, Connection};
//! use cosem_core::{ObisCode, ObjectType};
//! use cosem_transport::TcpTransport;
//!
//! # async fn run() -> cosem_core::DlmsResult<()> {
//! let transport = TcpTransport::from_address("192.168.1.100:4059")?;
//! let mut conn = Connection::new(transport, &ClientConfig::default())?;
//! conn.open().await?;
//! let energy = conn
//!     .read(ObjectType::Register, ObisCode::new(1, 0, 1, 8, 0, 255).into(), 2)
//!     .await?;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

use crate::client::{AccessItem, DlmsClient};
use crate::config::ClientConfig;
use bytes::BytesMut;
use cosem_application::{ObjectName, ReplyData};
use cosem_core::byte_buffer::to_hex;
use cosem_core::{
    Command, CosemDateTime, DataType, DlmsError, DlmsResult, ErrorCode, ObjectType, Value,
};
use cosem_interface::{CaptureObject, CosemObject, ObjectCollection, ProfileGeneric};
use cosem_transport::{StreamAccessor, TransportLayer};
use std::time::Duration;

/// Connection state
///
/// Operations are only performed when the connection is [`ConnectionState::Ready`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Connection is closed (initial state)
    Closed,
    /// Transport layer is open, but session layer is not established
    TransportOpen,
    /// Session layer is established, but the association is not
    SessionOpen,
    /// Association is established, connection is fully ready
    Ready,
}

impl ConnectionState {
    /// Check if the connection is ready for operations
    pub fn is_ready(&self) -> bool {
        matches!(self, ConnectionState::Ready)
    }

    /// Check if the connection can be closed
    pub fn can_close(&self) -> bool {
        !matches!(self, ConnectionState::Closed)
    }
}

/// A client association with one logical device
pub struct Connection<S: StreamAccessor> {
    stream: S,
    client: DlmsClient,
    state: ConnectionState,
    timeout: Option<Duration>,
}

impl<S: StreamAccessor> Connection<S> {
    /// Driver for an already opened stream.
    ///
    /// # Errors
    ///
    /// Invalid addresses in `config`.
    pub fn new(stream: S, config: &ClientConfig) -> DlmsResult<Self> {
        Ok(Self {
            stream,
            client: DlmsClient::new(config)?,
            state: ConnectionState::Closed,
            timeout: Some(config.timeout),
        })
    }

    pub fn client(&self) -> &DlmsClient {
        &self.client
    }

    pub fn client_mut(&mut self) -> &mut DlmsClient {
        &mut self.client
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state.is_ready()
    }

    /// Establish the link and the association.
    ///
    /// # Errors
    ///
    /// Returns error if any layer fails to establish. The connection then
    /// stays in the state reached so far and should be closed.
    pub async fn open(&mut self) -> DlmsResult<()> {
        self.stream.set_timeout(self.timeout).await?;
        self.state = ConnectionState::TransportOpen;

        if let Some(snrm) = self.client.snrm_request()? {
            let reply = self.exchange(vec![snrm]).await?;
            if reply.command != Some(Command::Ua) {
                return Err(DlmsError::Protocol(format!(
                    "UA expected after SNRM, received {:?}",
                    reply.command
                )));
            }
            log::debug!("HDLC link established, {:?}", self.client.settings().limits);
        }
        self.state = ConnectionState::SessionOpen;

        let frames = self.client.aarq_request()?;
        let reply = self.exchange(frames).await?;
        self.client.parse_aare_response(&reply)?;
        if self.client.is_authentication_required() {
            let frames = self.client.application_association_request()?;
            let reply = self.exchange(frames).await?;
            self.client.parse_application_association_response(&reply)?;
        }
        self.state = ConnectionState::Ready;
        log::info!(
            "Connected to server {}",
            self.client.settings().server_address
        );
        Ok(())
    }

    /// Release the association, close the link and the stream.
    ///
    /// Failures of the release and disconnect exchanges are logged; the
    /// stream is closed in any case.
    pub async fn close(&mut self) -> DlmsResult<()> {
        if !self.state.can_close() {
            return Ok(());
        }
        if self.state.is_ready() {
            let frames = self.client.release_request()?;
            if let Err(e) = self.exchange(frames).await {
                log::warn!("Release failed: {}", e);
            }
        }
        let frames = self.client.disconnect_request()?;
        if let Err(e) = self.exchange(frames).await {
            log::warn!("Disconnect failed: {}", e);
        }
        self.state = ConnectionState::Closed;
        self.stream.close().await
    }

    fn ensure_ready(&self) -> DlmsResult<()> {
        if self.state.is_ready() {
            Ok(())
        } else {
            Err(DlmsError::Protocol(format!(
                "Connection is not ready: {:?}",
                self.state
            )))
        }
    }

    async fn send(&mut self, frame: &[u8]) -> DlmsResult<()> {
        log::trace!("TX: {}", to_hex(frame));
        self.stream.write_all(frame).await
    }

    /// Wait until the client has handled one frame.
    async fn read_reply(&mut self, reply: &mut ReplyData) -> DlmsResult<()> {
        // a frame may already be buffered from the previous read
        if self.client.get_data(&[], reply)? {
            return Ok(());
        }
        let mut buffer = BytesMut::new();
        loop {
            self.stream.read_into(&mut buffer).await?;
            log::trace!("RX: {}", to_hex(&buffer));
            let complete = self.client.get_data(&buffer, reply)?;
            buffer.clear();
            if complete {
                return Ok(());
            }
        }
    }

    /// Send `frames` one at a time and collect the reply of the last one.
    async fn exchange(&mut self, frames: Vec<Vec<u8>>) -> DlmsResult<ReplyData> {
        let mut reply = ReplyData::new();
        for frame in frames {
            reply.clear();
            self.send(&frame).await?;
            self.read_reply(&mut reply).await?;
            while !reply.is_complete() {
                let next = self.client.receiver_ready(&reply)?;
                self.send(&next).await?;
                self.read_reply(&mut reply).await?;
            }
        }
        Ok(reply)
    }

    /// Read attribute `index` of an object.
    ///
    /// # Errors
    ///
    /// `Device` with the data-access-result when the server refuses.
    pub async fn read(
        &mut self,
        object_type: ObjectType,
        name: ObjectName,
        index: u8,
    ) -> DlmsResult<Value> {
        self.ensure_ready()?;
        let frames = self.client.read(object_type, name, index)?;
        let reply = self.exchange(frames).await?;
        self.client.get_value(&reply)
    }

    /// Read attribute `index` of `object` and store the value in it.
    pub async fn read_object(
        &mut self,
        object: &mut dyn CosemObject,
        index: u8,
    ) -> DlmsResult<Value> {
        let name = self.client.object_name(&*object);
        let value = self.read(object.object_type(), name, index).await?;
        self.client.update_value(object, index, value.clone())?;
        Ok(value)
    }

    pub async fn write(
        &mut self,
        object_type: ObjectType,
        name: ObjectName,
        index: u8,
        value: &Value,
        data_type: DataType,
    ) -> DlmsResult<()> {
        self.ensure_ready()?;
        let frames = self.client.write(object_type, name, index, value, data_type)?;
        let reply = self.exchange(frames).await?;
        match reply.error {
            Some(error) => Err(DlmsError::Device(error)),
            None => Ok(()),
        }
    }

    /// Write the current value of attribute `index` of `object`.
    pub async fn write_object(&mut self, object: &mut dyn CosemObject, index: u8) -> DlmsResult<()> {
        self.ensure_ready()?;
        let frames = self.client.write_object(object, index)?;
        let reply = self.exchange(frames).await?;
        match reply.error {
            Some(error) => Err(DlmsError::Device(error)),
            None => Ok(()),
        }
    }

    /// Invoke method `index`. `Ok(None)` when the server returned no data.
    pub async fn method(
        &mut self,
        object_type: ObjectType,
        name: ObjectName,
        index: u8,
        parameter: Option<&Value>,
    ) -> DlmsResult<Option<Value>> {
        self.ensure_ready()?;
        let frames = self.client.method(object_type, name, index, parameter)?;
        let reply = self.exchange(frames).await?;
        if reply.error.is_none() && reply.data.size() == 0 {
            return Ok(None);
        }
        self.client.get_value(&reply).map(Some)
    }

    /// Read several attributes. A refused item does not fail the others.
    pub async fn read_list(
        &mut self,
        items: &[(ObjectType, ObjectName, u8)],
    ) -> DlmsResult<Vec<Result<Value, ErrorCode>>> {
        self.ensure_ready()?;
        let frames = self.client.read_list(items)?;
        let mut results = Vec::with_capacity(items.len());
        for frame in frames {
            let reply = self.exchange(vec![frame]).await?;
            // RR acknowledging a request segment carries no command
            if reply.command.is_some() {
                results.extend(self.client.parse_list_response(&reply)?);
            }
        }
        if results.len() != items.len() {
            return Err(DlmsError::InvalidData(format!(
                "{} items requested, {} returned",
                items.len(),
                results.len()
            )));
        }
        Ok(results)
    }

    /// Rows by entry, see [`DlmsClient::read_rows_by_entry`]. The rows are
    /// also stored in the buffer of `profile`.
    pub async fn read_rows_by_entry(
        &mut self,
        profile: &mut ProfileGeneric,
        index: u32,
        count: u32,
        columns: &[CaptureObject],
    ) -> DlmsResult<Vec<Vec<Value>>> {
        self.ensure_ready()?;
        let frames = self.client.read_rows_by_entry(profile, index, count, columns)?;
        self.read_rows(profile, frames).await
    }

    /// Rows by range, see [`DlmsClient::read_rows_by_range`].
    pub async fn read_rows_by_range(
        &mut self,
        profile: &mut ProfileGeneric,
        start: &CosemDateTime,
        end: &CosemDateTime,
        columns: &[CaptureObject],
    ) -> DlmsResult<Vec<Vec<Value>>> {
        self.ensure_ready()?;
        let frames = self.client.read_rows_by_range(profile, start, end, columns)?;
        self.read_rows(profile, frames).await
    }

    async fn read_rows(
        &mut self,
        profile: &mut ProfileGeneric,
        frames: Vec<Vec<u8>>,
    ) -> DlmsResult<Vec<Vec<Value>>> {
        let reply = self.exchange(frames).await?;
        let value = self.client.get_value(&reply)?;
        self.client
            .update_value(profile, ProfileGeneric::ATTR_BUFFER, value)?;
        log::debug!("Read {} rows from {}", profile.buffer.len(), profile.logical_name());
        Ok(profile.buffer.clone())
    }

    /// Read the object list of the association.
    pub async fn get_objects(&mut self) -> DlmsResult<&ObjectCollection> {
        self.ensure_ready()?;
        let frames = self.client.get_objects_request()?;
        let reply = self.exchange(frames).await?;
        self.client.parse_objects(&reply)
    }

    /// Keep an idle connection open.
    pub async fn keep_alive(&mut self) -> DlmsResult<()> {
        self.ensure_ready()?;
        let frames = self.client.keep_alive()?;
        let reply = self.exchange(frames).await?;
        if let Some(error) = reply.error {
            log::debug!("Keep alive answered with {}", error);
        }
        Ok(())
    }

    /// Execute `items` with one access request.
    pub async fn access(
        &mut self,
        time: Option<CosemDateTime>,
        items: &[AccessItem],
    ) -> DlmsResult<Vec<(Value, ErrorCode)>> {
        self.ensure_ready()?;
        let frames = self.client.access_request(time, items)?;
        let reply = self.exchange(frames).await?;
        self.client.parse_access_response(&reply)
    }
}

impl<S: TransportLayer> Connection<S> {
    /// Open the transport, then the association.
    pub async fn connect(&mut self) -> DlmsResult<()> {
        if self.stream.is_closed() {
            self.stream.open().await?;
        }
        self.open().await
    }
}
