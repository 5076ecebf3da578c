//! HDLC data link: connection setup, sequencing and segmentation
//!
//! The link does no I/O. Outgoing frames are returned as bytes and incoming
//! bytes are fed with [`HdlcLink::feed`] and turned into [`LinkEvent`]s by
//! [`HdlcLink::poll`].

use crate::hdlc::address::HdlcAddress;
use crate::hdlc::decoder::HdlcMessageDecoder;
use crate::hdlc::frame::{FrameType, HdlcFrame, LLC_REQUEST, LLC_RESPONSE};
use crate::hdlc::parameters::Limits;
use crate::hdlc::segmentation::{split, Reassembler};
use crate::hdlc::state::{HdlcConnectionState, SequenceCounters};
use crate::hdlc::statistics::HdlcStatistics;
use bytes::{Bytes, BytesMut};
use cosem_core::{DlmsError, DlmsResult};
use std::collections::VecDeque;

/// Side of the link
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRole {
    Client,
    Server,
}

impl LinkRole {
    fn llc_header(&self) -> &'static [u8; 3] {
        match self {
            LinkRole::Client => &LLC_REQUEST,
            LinkRole::Server => &LLC_RESPONSE,
        }
    }
}

/// Something that arrived on the link
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// A complete PDU without the LLC header
    Pdu(Bytes),
    /// Part of a segmented PDU was stored. The RR frame in `reply` asks the
    /// peer for the next segment.
    Segment { reply: Vec<u8> },
    /// The peer wants the next pending segment
    ReceiverReady,
    /// SNRM with the limits proposed by the peer (peer's point of view)
    Snrm(Limits),
    /// UA answering our SNRM or DISC. Carries the negotiated limits.
    Ua(Limits),
    Disconnect,
    DisconnectMode,
    FrameReject,
}

#[derive(Debug)]
pub struct HdlcLink {
    role: LinkRole,
    local: HdlcAddress,
    remote: HdlcAddress,
    /// Limits this station supports
    proposed: Limits,
    /// Limits in force after SNRM/UA
    limits: Limits,
    state: HdlcConnectionState,
    counters: SequenceCounters,
    input: BytesMut,
    reassembler: Reassembler,
    pending: VecDeque<Vec<u8>>,
    statistics: HdlcStatistics,
}

impl HdlcLink {
    /// # Arguments
    ///
    /// * `local` - address this station answers to
    /// * `remote` - peer address; a server learns it from the SNRM
    /// * `limits` - largest frames and windows this station supports
    pub fn new(role: LinkRole, local: HdlcAddress, remote: HdlcAddress, limits: Limits) -> Self {
        Self {
            role,
            local,
            remote,
            proposed: limits,
            limits,
            state: HdlcConnectionState::Disconnected,
            counters: SequenceCounters::new(),
            input: BytesMut::new(),
            reassembler: Reassembler::new(),
            pending: VecDeque::new(),
            statistics: HdlcStatistics::new(),
        }
    }

    pub fn role(&self) -> LinkRole {
        self.role
    }

    pub fn local(&self) -> HdlcAddress {
        self.local
    }

    pub fn remote(&self) -> HdlcAddress {
        self.remote
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn state(&self) -> HdlcConnectionState {
        self.state
    }

    pub fn counters(&self) -> &SequenceCounters {
        &self.counters
    }

    pub fn statistics(&self) -> &HdlcStatistics {
        &self.statistics
    }

    pub fn has_pending_segments(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Forget buffered input, segments and sequence numbers.
    pub fn reset(&mut self) {
        self.state = HdlcConnectionState::Disconnected;
        self.counters.reset();
        self.limits = self.proposed;
        self.input.clear();
        self.reassembler.clear();
        self.pending.clear();
    }

    fn frame(
        &mut self,
        frame_type: FrameType,
        information: Vec<u8>,
        segmented: bool,
    ) -> DlmsResult<Vec<u8>> {
        let frame = HdlcFrame::new(self.remote, self.local, frame_type)
            .with_information(information, segmented);
        log::trace!("HDLC send {}", frame);
        self.statistics.frames_sent += 1;
        frame.encode()
    }

    /// SNRM frame proposing this station's limits.
    pub fn snrm(&mut self) -> DlmsResult<Vec<u8>> {
        self.reset();
        self.state = HdlcConnectionState::Connecting;
        let information = self.proposed.encode();
        self.frame(FrameType::SetNormalResponseMode, information, false)
    }

    /// Accept a received SNRM: negotiate limits, reset the counters and
    /// build the UA frame.
    pub fn accept_snrm(&mut self, peer: &Limits) -> DlmsResult<Vec<u8>> {
        self.counters.reset();
        self.reassembler.clear();
        self.pending.clear();
        self.limits = self.proposed.negotiate(peer);
        self.state = HdlcConnectionState::Connected;
        log::debug!("HDLC link to {} connected, {:?}", self.remote, self.limits);
        let information = self.limits.encode();
        self.frame(FrameType::UnnumberedAcknowledge, information, false)
    }

    /// DISC frame closing the link.
    pub fn disc(&mut self) -> DlmsResult<Vec<u8>> {
        self.state = HdlcConnectionState::Closing;
        self.frame(FrameType::Disconnect, Vec::new(), false)
    }

    /// Answer to a received DISC: UA when connected, DM otherwise.
    pub fn disconnect_reply(&mut self) -> DlmsResult<Vec<u8>> {
        let frame_type = if self.state.is_connected() {
            FrameType::UnnumberedAcknowledge
        } else {
            FrameType::DisconnectMode
        };
        self.reset();
        self.frame(frame_type, Vec::new(), false)
    }

    /// RR frame acknowledging everything received so far.
    pub fn receiver_ready(&mut self) -> DlmsResult<Vec<u8>> {
        let receive_sequence = self.counters.receive();
        self.frame(FrameType::ReceiveReady { receive_sequence }, Vec::new(), false)
    }

    /// Split `pdu` into I-frames.
    ///
    /// # Returns
    ///
    /// The first frame. The rest are kept until the peer sends RR, see
    /// [`HdlcLink::next_segment`].
    pub fn send_pdu(&mut self, pdu: &[u8]) -> DlmsResult<Vec<u8>> {
        if !self.state.is_connected() {
            return Err(DlmsError::Protocol("HDLC link is not connected".to_string()));
        }
        self.pending.clear();
        let segments = split(pdu, Some(self.role.llc_header()), self.limits.max_info_tx as usize);
        let last = segments.len() - 1;
        for (i, segment) in segments.into_iter().enumerate() {
            let (send_sequence, receive_sequence) = self.counters.next_information();
            let frame = self.frame(
                FrameType::Information {
                    send_sequence,
                    receive_sequence,
                },
                segment,
                i != last,
            )?;
            self.pending.push_back(frame);
        }
        self.pending
            .pop_front()
            .ok_or_else(|| DlmsError::Protocol("Nothing to send".to_string()))
    }

    /// Next frame of a segmented PDU, after the peer sent RR.
    pub fn next_segment(&mut self) -> Option<Vec<u8>> {
        self.pending.pop_front()
    }

    /// Append received bytes to the input buffer.
    pub fn feed(&mut self, data: &[u8]) {
        self.input.extend_from_slice(data);
    }

    /// Process buffered input until an event is available.
    ///
    /// # Returns
    ///
    /// `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Frames with a bad HCS or FCS. They are dropped, so polling again
    /// continues with the following bytes.
    pub fn poll(&mut self) -> DlmsResult<Option<LinkEvent>> {
        loop {
            let frame = match HdlcMessageDecoder::next_frame(&mut self.input) {
                Ok(Some(frame)) => frame,
                Ok(None) => return Ok(None),
                Err(e) => {
                    self.statistics.check_errors += 1;
                    return Err(e);
                }
            };
            if !self.is_for_us(&frame) {
                log::debug!("Skipping HDLC frame {}", frame);
                self.statistics.frames_skipped += 1;
                continue;
            }
            self.statistics.frames_received += 1;
            log::trace!("HDLC receive {}", frame);
            if let Some(event) = self.handle_frame(frame)? {
                return Ok(Some(event));
            }
        }
    }

    fn is_for_us(&self, frame: &HdlcFrame) -> bool {
        let destination = frame.destination.value() == self.local.value()
            || (self.role == LinkRole::Server && frame.destination.is_all_station());
        match self.role {
            LinkRole::Client => destination && frame.source.value() == self.remote.value(),
            LinkRole::Server => {
                destination
                    && (frame.frame_type == FrameType::SetNormalResponseMode
                        || !self.state.is_connected()
                        || frame.source.value() == self.remote.value())
            }
        }
    }

    fn handle_frame(&mut self, frame: HdlcFrame) -> DlmsResult<Option<LinkEvent>> {
        match frame.frame_type {
            FrameType::Information { send_sequence, .. } => {
                if !self.counters.received(send_sequence) {
                    log::warn!(
                        "HDLC frame out of sequence: N(S)={} from {}",
                        send_sequence,
                        frame.source
                    );
                    self.statistics.sequence_errors += 1;
                }
                self.information(&frame.information, frame.segmented)
            }
            FrameType::UnnumberedInformation => {
                self.information(&frame.information, frame.segmented)
            }
            FrameType::ReceiveReady { .. } | FrameType::ReceiveNotReady { .. } => {
                Ok(Some(LinkEvent::ReceiverReady))
            }
            FrameType::SetNormalResponseMode => {
                if self.role == LinkRole::Client {
                    log::debug!("Ignoring SNRM received by a client");
                    return Ok(None);
                }
                self.remote = frame.source;
                if !frame.destination.is_all_station() {
                    self.local = frame.destination;
                }
                Ok(Some(LinkEvent::Snrm(Limits::decode(&frame.information)?)))
            }
            FrameType::UnnumberedAcknowledge => match self.state {
                HdlcConnectionState::Connecting => {
                    let peer = Limits::decode(&frame.information)?;
                    self.limits = self.proposed.negotiate(&peer);
                    self.counters.reset();
                    self.state = HdlcConnectionState::Connected;
                    log::debug!("HDLC link to {} connected, {:?}", self.remote, self.limits);
                    Ok(Some(LinkEvent::Ua(self.limits)))
                }
                HdlcConnectionState::Closing => {
                    self.reset();
                    Ok(Some(LinkEvent::Ua(self.limits)))
                }
                _ => {
                    log::debug!("Unexpected UA in state {:?}", self.state);
                    Ok(None)
                }
            },
            FrameType::Disconnect => Ok(Some(LinkEvent::Disconnect)),
            FrameType::DisconnectMode => {
                self.reset();
                Ok(Some(LinkEvent::DisconnectMode))
            }
            FrameType::FrameReject => {
                log::warn!("Frame reject from {}", frame.source);
                Ok(Some(LinkEvent::FrameReject))
            }
        }
    }

    fn information(
        &mut self,
        information: &[u8],
        segmented: bool,
    ) -> DlmsResult<Option<LinkEvent>> {
        let data = if self.reassembler.pending_segments() == 0 {
            strip_llc(information)
        } else {
            information
        };
        match self.reassembler.push(data, segmented) {
            Some(pdu) => Ok(Some(LinkEvent::Pdu(pdu))),
            None => Ok(Some(LinkEvent::Segment {
                reply: self.receiver_ready()?,
            })),
        }
    }
}

fn strip_llc(information: &[u8]) -> &[u8] {
    if information.len() >= 3
        && (information[..3] == LLC_REQUEST || information[..3] == LLC_RESPONSE)
    {
        &information[3..]
    } else {
        information
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(limits: Limits) -> (HdlcLink, HdlcLink) {
        let client_address = HdlcAddress::client(0x10).unwrap();
        let server_address = HdlcAddress::server(1, 0x11, None).unwrap();
        let client = HdlcLink::new(LinkRole::Client, client_address, server_address, limits);
        let server = HdlcLink::new(
            LinkRole::Server,
            server_address,
            HdlcAddress::client(0).unwrap(),
            Limits::default(),
        );
        (client, server)
    }

    fn connect(client: &mut HdlcLink, server: &mut HdlcLink) {
        let snrm = client.snrm().unwrap();
        server.feed(&snrm);
        let peer = match server.poll().unwrap() {
            Some(LinkEvent::Snrm(peer)) => peer,
            other => panic!("unexpected {:?}", other),
        };
        let ua = server.accept_snrm(&peer).unwrap();
        client.feed(&ua);
        assert!(matches!(client.poll().unwrap(), Some(LinkEvent::Ua(_))));
    }

    #[test]
    fn test_snrm_ua_negotiates_limits() {
        let limits = Limits {
            max_info_tx: 64,
            max_info_rx: 256,
            ..Limits::default()
        };
        let (mut client, mut server) = pair(limits);
        connect(&mut client, &mut server);
        assert!(client.state().is_connected());
        assert!(server.state().is_connected());
        assert_eq!(client.limits().max_info_tx, 64);
        assert_eq!(client.limits().max_info_rx, 128);
        assert_eq!(server.limits().max_info_tx, 128);
        assert_eq!(server.limits().max_info_rx, 64);
        assert_eq!(server.remote(), client.local());
    }

    #[test]
    fn test_segmented_exchange() {
        let (mut client, mut server) = pair(Limits::default());
        connect(&mut client, &mut server);
        let pdu: Vec<u8> = (0..300u16).map(|i| i as u8).collect();
        let mut frame = server.send_pdu(&pdu).unwrap();
        let received = loop {
            client.feed(&frame);
            match client.poll().unwrap() {
                Some(LinkEvent::Segment { reply }) => {
                    server.feed(&reply);
                    assert_eq!(server.poll().unwrap(), Some(LinkEvent::ReceiverReady));
                    frame = server.next_segment().unwrap();
                }
                Some(LinkEvent::Pdu(pdu)) => break pdu,
                other => panic!("unexpected {:?}", other),
            }
        };
        assert_eq!(received.as_ref(), pdu.as_slice());
        assert!(!server.has_pending_segments());
        assert_eq!(client.statistics().sequence_errors, 0);
        assert_eq!(server.counters().send(), 3);
    }

    #[test]
    fn test_llc_header_stripped() {
        let (mut client, mut server) = pair(Limits::default());
        connect(&mut client, &mut server);
        let frame = client.send_pdu(&[0xC0, 0x01]).unwrap();
        server.feed(&frame);
        assert_eq!(
            server.poll().unwrap(),
            Some(LinkEvent::Pdu(Bytes::from_static(&[0xC0, 0x01])))
        );
    }

    #[test]
    fn test_frames_for_other_stations_skipped() {
        let (mut client, mut server) = pair(Limits::default());
        connect(&mut client, &mut server);
        let mut other = HdlcLink::new(
            LinkRole::Server,
            HdlcAddress::server(1, 0x11, None).unwrap(),
            HdlcAddress::client(0x20).unwrap(),
            Limits::default(),
        );
        other.state = HdlcConnectionState::Connected;
        client.feed(&other.send_pdu(&[1]).unwrap());
        client.feed(&server.send_pdu(&[2]).unwrap());
        assert_eq!(
            client.poll().unwrap(),
            Some(LinkEvent::Pdu(Bytes::from_static(&[2])))
        );
        assert_eq!(client.statistics().frames_skipped, 1);
    }

    #[test]
    fn test_disconnect() {
        let (mut client, mut server) = pair(Limits::default());
        connect(&mut client, &mut server);
        let disc = client.disc().unwrap();
        server.feed(&disc);
        assert_eq!(server.poll().unwrap(), Some(LinkEvent::Disconnect));
        let ua = server.disconnect_reply().unwrap();
        assert!(!server.state().is_connected());
        client.feed(&ua);
        assert!(matches!(client.poll().unwrap(), Some(LinkEvent::Ua(_))));
        assert_eq!(client.state(), HdlcConnectionState::Disconnected);

        // A second DISC is answered with DM
        let reply = server.disconnect_reply().unwrap();
        assert_eq!(reply[reply.len() - 4], 0x1F);
    }

    #[test]
    fn test_send_requires_connection() {
        let (mut client, _) = pair(Limits::default());
        assert!(client.send_pdu(&[1]).is_err());
    }
}
