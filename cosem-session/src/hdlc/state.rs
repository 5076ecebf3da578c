//! Link state and frame sequence counters

/// State of the HDLC link (not of the application association)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HdlcConnectionState {
    #[default]
    Disconnected,
    /// SNRM sent, waiting for UA
    Connecting,
    Connected,
    /// DISC sent, waiting for UA or DM
    Closing,
}

impl HdlcConnectionState {
    pub fn is_connected(&self) -> bool {
        matches!(self, HdlcConnectionState::Connected)
    }
}

/// Modulo-8 send/receive sequence numbers of I-frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SequenceCounters {
    /// N(S) of the next I-frame sent
    send: u8,
    /// N(S) expected in the next I-frame received
    receive: u8,
}

impl SequenceCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Back to zero after SNRM/UA.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn send(&self) -> u8 {
        self.send
    }

    pub fn receive(&self) -> u8 {
        self.receive
    }

    /// Take `(N(S), N(R))` for the next I-frame and advance N(S).
    pub fn next_information(&mut self) -> (u8, u8) {
        let numbers = (self.send, self.receive);
        self.send = (self.send + 1) & 0x07;
        numbers
    }

    /// Record a received I-frame.
    ///
    /// # Returns
    ///
    /// `false` when `send_sequence` was not the expected one. The counter
    /// follows the peer in both cases.
    pub fn received(&mut self, send_sequence: u8) -> bool {
        let expected = send_sequence & 0x07 == self.receive;
        self.receive = (send_sequence + 1) & 0x07;
        expected
    }
}
