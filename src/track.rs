//! Per-stream send/receive state.
//!
//! A [`Track`] is a handle to exactly one local-or-remote, audio-or-video stream;
//! [`crate::session::Session`] holds at most one of each of the four combinations,
//! which is why `Session` stores four `Option<Track>` fields rather than a generic
//! collection.

use bytesstr::BytesStr;

/// Media kind carried by a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Audio,
    Video,
}

/// Negotiated direction of a stream, mapped 1:1 to the SDP `a=` direction attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamStatus {
    #[default]
    SendRecv,
    SendOnly,
    RecvOnly,
    Inactive,
}

impl StreamStatus {
    /// Whether this status permits sending media.
    pub fn can_send(self) -> bool {
        matches!(self, StreamStatus::SendRecv | StreamStatus::SendOnly)
    }

    /// Whether this status permits receiving media.
    pub fn can_receive(self) -> bool {
        matches!(self, StreamStatus::SendRecv | StreamStatus::RecvOnly)
    }

    /// The direction the *other* side sees, i.e. send/recv swapped.
    pub fn flipped(self) -> Self {
        match self {
            StreamStatus::SendRecv => StreamStatus::SendRecv,
            StreamStatus::SendOnly => StreamStatus::RecvOnly,
            StreamStatus::RecvOnly => StreamStatus::SendOnly,
            StreamStatus::Inactive => StreamStatus::Inactive,
        }
    }
}

impl From<sdp_types::Direction> for StreamStatus {
    fn from(value: sdp_types::Direction) -> Self {
        match value {
            sdp_types::Direction::SendRecv => StreamStatus::SendRecv,
            sdp_types::Direction::SendOnly => StreamStatus::SendOnly,
            sdp_types::Direction::RecvOnly => StreamStatus::RecvOnly,
            sdp_types::Direction::Inactive => StreamStatus::Inactive,
        }
    }
}

impl From<StreamStatus> for sdp_types::Direction {
    fn from(value: StreamStatus) -> Self {
        match value {
            StreamStatus::SendRecv => sdp_types::Direction::SendRecv,
            StreamStatus::SendOnly => sdp_types::Direction::SendOnly,
            StreamStatus::RecvOnly => sdp_types::Direction::RecvOnly,
            StreamStatus::Inactive => sdp_types::Direction::Inactive,
        }
    }
}

/// A single media format description, e.g. `PCMU/8000` or `H264/90000` with
/// `packetization-mode=1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capability {
    pub payload_type: u8,
    pub name: BytesStr,
    pub clock_rate: u32,
    /// Raw `fmtp` parameter string, if any (e.g. `packetization-mode=1`).
    pub params: Option<BytesStr>,
}

impl Capability {
    pub fn new(payload_type: u8, name: impl Into<BytesStr>, clock_rate: u32) -> Self {
        Capability {
            payload_type,
            name: name.into(),
            clock_rate,
            params: None,
        }
    }

    pub fn with_params(mut self, params: impl Into<BytesStr>) -> Self {
        self.params = Some(params.into());
        self
    }

    /// Payload type ids below 96 are the RFC 3551 static assignments and are matched
    /// by id alone; 96..=127 are dynamic and matched by name/clock-rate/params.
    fn is_static(&self) -> bool {
        self.payload_type < 96
    }

    /// RFC 3264 §6.1 format-matching rule used by both answer generation and
    /// `set_remote_description`'s capability intersection.
    pub fn matches(&self, other: &Capability) -> bool {
        if self.is_static() && other.is_static() {
            return self.payload_type == other.payload_type;
        }

        self.name.eq_ignore_ascii_case(&other.name)
            && self.clock_rate == other.clock_rate
            && self.params == other.params
    }
}

/// Per-stream send/receive state.
#[derive(Debug, Clone)]
pub struct Track {
    pub kind: Kind,
    pub is_remote: bool,
    pub ssrc: u32,
    pub seq_num: u16,
    pub timestamp: u32,
    pub media_id: Option<BytesStr>,
    pub capabilities: Vec<Capability>,
    pub status: StreamStatus,
}

impl Track {
    /// Construct a new local track. SSRC and initial sequence number are drawn from
    /// the given RNG closures so callers can inject determinism in tests rather than
    /// reading a global random source.
    pub fn new_local(
        kind: Kind,
        capabilities: Vec<Capability>,
        random_ssrc: impl FnOnce() -> u32,
        random_seq: impl FnOnce() -> u16,
    ) -> Self {
        Track {
            kind,
            is_remote: false,
            ssrc: random_ssrc() & 0x7FFF_FFFF,
            seq_num: random_seq(),
            timestamp: 0,
            media_id: None,
            capabilities,
            status: StreamStatus::SendRecv,
        }
    }

    /// Construct a new remote track from a negotiated capability list. SSRC is
    /// unknown (0) until learned from the first received packet or RTCP report.
    pub fn new_remote(kind: Kind, capabilities: Vec<Capability>, status: StreamStatus) -> Self {
        Track {
            kind,
            is_remote: true,
            ssrc: 0,
            seq_num: 0,
            timestamp: 0,
            media_id: None,
            capabilities,
            status,
        }
    }

    /// The capability this track should send with: the highest-priority (first)
    /// entry in `capabilities`.
    pub fn sending_format(&self) -> Option<&Capability> {
        self.capabilities.first()
    }

    /// Look up a capability by payload type, used when demuxing an inbound packet.
    pub fn capability_by_pt(&self, pt: u8) -> Option<&Capability> {
        self.capabilities.iter().find(|c| c.payload_type == pt)
    }

    /// Advance the sequence number by one packet, wrapping at 2^16, and return the
    /// value to stamp on the packet being built.
    pub fn next_seq_num(&mut self) -> u16 {
        let seq = self.seq_num;
        self.seq_num = self.seq_num.wrapping_add(1);
        seq
    }

    /// Advance the RTP timestamp by `duration` units (modulo 2^32), per a completed
    /// `send_*_frame` call.
    pub fn advance_timestamp(&mut self, duration: u32) {
        self.timestamp = self.timestamp.wrapping_add(duration);
    }
}
