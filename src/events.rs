//! Host-facing events, drained with [`crate::session::Session::poll_event`].
//!
//! A queue drained by the host beats dynamic subscriber registration here: there's
//! no need for more than one listener, and a `Vec<SessionEvent>` drain keeps the
//! host's control flow explicit rather than hidden behind callbacks.

use bytes::Bytes;

use crate::rtp_wire::RtpHeader;
use crate::track::Kind;

/// A decoded RFC 2833 telephony event, paired with the RTP header it arrived on.
#[derive(Debug, Clone, Copy)]
pub struct DtmfEvent {
    pub event_id: u8,
    pub end_of_event: bool,
    pub volume: u8,
    pub duration: u16,
}

impl DtmfEvent {
    /// Decode a four-byte RFC 2833 telephony-event payload.
    pub fn decode(payload: &[u8]) -> Option<Self> {
        if payload.len() < 4 {
            return None;
        }

        Some(DtmfEvent {
            event_id: payload[0],
            end_of_event: payload[1] & 0x80 != 0,
            volume: payload[1] & 0x3F,
            duration: u16::from_be_bytes([payload[2], payload[3]]),
        })
    }
}

/// Why a session or an RTCP BYE closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
    /// `Session::close` was called by the host.
    Requested,
    /// The remote sent an RTCP BYE.
    RemoteBye(Option<Bytes>),
    /// The underlying `RtpChannel` reported `on_closed`.
    ChannelClosed,
}

/// One inbound media packet handed to the host after demultiplexing.
#[derive(Debug, Clone)]
pub struct ReceivedRtpPacket {
    pub header: RtpHeader,
    pub payload: Bytes,
}

/// Events emitted to the host, as a single enum drained via `poll_event` rather than
/// per-kind callback registration.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    RtpPacketReceived { kind: Kind, packet: ReceivedRtpPacket },
    RtpEvent { event: DtmfEvent, header: RtpHeader },
    RtcpBye { kind: Kind, reason: Option<Bytes> },
    Timeout { kind: Kind },
    ReceiveReport { kind: Kind, compound: Bytes },
    SendReport { kind: Kind, compound: Bytes },
    Closed { reason: CloseReason },
}
