//! # RTP/RTCP session coordination over a negotiated SDP offer/answer
//!
//! This crate implements the sans-io core of a two-party real-time media session: SDP
//! offer/answer negotiation (RFC 3264), a fixed four-slot track model (one local and
//! one remote track per audio/video), inbound RTP/RTCP demultiplexing, per-codec
//! outbound fragmentation (generic audio, VP8, RFC 2435 JPEG, H.264 FU-A) and RFC 2833
//! DTMF telephony-event bursts.
//!
//! [`session::Session`] is the top-level type. It owns no socket and runs no event
//! loop: the host feeds it inbound datagrams via [`session::Session::on_receive`],
//! drains outbound effects via [`session::Session::poll_event`], and drives the actual
//! network IO through the [`channel::RtpChannel`] and [`rtcp::RtcpSession`]
//! collaborators it is given. Encryption is similarly external, via
//! [`transform::SrtpTransform`].
//!
//! Support for IO is provided when enabling the `tokio` feature flag (on by default):
//! [`tokio_channel::TokioUdpChannel`] is a reference `RtpChannel` over a plain
//! `tokio::net::UdpSocket`, and [`session::Session::send_dtmf_event`] paces a DTMF
//! burst with `tokio::time::sleep`.

pub mod channel;
pub mod constants;
pub mod dtmf;
pub mod error;
pub mod events;
pub mod fragment;
pub mod rtcp;
pub mod rtp_wire;
pub mod sdp;
pub mod session;
#[cfg(feature = "tokio")]
pub mod tokio_channel;
pub mod track;
pub mod transform;

pub use channel::{RtpChannel, SocketKind};
pub use error::{NegotiationError, TrackError, TransformError};
pub use events::{CloseReason, DtmfEvent, ReceivedRtpPacket, SessionEvent};
pub use rtcp::{ReceivedPacketInfo, RtcpSession, SentPacketInfo};
pub use session::{Session, SessionConfig};
pub use track::{Capability, Kind, StreamStatus, Track};
pub use transform::{NoOpTransform, SrtpTransform};
