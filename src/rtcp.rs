//! The `RtcpSession` collaborator contract: a host-owned per-media reporting engine.
//! The session core only ever feeds it packet telemetry and reads `last_activity_at`;
//! report generation, scheduling and BYE emission are entirely its responsibility.

use std::time::Instant;

/// Telemetry for one RTP packet this session just transmitted.
#[derive(Debug, Clone, Copy)]
pub struct SentPacketInfo {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload_len: usize,
    pub marker: bool,
}

/// Telemetry for one RTP packet this session just demultiplexed to a track.
#[derive(Debug, Clone, Copy)]
pub struct ReceivedPacketInfo {
    pub ssrc: u32,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub payload_len: usize,
    pub marker: bool,
}

/// Per-media reporting engine: records sent/received RTP traffic, periodically emits
/// compound RTCP reports (via its own host-driven timer, not modeled here), and
/// signals timeout/BYE to its owner.
pub trait RtcpSession {
    fn start(&mut self);
    fn close(&mut self);
    fn record_sent(&mut self, packet: &SentPacketInfo);
    fn record_received(&mut self, packet: &ReceivedPacketInfo);
    fn ssrc_mut(&mut self) -> &mut u32;
    fn last_activity_at(&self) -> Option<Instant>;
}
