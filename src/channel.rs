//! The `RtpChannel` collaborator contract: a host-owned transport that moves bytes to
//! and from the network. The session core never opens a socket itself.

use std::net::SocketAddr;

/// Which of the (up to) two sockets a datagram belongs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketKind {
    /// RTP, or RTP+RTCP when `is_rtcp_muxed` is set.
    Rtp,
    /// RTCP, only meaningful when `is_rtcp_muxed` is false.
    Rtcp,
}

/// Host-provided transport for a single media section's socket pair.
///
/// Implementations are responsible for the actual `UdpSocket`/event loop; the session
/// core only ever calls `send` and reads `rtp_port`. See the `tokio` feature for a
/// reference implementation.
pub trait RtpChannel {
    /// The local port bound for RTP (and RTCP, if muxed), reported in outbound SDP.
    fn rtp_port(&self) -> u16;

    /// The local port bound for RTCP, when it is not muxed with RTP. Implementations
    /// that always mux may return the same value as `rtp_port`.
    fn rtcp_port(&self) -> u16 {
        self.rtp_port()
    }

    /// Send a single already-framed (and, if applicable, already-protected) datagram.
    fn send(&self, socket: SocketKind, dest: SocketAddr, bytes: &[u8]) -> std::io::Result<()>;

    /// Release any resources held by this channel. Called once, from `Session::close`.
    fn close(&self);
}
