//! A reference [`RtpChannel`] over plain `tokio::net::UdpSocket`s.
//!
//! This crate has a fixed two-socket (or one, when muxed) transport per session and
//! no ICE candidate pairs to multiplex, so a plain pair of `UdpSocket`s is enough.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;

use crate::channel::{RtpChannel, SocketKind};
use crate::constants::{RTP_MAX_PAYLOAD, SRTP_MAX_PREFIX_LENGTH};

/// A channel backed by one muxed socket, or a separate RTP/RTCP socket pair.
pub struct TokioUdpChannel {
    rtp: Arc<UdpSocket>,
    rtcp: Arc<UdpSocket>,
}

impl TokioUdpChannel {
    /// Bind a single socket carrying both RTP and RTCP.
    pub async fn bind_muxed(local_addr: SocketAddr) -> io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(local_addr).await?);
        Ok(TokioUdpChannel {
            rtp: socket.clone(),
            rtcp: socket,
        })
    }

    /// Bind separate RTP and RTCP sockets.
    pub async fn bind_pair(rtp_addr: SocketAddr, rtcp_addr: SocketAddr) -> io::Result<Self> {
        Ok(TokioUdpChannel {
            rtp: Arc::new(UdpSocket::bind(rtp_addr).await?),
            rtcp: Arc::new(UdpSocket::bind(rtcp_addr).await?),
        })
    }

    /// The RTP socket, for spawning a host-driven receive loop.
    pub fn rtp_socket(&self) -> Arc<UdpSocket> {
        self.rtp.clone()
    }

    /// The RTCP socket, for spawning a host-driven receive loop. Identical to
    /// `rtp_socket` when muxed.
    pub fn rtcp_socket(&self) -> Arc<UdpSocket> {
        self.rtcp.clone()
    }
}

impl RtpChannel for TokioUdpChannel {
    fn rtp_port(&self) -> u16 {
        self.rtp.local_addr().map(|addr| addr.port()).unwrap_or(0)
    }

    fn rtcp_port(&self) -> u16 {
        self.rtcp.local_addr().map(|addr| addr.port()).unwrap_or(0)
    }

    fn send(&self, socket: SocketKind, dest: SocketAddr, bytes: &[u8]) -> io::Result<()> {
        let socket = match socket {
            SocketKind::Rtp => &self.rtp,
            SocketKind::Rtcp => &self.rtcp,
        };
        socket.try_send_to(bytes, dest)?;
        Ok(())
    }

    fn close(&self) {}
}

/// Read datagrams from `socket` until it errors, handing each one to `on_datagram`
/// along with the socket's own local address. The host spawns one of these per
/// socket a [`TokioUdpChannel`] owns and forwards each datagram (with its local and
/// remote endpoints) to [`crate::session::Session::on_receive`].
pub async fn run_receive_loop(
    socket: Arc<UdpSocket>,
    mut on_datagram: impl FnMut(SocketAddr, SocketAddr, &[u8]),
) -> io::Result<()> {
    let mut buf = vec![0u8; RTP_MAX_PAYLOAD + SRTP_MAX_PREFIX_LENGTH];
    let local = socket.local_addr()?;

    loop {
        let (len, from) = socket.recv_from(&mut buf).await?;
        on_datagram(local, from, &buf[..len]);
    }
}
