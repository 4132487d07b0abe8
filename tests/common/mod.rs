use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use rtp_session::channel::{RtpChannel, SocketKind};
use rtp_session::Session;

/// An `RtpChannel` that records every outbound datagram instead of touching the
/// network, for assertions in integration tests.
pub struct RecordingChannel {
    pub port: u16,
    pub sent: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
}

impl RecordingChannel {
    pub fn new(port: u16) -> Self {
        RecordingChannel {
            port,
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl RtpChannel for RecordingChannel {
    fn rtp_port(&self) -> u16 {
        self.port
    }

    fn send(&self, _socket: SocketKind, dest: SocketAddr, bytes: &[u8]) -> std::io::Result<()> {
        self.sent.lock().unwrap().push((dest, bytes.to_vec()));
        Ok(())
    }

    fn close(&self) {}
}

/// Install a `RecordingChannel` for `kind` and return the shared buffer it writes to.
pub fn attach_recording_channel(
    session: &mut Session,
    kind: rtp_session::Kind,
    port: u16,
) -> Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>> {
    let channel = RecordingChannel::new(port);
    let sent = channel.sent.clone();
    session.set_channel(kind, Box::new(channel));
    sent
}
