//! Thin wrapper around `rtp_types` isolating this crate's one assumption about its
//! builder API (an explicit marker-bit setter) so a version mismatch only ever needs
//! fixing in one place.

use rtp_types::prelude::RtpPacketWriter;
use rtp_types::{RtpPacket, RtpPacketBuilder};

use crate::constants::RTP_MIN_HEADER_LEN;

/// A parsed view of an inbound RTP packet's header fields we actually need.
#[derive(Debug, Clone, Copy)]
pub struct RtpHeader {
    pub payload_type: u8,
    pub sequence_number: u16,
    pub timestamp: u32,
    pub ssrc: u32,
    pub marker: bool,
}

/// Parse an inbound datagram already classified as RTP (second byte not in the RTCP
/// payload-type range). Returns `None` on a malformed header; the caller logs and
/// drops it rather than turning this into a propagated error.
pub fn parse_header(bytes: &[u8]) -> Option<RtpHeader> {
    if bytes.len() < RTP_MIN_HEADER_LEN {
        return None;
    }

    let packet = RtpPacket::parse(bytes).ok()?;

    Some(RtpHeader {
        payload_type: packet.payload_type(),
        sequence_number: packet.sequence_number(),
        timestamp: packet.timestamp(),
        ssrc: packet.ssrc(),
        marker: packet.marker_bit(),
    })
}

/// Borrow the payload slice out of an already-validated inbound RTP datagram.
pub fn parse_payload(bytes: &[u8]) -> Option<&[u8]> {
    let packet = RtpPacket::parse(bytes).ok()?;
    Some(packet.payload())
}

/// Build and serialize one outbound RTP packet, appending to `out`.
pub fn write_packet(
    out: &mut Vec<u8>,
    payload_type: u8,
    sequence_number: u16,
    timestamp: u32,
    ssrc: u32,
    marker: bool,
    payload: &[u8],
) {
    let builder = RtpPacketBuilder::<_, Vec<u8>>::new()
        .payload_type(payload_type)
        .sequence_number(sequence_number)
        .timestamp(timestamp)
        .ssrc(ssrc)
        .marker_bit(marker)
        .payload(payload);

    if let Ok(size) = builder.calculate_size() {
        out.reserve(size);
    }

    let mut writer = VecPacketWriter { output: out };
    let _ = builder.write(&mut writer);
}

/// Adapts a plain `Vec<u8>` to `rtp_types`' `RtpPacketWriter` trait, since the
/// builder has no blanket impl for byte slices/vecs (mirrors the teacher's own
/// `RtpPacketWriterVec`).
struct VecPacketWriter<'a> {
    output: &'a mut Vec<u8>,
}

impl<'a> RtpPacketWriter for VecPacketWriter<'a> {
    type Output = ();
    type Payload = &'a [u8];
    type Extension = Vec<u8>;

    fn reserve(&mut self, size: usize) {
        if self.output.len() < size {
            self.output.reserve(size - self.output.len());
        }
    }

    fn push(&mut self, data: &[u8]) {
        self.output.extend_from_slice(data);
    }

    fn push_extension(&mut self, extension_data: &Self::Extension) {
        self.push(extension_data);
    }

    fn push_payload(&mut self, data: &Self::Payload) {
        self.push(data);
    }

    fn padding(&mut self, size: u8) {
        self.output.resize(self.output.len() + size as usize - 1, 0);
        self.output.push(size);
    }

    fn finish(&mut self) -> Self::Output {}
}
