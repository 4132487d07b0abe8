//! Per-codec fragmentation. Each submodule turns one complete frame into an
//! ordered list of `(payload_bytes, marker_bit)` pairs; `Session::write_rtp_packet`
//! is the single shared path that turns each pair into a wire RTP packet.

pub mod audio;
pub mod h264;
pub mod jpeg;
pub mod vp8;

/// One RTP payload ready to be written, paired with its marker bit.
pub type Fragment = (Vec<u8>, bool);
