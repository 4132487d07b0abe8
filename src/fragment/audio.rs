//! Generic audio fragmentation: no payload-format header, marker bit always 0.
//!
//! This crate implements no voice-activity detection, so the RFC 3551 allowance for
//! marker=1 on talkspurt resumption is never exercised.

use crate::constants::RTP_MAX_PAYLOAD;
use crate::fragment::Fragment;

/// Split `frame` into `RTP_MAX_PAYLOAD`-sized chunks, each with marker bit 0.
pub fn fragment(frame: &[u8]) -> Vec<Fragment> {
    if frame.is_empty() {
        return vec![(Vec::new(), false)];
    }

    frame
        .chunks(RTP_MAX_PAYLOAD)
        .map(|chunk| (chunk.to_vec(), false))
        .collect()
}
