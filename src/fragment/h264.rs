//! H.264 FU-A fragmentation: a 2-byte FU indicator+header pair per fragment.

use crate::constants::{H264_RTP_HEADER_LENGTH, RTP_MAX_PAYLOAD};
use crate::fragment::Fragment;

const FU_INDICATOR: u8 = 0x1C;
const FU_START: u8 = 0x89;
const FU_MIDDLE: u8 = 0x09;
const FU_END: u8 = 0x49;

/// Split `frame` (one NAL unit's payload) into FU-A fragments. A frame that fits in
/// a single packet is sent whole with the end-of-fragment header and marker bit 1.
/// The frame is chunked at `RTP_MAX_PAYLOAD`; the 2-byte FU header is additional
/// overhead on top of that bound.
pub fn fragment(frame: &[u8]) -> Vec<Fragment> {
    let chunks: Vec<&[u8]> = if frame.is_empty() {
        vec![&[][..]]
    } else {
        frame.chunks(RTP_MAX_PAYLOAD).collect()
    };

    let last = chunks.len() - 1;
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let (flags, marker) = if last == 0 {
                (FU_END, true)
            } else if i == 0 {
                (FU_START, false)
            } else if i == last {
                (FU_END, true)
            } else {
                (FU_MIDDLE, false)
            };

            let mut payload = Vec::with_capacity(H264_RTP_HEADER_LENGTH + chunk.len());
            payload.push(FU_INDICATOR);
            payload.push(flags);
            payload.extend_from_slice(chunk);
            (payload, marker)
        })
        .collect()
}
