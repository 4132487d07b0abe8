//! VP8 fragmentation: a one-byte payload descriptor per fragment.

use crate::constants::RTP_MAX_PAYLOAD;
use crate::fragment::Fragment;

const DESCRIPTOR_LEN: usize = 1;
const START_OF_PARTITION: u8 = 0x10;
const CONTINUATION: u8 = 0x00;

/// Split `frame` into fragments, each prefixed with the one-byte VP8 descriptor.
/// Marker bit is 1 on the last fragment only. The frame itself is chunked at
/// `RTP_MAX_PAYLOAD`; the descriptor is additional overhead on top of that bound.
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
            let descriptor = if i == 0 { START_OF_PARTITION } else { CONTINUATION };
            let mut payload = Vec::with_capacity(DESCRIPTOR_LEN + chunk.len());
            payload.push(descriptor);
            payload.extend_from_slice(chunk);
            (payload, i == last)
        })
        .collect()
}
