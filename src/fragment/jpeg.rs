//! RFC 2435 (minimal) JPEG fragmentation: an 8-byte JPEG/RTP header per fragment.

use crate::constants::RTP_MAX_PAYLOAD;
use crate::fragment::Fragment;

const HEADER_LEN: usize = 8;

/// Static parameters of the scan this frame belongs to, carried in every fragment's
/// header. `width`/`height` are in 8-pixel units as the RFC requires.
#[derive(Debug, Clone, Copy)]
pub struct JpegParams {
    pub type_code: u8,
    pub quality: u8,
    pub width_8: u8,
    pub height_8: u8,
}

/// Split `frame` (the JPEG scan data, headers stripped) into fragments, each
/// prefixed with the minimal 8-byte RFC 2435 header. Marker bit is 1 on the last
/// fragment only. The frame is chunked at `RTP_MAX_PAYLOAD`; the header is
/// additional overhead on top of that bound.
pub fn fragment(frame: &[u8], params: JpegParams) -> Vec<Fragment> {
    let chunks: Vec<&[u8]> = if frame.is_empty() {
        vec![&[][..]]
    } else {
        frame.chunks(RTP_MAX_PAYLOAD).collect()
    };

    let last = chunks.len() - 1;
    let mut offset: u32 = 0;

    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            let mut payload = Vec::with_capacity(HEADER_LEN + chunk.len());
            let offset_bytes = offset.to_be_bytes();
            payload.push(0); // type-specific
            payload.extend_from_slice(&offset_bytes[1..4]); // 24-bit fragment offset
            payload.push(params.type_code);
            payload.push(params.quality);
            payload.push(params.width_8);
            payload.push(params.height_8);
            payload.extend_from_slice(chunk);

            offset += chunk.len() as u32;
            (payload, i == last)
        })
        .collect()
}
