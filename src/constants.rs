//! Wire-fixed constants shared across negotiation, fragmentation and DTMF.

/// Maximum size of an RTP payload before SRTP expansion.
pub const RTP_MAX_PAYLOAD: usize = 1400;

/// Extra room reserved at the end of an outbound packet buffer so SRTP can append
/// its authentication tag (and, for SRTCP, grow the packet) in place.
pub const SRTP_MAX_PREFIX_LENGTH: usize = 148;

/// Length in bytes of the H.264 FU-A indicator + header pair.
pub const H264_RTP_HEADER_LENGTH: usize = 2;

/// Default RFC 2833 event packet spacing.
pub const RTP_EVENT_DEFAULT_SAMPLE_PERIOD_MS: u64 = 50;

/// Number of redundant packets sent at the start and end of a DTMF burst.
pub const DTMF_DUPLICATE_COUNT: u32 = 3;

/// Payload type assumed for `telephone-event` until the remote SDP says otherwise.
pub const DEFAULT_DTMF_PAYLOAD_ID: u8 = 101;

/// Clock rate assumed for generic audio codecs absent other information.
pub const DEFAULT_AUDIO_CLOCK_RATE: u32 = 8000;

/// Minimum length of a well-formed RTP header (no CSRC, no extension).
pub const RTP_MIN_HEADER_LEN: usize = 12;
