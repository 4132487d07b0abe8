//! Error taxonomy for the session core.
//!
//! Negotiation failures and track-invariant violations are returned to the caller,
//! while transform failures and malformed input are logged and dropped without ever
//! reaching a `Result` — a host can't act on a corrupt packet beyond dropping it.

/// Failures that can occur while running SDP offer/answer negotiation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum NegotiationError {
    /// `create_offer` was called without a single local track configured.
    #[error("no local tracks are configured, nothing to offer")]
    NoLocalTracks,
    /// `create_answer` was called before `set_remote_description`.
    #[error("cannot create an answer before a remote description is set")]
    NoRemoteDescription,
    /// The remote offer's audio section shares no capability with the local audio track.
    #[error("remote audio capabilities are incompatible with the local track")]
    AudioIncompatible,
    /// The remote offer's video section shares no capability with the local video track.
    #[error("remote video capabilities are incompatible with the local track")]
    VideoIncompatible,
}

/// Failures that violate an invariant of the track/session model and are fatal to the
/// call that triggered them (but not to the session itself).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TrackError {
    /// A track of the same kind and locality already exists on the session.
    #[error("a {0:?} track already exists for this locality")]
    DuplicateTrack(crate::track::Kind),
    /// No negotiated capability is available to send with.
    #[error("no sending format has been negotiated for this track")]
    MissingSendingFormat,
}

/// A pluggable SRTP/SRTCP transform reported failure protecting or unprotecting a
/// packet. Carries no detail beyond "nonzero" per the external transform contract;
/// the caller only ever logs and drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("transform returned a nonzero result code {0}")]
pub struct TransformError(pub i32);
