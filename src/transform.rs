//! The `SrtpTransform` collaborator contract and an optional adapter over `ezk-srtp`.
//!
//! The session core treats encryption as opaque: it calls `protect_*`/`unprotect_*`
//! around every send/receive and logs+drops on failure. It never inspects key
//! material or negotiates crypto suites itself — that belongs to whatever sets up the
//! `SrtpTransform` implementation (SDES, DTLS-SRTP, ...).

use crate::error::TransformError;

/// Protects and unprotects RTP/RTCP packets in place.
pub trait SrtpTransform {
    fn protect_rtp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError>;
    fn unprotect_rtp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError>;
    fn protect_rtcp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError>;
    fn unprotect_rtcp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError>;
}

/// A transform that does nothing, used when `SessionConfig::is_secure` is false.
pub struct NoOpTransform;

impl SrtpTransform for NoOpTransform {
    fn protect_rtp(&mut self, _buf: &mut Vec<u8>) -> Result<(), TransformError> {
        Ok(())
    }

    fn unprotect_rtp(&mut self, _buf: &mut Vec<u8>) -> Result<(), TransformError> {
        Ok(())
    }

    fn protect_rtcp(&mut self, _buf: &mut Vec<u8>) -> Result<(), TransformError> {
        Ok(())
    }

    fn unprotect_rtcp(&mut self, _buf: &mut Vec<u8>) -> Result<(), TransformError> {
        Ok(())
    }
}

#[cfg(feature = "srtp")]
mod ezk_adapter {
    use super::SrtpTransform;
    use crate::error::TransformError;

    /// Adapts an `ezk_srtp::SrtpSession` (one per direction pair) to this crate's
    /// transform contract.
    pub struct EzkSrtpTransform {
        session: srtp::SrtpSession,
    }

    impl EzkSrtpTransform {
        pub fn new(session: srtp::SrtpSession) -> Self {
            EzkSrtpTransform { session }
        }
    }

    impl SrtpTransform for EzkSrtpTransform {
        fn protect_rtp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError> {
            self.session
                .protect_rtp(buf)
                .map_err(|_| TransformError(-1))
        }

        fn unprotect_rtp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError> {
            self.session
                .unprotect_rtp(buf)
                .map_err(|_| TransformError(-1))
        }

        fn protect_rtcp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError> {
            self.session
                .protect_rtcp(buf)
                .map_err(|_| TransformError(-1))
        }

        fn unprotect_rtcp(&mut self, buf: &mut Vec<u8>) -> Result<(), TransformError> {
            self.session
                .unprotect_rtcp(buf)
                .map_err(|_| TransformError(-1))
        }
    }
}

#[cfg(feature = "srtp")]
pub use ezk_adapter::EzkSrtpTransform;
