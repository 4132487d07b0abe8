//! The session coordinator: owns the four-track model, drives SDP offer/answer
//! negotiation, demultiplexes inbound RTP/RTCP, and fragments outbound media.
//!
//! One `Session` covers negotiation and per-packet bookkeeping together: this crate
//! has no bundling and no ICE, and a fixed four-slot track model, so there's no need
//! to split that work across a session plus one sub-session per media line.

use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use bytes::Bytes;
use sdp_types::{Connection, Direction, IceOptions, MediaType, Origin, SessionDescription, Time};

use crate::channel::{RtpChannel, SocketKind};
use crate::constants::DEFAULT_DTMF_PAYLOAD_ID;
use crate::dtmf::{self, DtmfEventRequest, DtmfPacketPlan};
use crate::error::{NegotiationError, TrackError};
use crate::events::{CloseReason, DtmfEvent, ReceivedRtpPacket, SessionEvent};
use crate::fragment::{self, Fragment};
use crate::rtcp::{ReceivedPacketInfo, RtcpSession, SentPacketInfo};
use crate::rtp_wire;
use crate::sdp;
use crate::track::{Capability, Kind, StreamStatus, Track};
use crate::transform::{NoOpTransform, SrtpTransform};

/// Which per-codec framing a `send_*_frame` call uses. `Generic` chunks without a
/// codec header, used for audio and any payload with no RTP packetization profile.
#[derive(Debug, Clone, Copy)]
enum Framing {
    Generic,
    Vp8,
    Jpeg(crate::fragment::jpeg::JpegParams),
    H264,
}

/// Negotiation and transport behavior fixed for the lifetime of a [`Session`].
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    /// RTP and RTCP share one channel/port pair.
    pub is_rtcp_muxed: bool,
    /// Audio and video share one channel/port pair (and one underlying socket).
    pub is_media_muxed: bool,
    /// Packets are protected/unprotected via the configured [`SrtpTransform`]; until
    /// `secure_context_ready` is set, all inbound packets are dropped.
    pub is_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            is_rtcp_muxed: true,
            is_media_muxed: false,
            is_secure: false,
        }
    }
}

/// Per-kind transport and control-plane state, held once per media kind rather than
/// once per track, since a muxed RTCP session is shared by the local and remote track
/// of the same kind.
struct MediaLeg {
    channel: Option<Box<dyn RtpChannel>>,
    rtcp: Option<Box<dyn RtcpSession>>,
    rtp_dest: Option<SocketAddr>,
    rtcp_dest: Option<SocketAddr>,
}

impl MediaLeg {
    fn empty() -> Self {
        MediaLeg {
            channel: None,
            rtcp: None,
            rtp_dest: None,
            rtcp_dest: None,
        }
    }
}

/// The RTP/RTCP session coordinator. See module docs.
pub struct Session {
    config: SessionConfig,

    local_audio: Option<Track>,
    local_video: Option<Track>,
    remote_audio: Option<Track>,
    remote_video: Option<Track>,

    audio: MediaLeg,
    video: MediaLeg,

    transform: Box<dyn SrtpTransform>,
    secure_context_ready: bool,

    remote_description: Option<SessionDescription>,
    remote_dtmf_payload_id: u8,

    rtp_event_in_progress: bool,

    is_started: bool,
    is_closed: bool,

    events: VecDeque<SessionEvent>,

    sdp_session_id: u64,
    sdp_session_version: u64,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Session {
            config,
            local_audio: None,
            local_video: None,
            remote_audio: None,
            remote_video: None,
            audio: MediaLeg::empty(),
            video: MediaLeg::empty(),
            transform: Box::new(NoOpTransform),
            secure_context_ready: !config.is_secure,
            remote_description: None,
            remote_dtmf_payload_id: DEFAULT_DTMF_PAYLOAD_ID,
            rtp_event_in_progress: false,
            is_started: false,
            is_closed: false,
            events: VecDeque::new(),
            sdp_session_id: rand::random::<u32>() as u64,
            sdp_session_version: 1,
        }
    }

    /// Install the transform used to protect/unprotect every outbound and inbound
    /// packet. Only meaningful when `SessionConfig::is_secure` is set; marks the
    /// secure context ready so inbound packets stop being dropped.
    pub fn set_transform(&mut self, transform: Box<dyn SrtpTransform>) {
        self.transform = transform;
        self.secure_context_ready = true;
    }

    /// Attach a channel for a media kind. Required before `create_offer`/`create_answer`
    /// can report a nonzero port for that kind. When `is_media_muxed`, the audio
    /// channel is reused for video traffic and a video channel is rejected.
    pub fn set_channel(&mut self, kind: Kind, channel: Box<dyn RtpChannel>) {
        if self.config.is_media_muxed && kind == Kind::Video {
            return;
        }
        self.leg_mut(kind).channel = Some(channel);
    }

    /// Attach the `RtcpSession` reporting engine for a media kind. If a local track of
    /// that kind already exists, the new session's SSRC is seeded from it immediately
    /// (mirrors `add_track`'s own seeding when the `RtcpSession` is attached first).
    pub fn set_rtcp_session(&mut self, kind: Kind, mut rtcp: Box<dyn RtcpSession>) {
        if let Some(track) = self.local_track(kind) {
            *rtcp.ssrc_mut() = track.ssrc;
        }
        self.leg_mut(kind).rtcp = Some(rtcp);
    }

    /// Add a local track. Fails if a local track of the same kind already exists:
    /// each kind holds at most one local and one remote track. If an `RtcpSession` is
    /// already attached for this kind, its SSRC is seeded from the new track.
    pub fn add_track(&mut self, kind: Kind, capabilities: Vec<Capability>) -> Result<(), TrackError> {
        if self.local_track(kind).is_some() {
            return Err(TrackError::DuplicateTrack(kind));
        }

        let track = Track::new_local(kind, capabilities, rand::random, rand::random);
        let ssrc = track.ssrc;

        match kind {
            Kind::Audio => self.local_audio = Some(track),
            Kind::Video => self.local_video = Some(track),
        }

        if let Some(rtcp) = &mut self.leg_mut(kind).rtcp {
            *rtcp.ssrc_mut() = ssrc;
        }

        Ok(())
    }

    /// Start the session: starts every attached `RtcpSession`. Channels are assumed
    /// already open (the host owns their lifecycle).
    pub fn start(&mut self) {
        if self.is_started {
            return;
        }
        self.is_started = true;

        if let Some(rtcp) = &mut self.audio.rtcp {
            rtcp.start();
        }
        if let Some(rtcp) = &mut self.video.rtcp {
            rtcp.start();
        }
    }

    /// Close the session: idempotent. Closes every attached channel, stops every
    /// attached `RtcpSession`, and queues a `Closed` event.
    pub fn close(&mut self, reason: CloseReason) {
        if self.is_closed {
            return;
        }
        self.is_closed = true;

        if let Some(channel) = &self.audio.channel {
            channel.close();
        }
        if let Some(channel) = &self.video.channel {
            channel.close();
        }
        if let Some(rtcp) = &mut self.audio.rtcp {
            rtcp.close();
        }
        if let Some(rtcp) = &mut self.video.rtcp {
            rtcp.close();
        }

        self.events.push_back(SessionEvent::Closed { reason });
    }

    /// Pop the next host-facing event, if any.
    pub fn poll_event(&mut self) -> Option<SessionEvent> {
        self.events.pop_front()
    }

    // --- negotiation -----------------------------------------------------------

    /// Build an SDP offer from the current local tracks. Fails if no local track has
    /// been added at all.
    pub fn create_offer(
        &mut self,
        connection_address: Option<IpAddr>,
    ) -> Result<SessionDescription, NegotiationError> {
        if self.local_audio.is_none() && self.local_video.is_none() {
            return Err(NegotiationError::NoLocalTracks);
        }

        let address = connection_address.unwrap_or_else(|| self.default_connection_address());
        let connection = Some(Connection {
            address: address.into(),
            ttl: None,
            num: None,
        });

        let mut media_descriptions = Vec::new();

        if let Some(track) = &self.local_audio {
            let port = self.audio.channel.as_ref().map_or(0, |c| c.rtp_port());
            media_descriptions.push(sdp::build_local_media_description(
                track,
                port,
                connection.clone(),
                self.config.is_rtcp_muxed,
            ));
        }

        if let Some(track) = &self.local_video {
            let port = self.video.channel.as_ref().map_or(0, |c| c.rtp_port());
            media_descriptions.push(sdp::build_local_media_description(
                track,
                port,
                connection.clone(),
                self.config.is_rtcp_muxed,
            ));
        }

        Ok(self.build_session_description(connection, media_descriptions))
    }

    /// Build an SDP answer to the previously set remote description. Fails if no
    /// remote description has been set yet.
    pub fn create_answer(
        &mut self,
        connection_address: Option<IpAddr>,
    ) -> Result<SessionDescription, NegotiationError> {
        let remote = self
            .remote_description
            .clone()
            .ok_or(NegotiationError::NoRemoteDescription)?;

        let address = connection_address.unwrap_or_else(|| self.default_connection_address());
        let connection = Some(Connection {
            address: address.into(),
            ttl: None,
            num: None,
        });

        let mut media_descriptions = Vec::with_capacity(remote.media_descriptions.len());

        for desc in &remote.media_descriptions {
            let kind = match desc.media.media_type {
                MediaType::Audio => Kind::Audio,
                MediaType::Video => Kind::Video,
                other => {
                    media_descriptions.push(sdp::rejected_media_description(other));
                    continue;
                }
            };

            let Some(track) = self.local_track(kind) else {
                media_descriptions.push(sdp::rejected_media_description(desc.media.media_type));
                continue;
            };

            let port = self.leg(kind).channel.as_ref().map_or(0, |c| c.rtp_port());
            let (answer_desc, intersected) = sdp::build_answer_media_description(
                track,
                desc,
                port,
                connection.clone(),
                self.config.is_rtcp_muxed,
            );

            let track = self.local_track_mut(kind).expect("checked above");
            track.capabilities = intersected;
            track.status = desc.direction.flipped().into();
            if track.media_id.is_none() {
                track.media_id = desc.mid.clone();
            }

            media_descriptions.push(answer_desc);
        }

        Ok(self.build_session_description(connection, media_descriptions))
    }

    fn build_session_description(
        &mut self,
        connection: Option<Connection>,
        media_descriptions: Vec<sdp_types::MediaDescription>,
    ) -> SessionDescription {
        self.sdp_session_version += 1;

        SessionDescription {
            origin: Origin {
                username: "-".into(),
                session_id: self.sdp_session_id.to_string().into(),
                session_version: self.sdp_session_version.to_string().into(),
                address: connection
                    .as_ref()
                    .map(|c| c.address.clone())
                    .unwrap_or(sdp_types::TaggedAddress::IP4(Ipv4Addr::UNSPECIFIED)),
            },
            name: "-".into(),
            connection,
            bandwidth: vec![],
            time: Time { start: 0, stop: 0 },
            direction: Direction::SendRecv,
            group: vec![],
            extmap: vec![],
            ice_lite: false,
            ice_options: IceOptions::default(),
            ice_ufrag: None,
            ice_pwd: None,
            attributes: vec![],
            media_descriptions,
        }
    }

    /// Apply a remote offer or answer. Validates capability compatibility for every
    /// kind that has a local track *before* committing any state, so a rejected
    /// description never leaves the session half-updated.
    pub fn set_remote_description(
        &mut self,
        remote: SessionDescription,
    ) -> Result<(), NegotiationError> {
        struct Pending {
            kind: Kind,
            capabilities: Vec<Capability>,
            status: StreamStatus,
            media_id: Option<bytesstr::BytesStr>,
            endpoints: Option<(SocketAddr, SocketAddr)>,
        }

        let mut pending = Vec::new();
        let mut dtmf_payload_id = None;

        for desc in &remote.media_descriptions {
            let kind = match desc.media.media_type {
                MediaType::Audio => Kind::Audio,
                MediaType::Video => Kind::Video,
                _ => continue,
            };

            let Some(local_track) = self.local_track(kind) else {
                continue;
            };

            let intersected = sdp::intersect(&local_track.capabilities, desc);
            if intersected.is_empty() {
                return Err(match kind {
                    Kind::Audio => NegotiationError::AudioIncompatible,
                    Kind::Video => NegotiationError::VideoIncompatible,
                });
            }

            if kind == Kind::Audio {
                if let Some(pt) = sdp::find_telephone_event(desc) {
                    dtmf_payload_id = Some(pt);
                }
            }

            pending.push(Pending {
                kind,
                capabilities: intersected,
                status: sdp::status_for_remote_announcement(desc),
                media_id: desc.mid.clone(),
                endpoints: sdp::resolve_media_endpoints(remote.connection.as_ref(), desc),
            });
        }

        let negotiated_kinds: Vec<Kind> = pending.iter().map(|p| p.kind).collect();

        for update in pending {
            let mut remote_track = Track::new_remote(update.kind, update.capabilities, update.status);
            remote_track.media_id = update.media_id;

            match update.kind {
                Kind::Audio => self.remote_audio = Some(remote_track),
                Kind::Video => self.remote_video = Some(remote_track),
            }

            if let Some((rtp_dest, rtcp_dest)) = update.endpoints {
                let is_muxed = self.config.is_rtcp_muxed;
                let leg = self.leg_mut(update.kind);
                leg.rtp_dest = Some(rtp_dest);
                if !is_muxed {
                    leg.rtcp_dest = Some(rtcp_dest);
                }
            }
        }

        if let Some(pt) = dtmf_payload_id {
            self.remote_dtmf_payload_id = pt;
        }

        // A kind the remote didn't (re-)announce goes inactive: per-track status
        // tracks its own announcement rather than a session-global direction.
        if !negotiated_kinds.contains(&Kind::Audio) {
            if let Some(track) = &mut self.local_audio {
                track.status = StreamStatus::Inactive;
            }
        }
        if !negotiated_kinds.contains(&Kind::Video) {
            if let Some(track) = &mut self.local_video {
                track.status = StreamStatus::Inactive;
            }
        }

        self.remote_description = Some(remote);
        Ok(())
    }

    fn default_connection_address(&self) -> IpAddr {
        let destination = self.audio.rtp_dest.or(self.video.rtp_dest);

        if let Some(dest) = destination {
            let bind_addr: SocketAddr = match dest {
                SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
                SocketAddr::V6(_) => (std::net::Ipv6Addr::UNSPECIFIED, 0).into(),
            };

            if let Ok(socket) = std::net::UdpSocket::bind(bind_addr) {
                if socket.connect(dest).is_ok() {
                    if let Ok(local) = socket.local_addr() {
                        return local.ip();
                    }
                }
            }
        }

        IpAddr::V4(Ipv4Addr::UNSPECIFIED)
    }

    // --- inbound -----------------------------------------------------------

    /// Demultiplex one inbound datagram. `local_endpoint` identifies which channel
    /// it arrived on, used to resolve media kind when not media-muxed.
    pub fn on_receive(&mut self, local_endpoint: SocketAddr, remote_endpoint: SocketAddr, buffer: &[u8]) {
        if buffer.len() < crate::constants::RTP_MIN_HEADER_LEN || !(128..=191).contains(&buffer[0]) {
            log::debug!("dropping datagram: too short or unsupported RTP version");
            return;
        }

        if self.config.is_secure && !self.secure_context_ready {
            log::debug!("dropping datagram: secure context not ready");
            return;
        }

        if matches!(buffer[1], 0xC8 | 0xC9) {
            self.on_receive_rtcp(remote_endpoint, buffer);
        } else {
            self.on_receive_rtp(local_endpoint, remote_endpoint, buffer);
        }
    }

    fn on_receive_rtcp(&mut self, remote_endpoint: SocketAddr, buffer: &[u8]) {
        let mut buf = buffer.to_vec();
        if let Err(e) = self.transform.unprotect_rtcp(&mut buf) {
            log::warn!("dropping RTCP packet: SRTCP unprotect failed: {e}");
            return;
        }

        let compound = match rtcp_types::Compound::parse(&buf) {
            Ok(c) => c,
            Err(e) => {
                log::debug!("dropping malformed RTCP packet: {e}");
                return;
            }
        };

        let mut report_ssrcs = Vec::new();
        let mut is_bye = false;

        for packet in compound {
            let packet = match packet {
                Ok(packet) => packet,
                Err(e) => {
                    log::debug!("dropping malformed RTCP packet in compound: {e}");
                    return;
                }
            };

            match packet {
                rtcp_types::Packet::Bye(_bye) => {
                    is_bye = true;
                }
                rtcp_types::Packet::Sr(sr) => {
                    report_ssrcs.push(sr.ssrc());
                    for block in sr.report_blocks() {
                        report_ssrcs.push(block.ssrc());
                    }
                }
                rtcp_types::Packet::Rr(rr) => {
                    report_ssrcs.push(rr.ssrc());
                    for block in rr.report_blocks() {
                        report_ssrcs.push(block.ssrc());
                    }
                }
                _ => {}
            }
        }

        let Some(kind) = self.match_rtcp_to_kind(&report_ssrcs) else {
            log::debug!("dropping RTCP packet: no matching track for any reported SSRC");
            return;
        };

        if is_bye {
            self.events.push_back(SessionEvent::RtcpBye { kind, reason: None });
            return;
        }

        self.learn_rtcp_dest(kind, remote_endpoint);

        if let Some(rtcp) = &mut self.leg_mut(kind).rtcp {
            rtcp.record_received(&ReceivedPacketInfo {
                ssrc: report_ssrcs.first().copied().unwrap_or(0),
                sequence_number: 0,
                timestamp: 0,
                payload_len: buf.len(),
                marker: false,
            });
        }

        self.events.push_back(SessionEvent::ReceiveReport {
            kind,
            compound: Bytes::copy_from_slice(&buf),
        });
    }

    /// An RTCP compound packet belongs to whichever media kind has a remote track
    /// whose SSRC appears as the packet's own SSRC or as a report-block SSRC.
    fn match_rtcp_to_kind(&self, ssrcs: &[u32]) -> Option<Kind> {
        if let Some(track) = &self.remote_audio {
            if ssrcs.contains(&track.ssrc) {
                return Some(Kind::Audio);
            }
        }
        if let Some(track) = &self.remote_video {
            if ssrcs.contains(&track.ssrc) {
                return Some(Kind::Video);
            }
        }

        if let Some(track) = &self.local_audio {
            if ssrcs.contains(&track.ssrc) {
                return Some(Kind::Audio);
            }
        }
        if let Some(track) = &self.local_video {
            if ssrcs.contains(&track.ssrc) {
                return Some(Kind::Video);
            }
        }

        None
    }

    fn on_receive_rtp(&mut self, local_endpoint: SocketAddr, remote_endpoint: SocketAddr, buffer: &[u8]) {
        let mut buf = buffer.to_vec();
        if let Err(e) = self.transform.unprotect_rtp(&mut buf) {
            log::warn!("dropping RTP packet: SRTP unprotect failed: {e}");
            return;
        }

        let Some(header) = rtp_wire::parse_header(&buf) else {
            log::debug!("dropping malformed RTP packet");
            return;
        };

        // DTMF telephony events are recognized and dispatched before kind resolution;
        // they are never treated as a media sample or recorded with an RtcpSession.
        if self.remote_dtmf_payload_id != 0 && header.payload_type == self.remote_dtmf_payload_id {
            if let Some(event) = rtp_wire::parse_payload(&buf).and_then(DtmfEvent::decode) {
                self.events.push_back(SessionEvent::RtpEvent { event, header });
            } else {
                log::debug!("dropping malformed telephony-event payload");
            }
            return;
        }

        let Some(kind) = self.match_rtp_to_kind(local_endpoint, &header) else {
            log::debug!(
                "dropping RTP packet: no track accepts payload type {}",
                header.payload_type
            );
            return;
        };

        self.learn_remote_ssrc(kind, header.ssrc);
        self.learn_rtp_dest(kind, remote_endpoint);

        let payload_len = buf.len();
        if let Some(rtcp) = &mut self.leg_mut(kind).rtcp {
            rtcp.record_received(&ReceivedPacketInfo {
                ssrc: header.ssrc,
                sequence_number: header.sequence_number,
                timestamp: header.timestamp,
                payload_len,
                marker: header.marker,
            });
        }

        let payload = match rtp_wire::parse_payload(&buf) {
            Some(payload) => Bytes::copy_from_slice(payload),
            None => return,
        };

        self.events.push_back(SessionEvent::RtpPacketReceived {
            kind,
            packet: ReceivedRtpPacket { header, payload },
        });
    }

    /// Media-kind resolution. Media-muxed sessions match by remote SSRC first,
    /// then by payload type against either remote track's capabilities, defaulting to
    /// audio (logged) if neither resolves. Non-muxed sessions match the datagram's
    /// arrival port against each kind's channel RTP port.
    fn match_rtp_to_kind(&self, local_endpoint: SocketAddr, header: &rtp_wire::RtpHeader) -> Option<Kind> {
        if self.config.is_media_muxed {
            if let Some(track) = &self.remote_audio {
                if track.ssrc != 0 && track.ssrc == header.ssrc {
                    return Some(Kind::Audio);
                }
            }
            if let Some(track) = &self.remote_video {
                if track.ssrc != 0 && track.ssrc == header.ssrc {
                    return Some(Kind::Video);
                }
            }

            if let Some(track) = &self.remote_audio {
                if track.capability_by_pt(header.payload_type).is_some() {
                    return Some(Kind::Audio);
                }
            }
            if let Some(track) = &self.remote_video {
                if track.capability_by_pt(header.payload_type).is_some() {
                    return Some(Kind::Video);
                }
            }

            log::debug!(
                "media-muxed RTP packet (pt {}) matched neither SSRC nor a track capability; defaulting to audio",
                header.payload_type
            );
            return Some(Kind::Audio);
        }

        if self.audio.channel.as_ref().map(|c| c.rtp_port()) == Some(local_endpoint.port()) {
            return Some(Kind::Audio);
        }
        if self.video.channel.as_ref().map(|c| c.rtp_port()) == Some(local_endpoint.port()) {
            return Some(Kind::Video);
        }

        None
    }

    fn learn_remote_ssrc(&mut self, kind: Kind, ssrc: u32) {
        if let Some(track) = self.remote_track_mut(kind) {
            if track.ssrc == 0 {
                track.ssrc = ssrc;
            }
        }
    }

    fn learn_rtp_dest(&mut self, kind: Kind, remote_endpoint: SocketAddr) {
        let leg = self.leg_mut(kind);
        if leg.rtp_dest != Some(remote_endpoint) {
            leg.rtp_dest = Some(remote_endpoint);
        }
    }

    fn learn_rtcp_dest(&mut self, kind: Kind, remote_endpoint: SocketAddr) {
        let is_muxed = self.config.is_rtcp_muxed;
        let leg = self.leg_mut(kind);
        if !is_muxed && leg.rtcp_dest != Some(remote_endpoint) {
            leg.rtcp_dest = Some(remote_endpoint);
        }
    }

    /// Transmit a compound RTCP report the kind's `RtcpSession` has built (from its
    /// own host-driven timer; report scheduling itself is entirely its concern). The
    /// host calls this from whatever drives that timer, mirroring how `on_receive`
    /// is called from whatever drives the inbound socket. Applies SRTCP protect if
    /// installed, sends on the RTCP socket (or the muxed RTP one), and queues
    /// `SessionEvent::SendReport`.
    pub fn send_rtcp(&mut self, kind: Kind, compound: Bytes) {
        if self.is_closed {
            return;
        }
        if self.config.is_secure && !self.secure_context_ready {
            log::debug!("dropping outbound RTCP packet: secure context not ready");
            return;
        }

        let is_muxed = self.config.is_rtcp_muxed;
        let leg = self.leg(kind);
        let Some(dest) = leg.rtcp_dest.or(leg.rtp_dest) else {
            return;
        };

        let mut buf = compound.to_vec();
        if let Err(e) = self.transform.protect_rtcp(&mut buf) {
            log::warn!("dropping outbound RTCP packet: SRTCP protect failed: {e}");
            return;
        }

        let leg = self.leg(kind);
        if let Some(channel) = &leg.channel {
            let socket = if is_muxed { SocketKind::Rtp } else { SocketKind::Rtcp };
            if let Err(e) = channel.send(socket, dest, &buf) {
                log::warn!("failed to send RTCP packet: {e}");
            }
        }

        self.events.push_back(SessionEvent::SendReport {
            kind,
            compound: Bytes::copy_from_slice(&buf),
        });
    }

    /// Check each attached leg's `RtcpSession::last_activity_at` against `now`, and
    /// queue `SessionEvent::Timeout` for a kind that hasn't heard anything in more
    /// than `stale_after`. The host calls this from whatever drives its own timer
    /// (there's no internal clock here, same as `send_rtcp`'s report timer); a leg
    /// with no `RtcpSession` attached, or one that has never recorded activity, is
    /// never considered timed out.
    pub fn check_timeouts(&mut self, now: Instant, stale_after: Duration) {
        if self.is_closed {
            return;
        }

        for kind in [Kind::Audio, Kind::Video] {
            let Some(rtcp) = &self.leg(kind).rtcp else {
                continue;
            };
            let Some(last_activity) = rtcp.last_activity_at() else {
                continue;
            };

            if now.saturating_duration_since(last_activity) >= stale_after {
                self.events.push_back(SessionEvent::Timeout { kind });
            }
        }
    }

    // --- outbound media ------------------------------------------------------

    /// Send one generic audio frame (PCMU/PCMA/Opus/...), fragmented at
    /// `RTP_MAX_PAYLOAD` with no codec header.
    pub fn send_audio_frame(&mut self, frame: &[u8], duration: u32) -> Result<(), TrackError> {
        self.send_framed(Kind::Audio, frame, duration, Framing::Generic)
    }

    /// Send one VP8 frame, fragmented with the 1-byte VP8 payload descriptor.
    pub fn send_vp8_frame(&mut self, frame: &[u8], duration: u32) -> Result<(), TrackError> {
        self.send_framed(Kind::Video, frame, duration, Framing::Vp8)
    }

    /// Send one JPEG frame, fragmented with the minimal 8-byte RFC 2435 header.
    pub fn send_jpeg_frame(
        &mut self,
        frame: &[u8],
        duration: u32,
        params: crate::fragment::jpeg::JpegParams,
    ) -> Result<(), TrackError> {
        self.send_framed(Kind::Video, frame, duration, Framing::Jpeg(params))
    }

    /// Send one H.264 NAL unit, fragmented into FU-A packets.
    pub fn send_h264_frame(&mut self, frame: &[u8], duration: u32) -> Result<(), TrackError> {
        self.send_framed(Kind::Video, frame, duration, Framing::H264)
    }

    /// Manually set the RTP destination for a media kind, bypassing SDP negotiation
    /// and address-learning. Exists for hosts that peer out-of-band (tests, or static
    /// pre-shared endpoints) rather than via offer/answer.
    pub fn set_rtp_destination(&mut self, kind: Kind, dest: SocketAddr) {
        self.leg_mut(kind).rtp_dest = Some(dest);
    }

    fn send_framed(
        &mut self,
        kind: Kind,
        frame: &[u8],
        duration: u32,
        framing: Framing,
    ) -> Result<(), TrackError> {
        // Shared precondition: closed, a DTMF burst in flight, or no destination yet
        // resolved all make every send path a silent no-op.
        if self.is_closed || self.rtp_event_in_progress {
            return Ok(());
        }
        if self.leg(kind).rtp_dest.is_none() {
            return Ok(());
        }

        let track = self.local_track(kind).ok_or(TrackError::MissingSendingFormat)?;
        if !track.status.can_send() {
            return Ok(());
        }
        let payload_type = track
            .sending_format()
            .ok_or(TrackError::MissingSendingFormat)?
            .payload_type;

        let fragments: Vec<Fragment> = match framing {
            Framing::Generic => fragment::audio::fragment(frame),
            Framing::Vp8 => fragment::vp8::fragment(frame),
            Framing::Jpeg(params) => fragment::jpeg::fragment(frame, params),
            Framing::H264 => fragment::h264::fragment(frame),
        };

        for (payload, marker) in fragments {
            self.write_rtp_packet(kind, payload_type, marker, &payload)?;
        }

        if let Some(track) = self.local_track_mut(kind) {
            track.advance_timestamp(duration);
        }

        Ok(())
    }

    /// Shared write path: stamp sequence number/timestamp/ssrc, protect, send on
    /// the RTP (or muxed) socket, and record the send with the leg's `RtcpSession`.
    fn write_rtp_packet(
        &mut self,
        kind: Kind,
        payload_type: u8,
        marker: bool,
        payload: &[u8],
    ) -> Result<(), TrackError> {
        if self.config.is_secure && !self.secure_context_ready {
            log::debug!("dropping outbound packet: secure context not ready");
            return Ok(());
        }

        let (ssrc, timestamp, sequence_number) = {
            let track = self
                .local_track_mut(kind)
                .ok_or(TrackError::MissingSendingFormat)?;
            (track.ssrc, track.timestamp, track.next_seq_num())
        };

        let mut buf = Vec::with_capacity(payload.len() + crate::constants::SRTP_MAX_PREFIX_LENGTH);
        rtp_wire::write_packet(&mut buf, payload_type, sequence_number, timestamp, ssrc, marker, payload);

        if let Err(e) = self.transform.protect_rtp(&mut buf) {
            log::warn!("dropping outbound RTP packet: SRTP protect failed: {e}");
            return Ok(());
        }

        let leg = self.leg(kind);
        if let (Some(channel), Some(dest)) = (&leg.channel, leg.rtp_dest) {
            if let Err(e) = channel.send(SocketKind::Rtp, dest, &buf) {
                log::warn!("failed to send RTP packet: {e}");
            }
        }

        let payload_len = buf.len();
        if let Some(rtcp) = &mut self.leg_mut(kind).rtcp {
            rtcp.record_sent(&SentPacketInfo {
                ssrc,
                sequence_number,
                timestamp,
                payload_len,
                marker,
            });
        }

        Ok(())
    }

    // --- DTMF ------------------------------------------------------------------

    /// Send one RFC 2833 telephony event to completion. Only one event may be in
    /// flight on the audio track at a time.
    #[cfg(feature = "tokio")]
    pub async fn send_dtmf_event(
        &mut self,
        event_id: u8,
        volume: u8,
        total_duration: u16,
    ) -> Result<bool, TrackError> {
        if self.rtp_event_in_progress || self.is_closed {
            return Ok(false);
        }
        if self.leg(Kind::Audio).rtp_dest.is_none() {
            return Ok(false);
        }

        let Some(track) = self.local_track(Kind::Audio) else {
            return Ok(false);
        };
        let clock_rate = track
            .sending_format()
            .map(|c| c.clock_rate)
            .unwrap_or(crate::constants::DEFAULT_AUDIO_CLOCK_RATE);

        let plan = dtmf::build_plan(DtmfEventRequest {
            event_id,
            volume,
            total_duration,
            clock_rate,
        });

        self.rtp_event_in_progress = true;

        let cancelled = std::cell::Cell::new(false);
        let dtmf_payload_id = self.remote_dtmf_payload_id;
        let completed = dtmf::drive(
            plan,
            || cancelled.get(),
            |packet: &DtmfPacketPlan| {
                let payload = packet.encode();
                if self
                    .write_rtp_packet(Kind::Audio, dtmf_payload_id, packet.marker, &payload)
                    .is_err()
                {
                    cancelled.set(true);
                }
            },
        )
        .await;

        self.rtp_event_in_progress = false;
        Ok(completed)
    }

    // --- track/leg accessors -----------------------------------------------

    fn local_track(&self, kind: Kind) -> Option<&Track> {
        match kind {
            Kind::Audio => self.local_audio.as_ref(),
            Kind::Video => self.local_video.as_ref(),
        }
    }

    fn local_track_mut(&mut self, kind: Kind) -> Option<&mut Track> {
        match kind {
            Kind::Audio => self.local_audio.as_mut(),
            Kind::Video => self.local_video.as_mut(),
        }
    }

    fn remote_track_mut(&mut self, kind: Kind) -> Option<&mut Track> {
        match kind {
            Kind::Audio => self.remote_audio.as_mut(),
            Kind::Video => self.remote_video.as_mut(),
        }
    }

    fn leg(&self, kind: Kind) -> &MediaLeg {
        match (self.config.is_media_muxed, kind) {
            (true, Kind::Video) => &self.audio,
            (_, Kind::Audio) => &self.audio,
            (_, Kind::Video) => &self.video,
        }
    }

    fn leg_mut(&mut self, kind: Kind) -> &mut MediaLeg {
        match (self.config.is_media_muxed, kind) {
            (true, Kind::Video) => &mut self.audio,
            (_, Kind::Audio) => &mut self.audio,
            (_, Kind::Video) => &mut self.video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RtpChannel;
    use std::sync::{Arc, Mutex};

    struct RecordingChannel {
        port: u16,
        sent: Arc<Mutex<Vec<(SocketAddr, Vec<u8>)>>>,
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

    fn pcmu() -> Capability {
        Capability::new(0, "PCMU", 8000)
    }

    #[test]
    fn add_track_rejects_duplicate_kind() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();
        let err = session.add_track(Kind::Audio, vec![pcmu()]).unwrap_err();
        assert_eq!(err, TrackError::DuplicateTrack(Kind::Audio));
    }

    #[test]
    fn create_offer_fails_without_any_local_track() {
        let mut session = Session::new(SessionConfig::default());
        let err = session
            .create_offer(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)))
            .unwrap_err();
        assert_eq!(err, NegotiationError::NoLocalTracks);
    }

    #[test]
    fn create_offer_reports_channel_port() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: Arc::new(Mutex::new(Vec::new())),
            }),
        );

        let offer = session
            .create_offer(Some(IpAddr::V4(Ipv4Addr::LOCALHOST)))
            .unwrap();
        assert_eq!(offer.media_descriptions.len(), 1);
        assert_eq!(offer.media_descriptions[0].media.port, 30000);
    }

    // While a DTMF burst is in progress, a concurrent `send_audio_frame` call
    // returns without emitting RTP.
    #[test]
    fn rtp_event_in_progress_blocks_concurrent_audio_send() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: sent.clone(),
            }),
        );
        session.set_rtp_destination(Kind::Audio, "127.0.0.1:40000".parse().unwrap());

        session.rtp_event_in_progress = true;
        session.send_audio_frame(&[1, 2, 3], 160).unwrap();
        assert!(sent.lock().unwrap().is_empty());

        session.rtp_event_in_progress = false;
        session.send_audio_frame(&[1, 2, 3], 160).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn send_audio_frame_writes_through_the_channel() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: sent.clone(),
            }),
        );
        session.set_rtp_destination(Kind::Audio, "127.0.0.1:40000".parse().unwrap());

        session.send_audio_frame(&[1, 2, 3, 4], 160).unwrap();

        let sent = sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "127.0.0.1:40000".parse::<SocketAddr>().unwrap());

        let header = rtp_wire::parse_header(&sent[0].1).unwrap();
        assert_eq!(header.payload_type, 0);
        assert_eq!(header.sequence_number, session.local_audio.as_ref().unwrap().seq_num.wrapping_sub(1));
    }

    // A secure session drops outbound sends until a transform is installed, then
    // passes packets through once it is.
    #[test]
    fn secure_session_blocks_send_until_transform_installed() {
        let mut config = SessionConfig::default();
        config.is_secure = true;
        let mut session = Session::new(config);
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: sent.clone(),
            }),
        );
        session.set_rtp_destination(Kind::Audio, "127.0.0.1:40000".parse().unwrap());

        session.send_audio_frame(&[1, 2, 3], 160).unwrap();
        assert!(sent.lock().unwrap().is_empty());

        session.set_transform(Box::new(NoOpTransform));
        session.send_audio_frame(&[1, 2, 3], 160).unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[test]
    fn on_receive_drops_non_rtp_version_bytes() {
        let mut session = Session::new(SessionConfig::default());
        session.on_receive(
            "127.0.0.1:30000".parse().unwrap(),
            "127.0.0.1:1".parse().unwrap(),
            &[0u8; 20],
        );
        assert!(session.poll_event().is_none());
    }

    #[test]
    fn on_receive_dispatches_rtp_packet_event() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: Arc::new(Mutex::new(Vec::new())),
            }),
        );
        session
            .set_remote_description(remote_offer_with_pcmu())
            .unwrap();

        let mut buf = Vec::new();
        rtp_wire::write_packet(&mut buf, 0, 1, 160, 0xaabbccdd, false, b"payload");

        session.on_receive(
            "127.0.0.1:30000".parse().unwrap(),
            "127.0.0.1:40000".parse().unwrap(),
            &buf,
        );

        let event = session.poll_event().expect("event queued");
        match event {
            SessionEvent::RtpPacketReceived { kind, packet } => {
                assert_eq!(kind, Kind::Audio);
                assert_eq!(&packet.payload[..], b"payload");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        assert_eq!(session.remote_audio.as_ref().unwrap().ssrc, 0xaabbccdd);
    }

    // Once learned, a remote endpoint observed again on a later packet does not
    // trigger a redundant write to the leg's destination.
    #[test]
    fn address_learning_is_idempotent_after_first_packet() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: Arc::new(Mutex::new(Vec::new())),
            }),
        );
        session
            .set_remote_description(remote_offer_with_pcmu())
            .unwrap();

        let mut first = Vec::new();
        rtp_wire::write_packet(&mut first, 0, 1, 160, 0xaabbccdd, false, b"one");
        session.on_receive(
            "127.0.0.1:30000".parse().unwrap(),
            "127.0.0.1:40000".parse().unwrap(),
            &first,
        );
        session.poll_event();
        let dest_after_first = session.audio.rtp_dest;

        let mut second = Vec::new();
        rtp_wire::write_packet(&mut second, 0, 2, 320, 0xaabbccdd, false, b"two");
        session.on_receive(
            "127.0.0.1:30000".parse().unwrap(),
            "127.0.0.1:40000".parse().unwrap(),
            &second,
        );
        session.poll_event();

        assert_eq!(session.audio.rtp_dest, dest_after_first);
        assert_eq!(session.remote_audio.as_ref().unwrap().ssrc, 0xaabbccdd);
    }

    #[test]
    fn close_is_idempotent_and_suppresses_further_sends() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();
        let sent = Arc::new(Mutex::new(Vec::new()));
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: sent.clone(),
            }),
        );
        session.set_rtp_destination(Kind::Audio, "127.0.0.1:40000".parse().unwrap());

        session.close(CloseReason::Requested);
        session.close(CloseReason::Requested);

        session.send_audio_frame(&[1, 2, 3], 160).unwrap();
        assert!(sent.lock().unwrap().is_empty());
    }

    struct FakeRtcpSession {
        ssrc: u32,
        started: bool,
        closed: bool,
        last_activity_at: Option<Instant>,
    }

    impl FakeRtcpSession {
        fn new() -> Self {
            FakeRtcpSession {
                ssrc: 0,
                started: false,
                closed: false,
                last_activity_at: None,
            }
        }

        fn with_last_activity_at(last_activity_at: Instant) -> Self {
            FakeRtcpSession {
                last_activity_at: Some(last_activity_at),
                ..FakeRtcpSession::new()
            }
        }
    }

    impl RtcpSession for FakeRtcpSession {
        fn start(&mut self) {
            self.started = true;
        }
        fn close(&mut self) {
            self.closed = true;
        }
        fn record_sent(&mut self, _packet: &SentPacketInfo) {}
        fn record_received(&mut self, _packet: &ReceivedPacketInfo) {}
        fn ssrc_mut(&mut self) -> &mut u32 {
            &mut self.ssrc
        }
        fn last_activity_at(&self) -> Option<std::time::Instant> {
            self.last_activity_at
        }
    }

    // `check_timeouts` queues `SessionEvent::Timeout` once a leg's `RtcpSession`
    // hasn't recorded activity in more than the given staleness window.
    #[test]
    fn check_timeouts_queues_timeout_for_stale_leg() {
        let mut session = Session::new(SessionConfig::default());
        let last_activity = Instant::now() - Duration::from_secs(60);
        session.set_rtcp_session(
            Kind::Audio,
            Box::new(FakeRtcpSession::with_last_activity_at(last_activity)),
        );

        session.check_timeouts(Instant::now(), Duration::from_secs(30));

        match session.poll_event() {
            Some(SessionEvent::Timeout { kind }) => assert_eq!(kind, Kind::Audio),
            other => panic!("expected Timeout event, got {other:?}"),
        }
    }

    // A leg whose `RtcpSession` has recently recorded activity stays quiet.
    #[test]
    fn check_timeouts_stays_quiet_for_fresh_leg() {
        let mut session = Session::new(SessionConfig::default());
        session.set_rtcp_session(
            Kind::Audio,
            Box::new(FakeRtcpSession::with_last_activity_at(Instant::now())),
        );

        session.check_timeouts(Instant::now(), Duration::from_secs(30));

        assert!(session.poll_event().is_none());
    }

    // A leg with no `RtcpSession` attached (or one that never recorded activity)
    // never times out.
    #[test]
    fn check_timeouts_ignores_leg_with_no_activity_recorded() {
        let mut session = Session::new(SessionConfig::default());
        session.set_rtcp_session(Kind::Audio, Box::new(FakeRtcpSession::new()));

        session.check_timeouts(Instant::now(), Duration::from_secs(30));

        assert!(session.poll_event().is_none());
    }

    // `add_track` seeds an already-attached `RtcpSession`'s SSRC from the new local
    // track, per the session-configuration contract in spec.md §4.1.
    #[test]
    fn add_track_seeds_rtcp_session_ssrc_when_session_attached_first() {
        let mut session = Session::new(SessionConfig::default());
        session.set_rtcp_session(Kind::Audio, Box::new(FakeRtcpSession::new()));
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();

        let expected = session.local_audio.as_ref().unwrap().ssrc;
        let leg_rtcp = session.audio.rtcp.as_mut().unwrap();
        assert_eq!(*leg_rtcp.ssrc_mut(), expected);
    }

    // The reverse attach order (track first, then session) also seeds the SSRC.
    #[test]
    fn set_rtcp_session_seeds_ssrc_when_track_attached_first() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();
        let expected = session.local_audio.as_ref().unwrap().ssrc;

        session.set_rtcp_session(Kind::Audio, Box::new(FakeRtcpSession::new()));

        let leg_rtcp = session.audio.rtcp.as_mut().unwrap();
        assert_eq!(*leg_rtcp.ssrc_mut(), expected);
    }

    #[test]
    fn send_rtcp_transmits_compound_and_queues_send_report_event() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();

        let sent = Arc::new(Mutex::new(Vec::new()));
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: sent.clone(),
            }),
        );
        session.set_rtp_destination(Kind::Audio, "127.0.0.1:40000".parse().unwrap());

        session.send_rtcp(Kind::Audio, Bytes::from_static(b"compound-report"));

        assert_eq!(sent.lock().unwrap().len(), 1);
        assert_eq!(&sent.lock().unwrap()[0].1, b"compound-report");

        match session.poll_event().expect("event queued") {
            SessionEvent::SendReport { kind, compound } => {
                assert_eq!(kind, Kind::Audio);
                assert_eq!(&compound[..], b"compound-report");
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn send_rtcp_is_a_no_op_once_closed() {
        let mut session = Session::new(SessionConfig::default());
        session.add_track(Kind::Audio, vec![pcmu()]).unwrap();
        let sent = Arc::new(Mutex::new(Vec::new()));
        session.set_channel(
            Kind::Audio,
            Box::new(RecordingChannel {
                port: 30000,
                sent: sent.clone(),
            }),
        );
        session.set_rtp_destination(Kind::Audio, "127.0.0.1:40000".parse().unwrap());
        session.close(CloseReason::Requested);
        session.poll_event();

        session.send_rtcp(Kind::Audio, Bytes::from_static(b"late-report"));
        assert!(sent.lock().unwrap().is_empty());
        assert!(session.poll_event().is_none());
    }

    fn remote_offer_with_pcmu() -> SessionDescription {
        use sdp_types::{Media, MediaDescription, TransportProtocol};

        SessionDescription {
            origin: Origin {
                username: "-".into(),
                session_id: "1".into(),
                session_version: "1".into(),
                address: sdp_types::TaggedAddress::IP4(Ipv4Addr::LOCALHOST),
            },
            name: "-".into(),
            connection: Some(Connection {
                address: sdp_types::TaggedAddress::IP4(Ipv4Addr::LOCALHOST),
                ttl: None,
                num: None,
            }),
            bandwidth: vec![],
            time: Time { start: 0, stop: 0 },
            direction: Direction::SendRecv,
            group: vec![],
            extmap: vec![],
            ice_lite: false,
            ice_options: IceOptions::default(),
            ice_ufrag: None,
            ice_pwd: None,
            attributes: vec![],
            media_descriptions: vec![MediaDescription {
                media: Media {
                    media_type: MediaType::Audio,
                    port: 40000,
                    ports_num: None,
                    proto: TransportProtocol::RtpAvp,
                    fmts: vec![0],
                },
                connection: None,
                bandwidth: vec![],
                direction: Direction::SendRecv,
                rtcp: None,
                rtcp_mux: true,
                mid: None,
                rtpmap: vec![],
                fmtp: vec![],
                ice_ufrag: None,
                ice_pwd: None,
                ice_candidates: vec![],
                ice_end_of_candidates: false,
                crypto: vec![],
                extmap: vec![],
                extmap_allow_mixed: false,
                ssrc: vec![],
                setup: None,
                fingerprint: vec![],
                attributes: vec![],
            }],
        }
    }
}
