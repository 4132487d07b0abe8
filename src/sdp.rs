//! SDP offer/answer helpers: capability intersection and media-section building.
//!
//! Payload-type matching splits static (<96, id-only) from dynamic (96-127,
//! name+clock-rate+params) per RFC 3264, against this crate's fixed four-track model
//! rather than an arbitrary-count media collection.

use sdp_types::{Connection, Direction, MediaDescription, MediaType, TaggedAddress, TransportProtocol};

use crate::track::{Capability, Kind, StreamStatus, Track};

fn kind_to_media_type(kind: Kind) -> MediaType {
    match kind {
        Kind::Audio => MediaType::Audio,
        Kind::Video => MediaType::Video,
    }
}

/// RFC 3264 §6.1 format-matching: intersect `local` (in priority order) against
/// `remote`'s advertised formats, returning capabilities carrying the remote's
/// payload-type id (since that's what outbound packets for this leg must use).
pub fn intersect(local: &[Capability], remote: &MediaDescription) -> Vec<Capability> {
    local
        .iter()
        .filter_map(|local_cap| {
            if local_cap.payload_type < 96 {
                return remote
                    .media
                    .fmts
                    .contains(&local_cap.payload_type)
                    .then(|| local_cap.clone());
            }

            remote.rtpmap.iter().find_map(|rtpmap| {
                let remote_params = remote
                    .fmtp
                    .iter()
                    .find(|fmtp| fmtp.format == rtpmap.payload as u32)
                    .map(|fmtp| fmtp.params.clone());

                let remote_cap = Capability {
                    payload_type: rtpmap.payload,
                    name: rtpmap.encoding.clone(),
                    clock_rate: rtpmap.clock_rate,
                    params: remote_params,
                };

                local_cap.matches(&remote_cap).then(|| Capability {
                    payload_type: remote_cap.payload_type,
                    ..local_cap.clone()
                })
            })
        })
        .collect()
}

/// Scan a media section's `rtpmap` entries for a `telephone-event` encoding,
/// returning its payload-type id. Used to learn `remote_dtmf_payload_id`.
pub fn find_telephone_event(desc: &MediaDescription) -> Option<u8> {
    desc.rtpmap
        .iter()
        .find(|rtpmap| rtpmap.encoding.eq_ignore_ascii_case("telephone-event"))
        .map(|rtpmap| rtpmap.payload)
}

/// Build the `m=`/`a=rtpmap`/`a=fmtp` section for a local (outbound) track.
///
/// `port` is the track's channel RTP port, or 0 if the track has no negotiated
/// capabilities (nothing to send/receive).
pub fn build_local_media_description(
    track: &Track,
    port: u16,
    connection: Option<Connection>,
    rtcp_mux: bool,
) -> MediaDescription {
    let port = if track.capabilities.is_empty() { 0 } else { port };

    let fmts = track.capabilities.iter().map(|c| c.payload_type).collect();
    let rtpmap = track
        .capabilities
        .iter()
        .map(|c| sdp_types::RtpMap {
            payload: c.payload_type,
            encoding: c.name.clone(),
            clock_rate: c.clock_rate,
            params: None,
        })
        .collect();
    let fmtp = track
        .capabilities
        .iter()
        .filter_map(|c| {
            c.params.clone().map(|params| sdp_types::Fmtp {
                format: c.payload_type as u32,
                params,
            })
        })
        .collect();

    MediaDescription {
        media: sdp_types::Media {
            media_type: kind_to_media_type(track.kind),
            port,
            ports_num: None,
            proto: TransportProtocol::RtpAvp,
            fmts,
        },
        connection,
        bandwidth: vec![],
        direction: track.status.into(),
        rtcp: None,
        rtcp_mux,
        mid: track.media_id.clone(),
        rtpmap,
        fmtp,
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
    }
}

/// A media section rejecting a media type, per RFC 3264 §6.1: port 0, direction
/// inactive, no formats. Takes the remote's own `MediaType` (rather than `Kind`) so
/// an offered section this crate doesn't support (e.g. `application`) is rejected
/// under its own label instead of being mislabeled as audio or video.
pub fn rejected_media_description(media_type: MediaType) -> MediaDescription {
    MediaDescription {
        media: sdp_types::Media {
            media_type,
            port: 0,
            ports_num: None,
            proto: TransportProtocol::RtpAvp,
            fmts: vec![],
        },
        connection: None,
        bandwidth: vec![],
        direction: Direction::Inactive,
        rtcp: None,
        rtcp_mux: false,
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
    }
}

/// Answer section for a media kind we do have a local track for: the intersection
/// of local and remote capabilities, preserving local priority order.
pub fn build_answer_media_description(
    track: &Track,
    remote: &MediaDescription,
    port: u16,
    connection: Option<Connection>,
    rtcp_mux: bool,
) -> (MediaDescription, Vec<Capability>) {
    let intersected = intersect(&track.capabilities, remote);

    let mut answer_track = track.clone();
    answer_track.capabilities = intersected.clone();
    answer_track.status = remote.direction.flipped().into();

    (
        build_local_media_description(&answer_track, port, connection, rtcp_mux),
        intersected,
    )
}

/// Resolve a `TaggedAddress` + port into a socket address. FQDNs are not resolved
/// here (no DNS resolver dependency) and are treated as unresolvable.
pub fn resolve_tagged_address(
    address: &TaggedAddress,
    port: u16,
) -> Option<std::net::SocketAddr> {
    match address {
        TaggedAddress::IP4(addr) => Some(std::net::SocketAddr::from((*addr, port))),
        TaggedAddress::IP6(addr) => Some(std::net::SocketAddr::from((*addr, port))),
        TaggedAddress::IP4FQDN(_) | TaggedAddress::IP6FQDN(_) => None,
    }
}

/// Resolve a media announcement's RTP and RTCP destination addresses: the RTP
/// endpoint comes from the per-announcement connection (or session-level fallback)
/// and port; the control endpoint uses port+1 unless RTCP is muxed.
pub fn resolve_media_endpoints(
    session_connection: Option<&Connection>,
    desc: &MediaDescription,
) -> Option<(std::net::SocketAddr, std::net::SocketAddr)> {
    let connection = desc.connection.as_ref().or(session_connection)?;

    let rtp = resolve_tagged_address(&connection.address, desc.media.port)?;

    let (rtcp_address, rtcp_port) = if desc.rtcp_mux {
        (connection.address.clone(), desc.media.port)
    } else if let Some(rtcp) = &desc.rtcp {
        (
            rtcp.address.clone().unwrap_or_else(|| connection.address.clone()),
            rtcp.port,
        )
    } else {
        (connection.address.clone(), desc.media.port.saturating_add(1))
    };

    let rtcp = resolve_tagged_address(&rtcp_address, rtcp_port)?;

    Some((rtp, rtcp))
}

/// StreamStatus the *local* track should adopt after processing a `set_remote_description`
/// announcement: mirrored from the per-announcement's own direction, never a single
/// session-global direction applied to every kind.
pub fn status_for_remote_announcement(desc: &MediaDescription) -> StreamStatus {
    desc.direction.flipped().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::Track;

    fn pcmu_capability() -> Capability {
        Capability::new(0, "PCMU", 8000)
    }

    fn offer_with_pcmu() -> MediaDescription {
        MediaDescription {
            media: sdp_types::Media {
                media_type: MediaType::Audio,
                port: 4000,
                ports_num: None,
                proto: TransportProtocol::RtpAvp,
                fmts: vec![0],
            },
            connection: None,
            bandwidth: vec![],
            direction: Direction::SendRecv,
            rtcp: None,
            rtcp_mux: false,
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
        }
    }

    #[test]
    fn static_payload_type_intersects_by_fmts_membership() {
        let local = vec![pcmu_capability()];
        let intersected = intersect(&local, &offer_with_pcmu());
        assert_eq!(intersected.len(), 1);
        assert_eq!(intersected[0].payload_type, 0);
    }

    #[test]
    fn rejected_media_description_has_port_zero_and_inactive_direction() {
        let desc = rejected_media_description(MediaType::Video);
        assert_eq!(desc.media.port, 0);
        assert_eq!(desc.direction, Direction::Inactive);
    }

    #[test]
    fn answer_intersection_preserves_local_priority_order() {
        let track = Track::new_local(
            Kind::Audio,
            vec![Capability::new(8, "PCMA", 8000), pcmu_capability()],
            || 1,
            || 0,
        );

        let mut offer = offer_with_pcmu();
        offer.media.fmts = vec![0, 8];

        let (_desc, intersected) = build_answer_media_description(&track, &offer, 4000, None, false);
        assert_eq!(intersected[0].payload_type, 8);
        assert_eq!(intersected[1].payload_type, 0);
    }
}
