use rtp_session::rtp_wire::parse_header;
use rtp_session::{Capability, Kind, Session, SessionConfig};

mod common;

// Two audio-only PCMU sessions negotiate, then A sends a 320-byte frame and B
// demultiplexes it to the right kind with A's initial sequence number/timestamp.
#[test]
fn offer_answer_then_audio_frame_round_trips_between_two_sessions() {
    let mut a = Session::new(SessionConfig::default());
    a.add_track(Kind::Audio, vec![Capability::new(0, "PCMU", 8000)])
        .unwrap();
    common::attach_recording_channel(&mut a, Kind::Audio, 20000);

    let mut b = Session::new(SessionConfig::default());
    b.add_track(Kind::Audio, vec![Capability::new(0, "PCMU", 8000)])
        .unwrap();
    let b_sent = common::attach_recording_channel(&mut b, Kind::Audio, 20002);

    let offer = a.create_offer(Some("127.0.0.1".parse().unwrap())).unwrap();
    b.set_remote_description(offer).unwrap();
    let answer = b.create_answer(Some("127.0.0.1".parse().unwrap())).unwrap();
    a.set_remote_description(answer).unwrap();

    // Address-learning normally resolves destinations from the negotiated SDP; here
    // we pin them directly since the two sessions share one process rather than real
    // sockets bound at the advertised ports.
    a.set_rtp_destination(Kind::Audio, "127.0.0.1:20002".parse().unwrap());

    let frame = vec![0x11u8; 320];
    a.send_audio_frame(&frame, 160).unwrap();

    let sent = b_sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    let (dest, bytes) = &sent[0];
    assert_eq!(*dest, "127.0.0.1:20002".parse().unwrap());

    // Feed the datagram straight into B's demultiplexer, as the host's RtpChannel
    // callback would after receiving it off the wire.
    b.on_receive(
        "127.0.0.1:20002".parse().unwrap(),
        "127.0.0.1:20000".parse().unwrap(),
        bytes,
    );

    let event = b.poll_event().expect("event queued");
    match event {
        rtp_session::SessionEvent::RtpPacketReceived { kind, packet } => {
            assert_eq!(kind, Kind::Audio);
            assert_eq!(packet.payload.len(), 320);
            let header = parse_header(bytes).unwrap();
            assert_eq!(header.sequence_number, packet.header.sequence_number);
            assert_eq!(header.timestamp, packet.header.timestamp);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}
