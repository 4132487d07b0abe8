//! Two sessions negotiating over loopback UDP and exchanging one audio stream.
//!
//! Mirrors the teacher crate's own `examples/roundtrip.rs`: build two sessions, run
//! one offer/answer exchange, then drive both sessions' sockets from a single
//! `select!` loop (current-thread runtime, no `tokio::spawn`, so none of the
//! collaborator trait objects need to be `Send`).
//!
//! Run with `cargo run --example roundtrip`.

use std::net::Ipv4Addr;
use std::time::Duration;

use rtp_session::tokio_channel::TokioUdpChannel;
use rtp_session::{Capability, Kind, Session, SessionConfig, SessionEvent};
use tokio::time::interval;

fn new_audio_session() -> Session {
    let mut session = Session::new(SessionConfig::default());
    session
        .add_track(Kind::Audio, vec![Capability::new(0, "PCMU", 8000)])
        .unwrap();
    session
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    env_logger::builder().is_test(true).init();

    let mut a = new_audio_session();
    let a_channel = TokioUdpChannel::bind_muxed((Ipv4Addr::LOCALHOST, 0).into())
        .await
        .unwrap();
    let a_rtp = a_channel.rtp_socket();
    a.set_channel(Kind::Audio, Box::new(a_channel));

    let mut b = new_audio_session();
    let b_channel = TokioUdpChannel::bind_muxed((Ipv4Addr::LOCALHOST, 0).into())
        .await
        .unwrap();
    let b_rtp = b_channel.rtp_socket();
    b.set_channel(Kind::Audio, Box::new(b_channel));

    let offer = a.create_offer(Some(Ipv4Addr::LOCALHOST.into())).unwrap();
    println!("offer:\n{offer}");
    b.set_remote_description(offer).unwrap();

    let answer = b.create_answer(Some(Ipv4Addr::LOCALHOST.into())).unwrap();
    println!("answer:\n{answer}");
    a.set_remote_description(answer).unwrap();

    a.start();
    b.start();

    let mut send_interval = interval(Duration::from_millis(20));
    let frame = vec![0xffu8; 160];
    let mut a_buf = vec![0u8; 2048];
    let mut b_buf = vec![0u8; 2048];

    loop {
        tokio::select! {
            recv = a_rtp.recv_from(&mut a_buf) => {
                let (len, from) = recv.unwrap();
                let local = a_rtp.local_addr().unwrap();
                a.on_receive(local, from, &a_buf[..len]);
            }
            recv = b_rtp.recv_from(&mut b_buf) => {
                let (len, from) = recv.unwrap();
                let local = b_rtp.local_addr().unwrap();
                b.on_receive(local, from, &b_buf[..len]);
            }
            _ = send_interval.tick() => {
                a.send_audio_frame(&frame, 160).unwrap();
            }
        }

        while let Some(event) = b.poll_event() {
            if let SessionEvent::RtpPacketReceived { kind, packet } = event {
                println!(
                    "B received {kind:?} packet seq={} len={}",
                    packet.header.sequence_number,
                    packet.payload.len()
                );
            }
        }
    }
}
