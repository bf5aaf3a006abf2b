//! End-to-end bridge tests over in-memory links: a relay chain with a CAN
//! tail, exactly the shape of the deployed hop sequence
//! (device → passthrough bridge → CAN gateway).

use std::time::Duration;

use imulink_can::{CanAdapter, CanPipeline, MockCanAdapter};
use imulink_host::{StreamConfig, StreamSession};
use imulink_protocol::{FrameLayout, PartialSample};
use imulink_relay::RelayForwarder;
use imulink_transport::{MockLink, TransportLink, mock_pair};

fn drain(link: &mut MockLink) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 1024];
    loop {
        let n = link.read_available(&mut buf).unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    out
}

fn boxed_can(adapter: MockCanAdapter) -> (CanPipeline<Box<dyn CanAdapter + Send>>, imulink_can::SentFrames) {
    let sent = adapter.sent_frames();
    let boxed: Box<dyn CanAdapter + Send> = Box::new(adapter);
    (CanPipeline::new(boxed, FrameLayout::three_frame()), sent)
}

/// Two relay hops: the first passes bytes through untouched, the second
/// re-encodes onto CAN. Replies ride the same links back to the head.
#[test]
fn relay_chain_delivers_frames_and_replies() {
    let (mut head, hop1_up) = mock_pair();
    let (hop1_down, hop2_up) = mock_pair();
    head.open().unwrap();

    let mut bridge = RelayForwarder::new(Box::new(hop1_up)).with_downstream(Box::new(hop1_down));
    let (pipeline, sent) = boxed_can(MockCanAdapter::new());
    let mut gateway = RelayForwarder::new(Box::new(hop2_up)).with_can(pipeline);
    bridge.start().unwrap();
    gateway.start().unwrap();

    head.write_chunk(b"1.00,2.00,3.00,4.00,5.00,6.00\n").unwrap();
    for _ in 0..4 {
        bridge.poll();
        gateway.poll();
    }

    // the record crossed both hops and landed on the bus
    let frames = sent.lock().unwrap();
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0].id, 0x501);
    assert_eq!(&frames[0].data[..4], &1.0f32.to_le_bytes());
    drop(frames);

    // the gateway's ACK crossed back through the bridge to the head
    assert_eq!(drain(&mut head), b"ACK\n");
}

/// Pings are answered by the first hop that sees them and never reach the
/// bus.
#[test]
fn ping_is_consumed_by_the_first_hop() {
    let (mut head, hop1_up) = mock_pair();
    let (hop1_down, hop2_up) = mock_pair();
    head.open().unwrap();

    let mut bridge = RelayForwarder::new(Box::new(hop1_up)).with_downstream(Box::new(hop1_down));
    let (pipeline, sent) = boxed_can(MockCanAdapter::new());
    let mut gateway = RelayForwarder::new(Box::new(hop2_up)).with_can(pipeline);
    bridge.start().unwrap();
    gateway.start().unwrap();

    head.write_chunk(b"ping\n").unwrap();
    for _ in 0..4 {
        bridge.poll();
        gateway.poll();
    }

    assert_eq!(drain(&mut head), b"PONG\n");
    assert!(sent.lock().unwrap().is_empty());
}

/// A streaming session feeding a CAN gateway: observed motion ends up as
/// little-endian floats on the bus without any manual framing.
#[test]
fn stream_session_to_can_gateway() {
    let (relay_up, mut host_link) = mock_pair();
    host_link.open().unwrap();

    let (pipeline, sent) = boxed_can(MockCanAdapter::new());
    let mut gateway = RelayForwarder::new(Box::new(relay_up)).with_can(pipeline);
    gateway.start().unwrap();

    let mut session = StreamSession::start(Box::new(host_link), StreamConfig::default()).unwrap();
    let events = session.event_sender();
    events.push(PartialSample::from_orientation(10.0, 20.0, 30.0));
    events.push(PartialSample::from_motion([1.0, 2.0, 3.0], [0.0, 0.0, 0.0]));

    // let the window close, flush, and relay
    for _ in 0..30 {
        gateway.poll();
        std::thread::sleep(Duration::from_millis(5));
    }
    session.stop();

    let frames = sent.lock().unwrap();
    assert!(!frames.is_empty(), "no CAN frames relayed");
    assert_eq!(frames[0].id, 0x501);
    assert_eq!(&frames[0].data[..4], &10.0f32.to_le_bytes());
    assert_eq!(&frames[0].data[4..], &20.0f32.to_le_bytes());
}
