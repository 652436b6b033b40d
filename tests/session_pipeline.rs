//! End-to-end session tests: scripted packet sequences through the full
//! validate -> assemble -> timestamp -> route -> publish pipeline.

use anyhow::Result;

use camera_relay::config::FramingSettings;
use camera_relay::{
    CodecId, FrameMessage, FramingPolicy, MemoryPublisher, Packet, Session, SessionState,
    StreamInfo, StubSource, TimeBase,
};

const TIME_BASE: TimeBase = TimeBase::new(1, 2);

fn stream_info(codec: CodecId) -> StreamInfo {
    StreamInfo {
        index: 0,
        codec,
        time_base: TIME_BASE,
        start_pts: Some(10),
        width: 640,
        height: 480,
        duration: None,
        frames: None,
        avg_frame_rate: Some(TimeBase::new(2, 1)),
    }
}

fn framing(policy: FramingPolicy) -> FramingSettings {
    FramingSettings {
        policy,
        wait_for_keyframe: false,
    }
}

fn annexb(payload: &[u8]) -> Vec<u8> {
    let mut data = vec![0x00, 0x00, 0x00, 0x01];
    data.extend_from_slice(payload);
    data
}

fn packet(pts: i64, payload: &[u8]) -> Packet {
    Packet {
        data: annexb(payload),
        pts: Some(pts),
        dts: Some(pts),
        duration: 1,
        time_base: TIME_BASE,
        is_keyframe: false,
        width: 640,
        height: 480,
    }
}

fn session(codec: CodecId, policy: FramingPolicy) -> Session {
    Session::new(codec, "/camera/10.0.0.4/stream1".to_string(), framing(policy))
}

#[test]
fn groups_three_packets_into_two_frames() -> Result<()> {
    let mut first = packet(10, b"aa");
    first.is_keyframe = true;
    let mut second = packet(10, b"bb");
    second.width = 1280;
    second.height = 720;
    let third = packet(20, b"cc");

    let mut source =
        StubSource::new(stream_info(CodecId::H264)).with_packets([first, second, third]);
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::H264, FramingPolicy::GroupByTimestamp);

    let stats = session.run(&mut source, &mut publisher)?;
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(stats.packets_seen, 3);
    assert_eq!(stats.frames_published, 2);

    let frames = publisher.frames();
    assert_eq!(frames.len(), 2);

    // Frame 1 is the ordered concatenation of the pts-10 run; its metadata
    // comes from the run's last packet.
    let mut expected = annexb(b"aa");
    expected.extend(annexb(b"bb"));
    assert_eq!(frames[0].data(), expected.as_slice());
    assert_eq!(frames[0].dimensions(), (1280, 720));
    assert!(!frames[0].is_keyframe());
    assert_eq!(frames[1].data(), annexb(b"cc").as_slice());

    for frame in frames {
        assert_eq!(frame.codec(), CodecId::H264);
        assert_eq!(frame.header().entity_path, "/camera/10.0.0.4/stream1");
    }

    // start_pts 10, time base 1/2: pts 10 -> anchor, pts 20 -> anchor + 5s.
    let t1 = frames[0].header().timestamp_us;
    let t2 = frames[1].header().timestamp_us;
    assert_eq!(t2 - t1, 5_000_000);
    Ok(())
}

#[test]
fn codec_mismatch_aborts_before_any_frame() {
    let mut source =
        StubSource::new(stream_info(CodecId::H265)).with_packets([packet(10, b"aa")]);
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::H264, FramingPolicy::GroupByTimestamp);

    let err = session.run(&mut source, &mut publisher).unwrap_err();
    assert!(err
        .to_string()
        .contains("configured codec h264 does not match stream codec h265"));
    assert_eq!(session.state(), SessionState::Closed);
    assert!(publisher.frames().is_empty());
}

#[test]
fn invalid_start_code_aborts_before_any_frame() {
    let mut bad = packet(10, b"");
    bad.data = vec![0x47, 0x40, 0x11, 0x10];

    let mut source =
        StubSource::new(stream_info(CodecId::H264)).with_packets([bad, packet(20, b"aa")]);
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::H264, FramingPolicy::GroupByTimestamp);

    let err = session.run(&mut source, &mut publisher).unwrap_err();
    assert!(err.to_string().contains("not start-code delimited"));
    assert!(publisher.frames().is_empty());
}

#[test]
fn end_of_stream_flushes_the_final_group() -> Result<()> {
    let mut source = StubSource::new(stream_info(CodecId::H264))
        .with_packets([packet(10, b"aa"), packet(10, b"bb")]);
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::H264, FramingPolicy::GroupByTimestamp);

    let stats = session.run(&mut source, &mut publisher)?;
    assert_eq!(stats.frames_published, 1, "single-run stream still emits its frame");
    let mut expected = annexb(b"aa");
    expected.extend(annexb(b"bb"));
    assert_eq!(publisher.frames()[0].data(), expected.as_slice());
    Ok(())
}

#[test]
fn packets_without_dts_are_skipped_not_fatal() -> Result<()> {
    let mut orphan = packet(10, b"xx");
    orphan.dts = None;

    let mut source = StubSource::new(stream_info(CodecId::H264)).with_packets([
        orphan,
        packet(10, b"aa"),
        packet(20, b"bb"),
    ]);
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::H264, FramingPolicy::GroupByTimestamp);

    let stats = session.run(&mut source, &mut publisher)?;
    assert_eq!(stats.packets_skipped, 1);
    assert_eq!(stats.frames_published, 2);
    assert_eq!(publisher.frames()[0].data(), annexb(b"aa").as_slice());
    Ok(())
}

#[test]
fn packet_per_frame_policy_emits_one_frame_per_packet() -> Result<()> {
    let mut source = StubSource::new(stream_info(CodecId::H264)).with_packets([
        packet(10, b"aa"),
        packet(10, b"bb"),
        packet(20, b"cc"),
    ]);
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::H264, FramingPolicy::PacketPerFrame);

    let stats = session.run(&mut source, &mut publisher)?;
    assert_eq!(stats.frames_published, 3);
    Ok(())
}

#[test]
fn av1_frames_carry_packet_timing() -> Result<()> {
    let first = Packet {
        data: vec![0x12, 0x00, 0xaa],
        pts: Some(10),
        dts: Some(9),
        duration: 2,
        time_base: TIME_BASE,
        is_keyframe: true,
        width: 640,
        height: 480,
    };
    let mut second = first.clone();
    second.pts = Some(20);
    second.dts = Some(19);

    let mut source = StubSource::new(stream_info(CodecId::Av1)).with_packets([first, second]);
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::Av1, FramingPolicy::GroupByTimestamp);

    session.run(&mut source, &mut publisher)?;
    let frames = publisher.frames();
    assert_eq!(frames.len(), 2);
    let FrameMessage::Av1(frame) = &frames[0] else {
        panic!("expected the av1 variant");
    };
    assert_eq!(frame.pts, Some(10));
    assert_eq!(frame.dts, Some(9));
    assert_eq!(frame.duration, 2);
    assert_eq!(frame.time_base, TIME_BASE);
    Ok(())
}

#[test]
fn severed_source_fails_after_publishing_completed_frames() {
    let mut source = StubSource::new(stream_info(CodecId::H264))
        .with_packets([packet(10, b"aa"), packet(20, b"bb")])
        .failing_with("connection reset by peer");
    let mut publisher = MemoryPublisher::new();
    let mut session = session(CodecId::H264, FramingPolicy::GroupByTimestamp);

    let err = session.run(&mut source, &mut publisher).unwrap_err();
    assert!(err.to_string().contains("read packet from stream"));
    assert_eq!(session.state(), SessionState::Closed);
    // The pts-10 frame completed before the failure; the open pts-20 group
    // is reported as a partial frame, not silently published.
    assert_eq!(publisher.frames().len(), 1);
    assert_eq!(publisher.frames()[0].data(), annexb(b"aa").as_slice());
}
