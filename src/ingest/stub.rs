//! Synthetic and scripted packet sources.

use anyhow::{anyhow, Result};
use std::collections::VecDeque;
use std::time::Duration;

use crate::stream::{Packet, PacketSource, StreamInfo};
use crate::{CodecId, TimeBase};

const SYNTHETIC_FPS: i32 = 10;
const SYNTHETIC_WIDTH: u32 = 640;
const SYNTHETIC_HEIGHT: u32 = 480;
const SYNTHETIC_KEYFRAME_INTERVAL: i64 = 30;

/// Procedural source behind `stub://` URLs: emits well-formed packets at a
/// fixed rate so the full pipeline can run without a camera.
pub struct SyntheticSource {
    codec: CodecId,
    stream_index: usize,
    packet_count: i64,
}

impl SyntheticSource {
    pub fn new(codec: CodecId, stream_index: usize) -> Self {
        SyntheticSource {
            codec,
            stream_index,
            packet_count: 0,
        }
    }
}

impl PacketSource for SyntheticSource {
    fn open(&mut self) -> Result<StreamInfo> {
        // The synthetic container exposes exactly one stream.
        if self.stream_index != 0 {
            return Err(anyhow!(
                "configured stream index {} does not exist",
                self.stream_index
            ));
        }
        log::info!("synthetic source connected ({} at {} fps)", self.codec, SYNTHETIC_FPS);
        Ok(StreamInfo {
            index: 0,
            codec: self.codec,
            time_base: TimeBase::new(1, SYNTHETIC_FPS),
            start_pts: Some(0),
            width: SYNTHETIC_WIDTH,
            height: SYNTHETIC_HEIGHT,
            duration: None,
            frames: None,
            avg_frame_rate: Some(TimeBase::new(SYNTHETIC_FPS, 1)),
        })
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        // Pace the endless stream at roughly its nominal frame rate.
        std::thread::sleep(Duration::from_millis(1000 / SYNTHETIC_FPS as u64));

        let pts = self.packet_count;
        self.packet_count += 1;

        let mut data = if self.codec.uses_start_codes() {
            vec![0x00, 0x00, 0x00, 0x01]
        } else {
            vec![0x12, 0x00]
        };
        data.extend((pts as u64).to_be_bytes());

        Ok(Some(Packet {
            data,
            pts: Some(pts),
            dts: Some(pts),
            duration: 1,
            time_base: TimeBase::new(1, SYNTHETIC_FPS),
            is_keyframe: pts % SYNTHETIC_KEYFRAME_INTERVAL == 0,
            width: SYNTHETIC_WIDTH,
            height: SYNTHETIC_HEIGHT,
        }))
    }
}

/// Scripted source for tests: replays a fixed packet sequence, then either
/// ends cleanly or fails like a severed connection.
pub struct StubSource {
    info: StreamInfo,
    packets: VecDeque<Packet>,
    fail_at_end: Option<String>,
    opened: bool,
}

impl StubSource {
    pub fn new(info: StreamInfo) -> Self {
        StubSource {
            info,
            packets: VecDeque::new(),
            fail_at_end: None,
            opened: false,
        }
    }

    pub fn push(&mut self, packet: Packet) {
        self.packets.push_back(packet);
    }

    pub fn with_packets(mut self, packets: impl IntoIterator<Item = Packet>) -> Self {
        self.packets.extend(packets);
        self
    }

    /// After the scripted packets run out, fail with this message instead of
    /// ending cleanly.
    pub fn failing_with(mut self, message: impl Into<String>) -> Self {
        self.fail_at_end = Some(message.into());
        self
    }
}

impl PacketSource for StubSource {
    fn open(&mut self) -> Result<StreamInfo> {
        self.opened = true;
        Ok(self.info.clone())
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        if !self.opened {
            return Err(anyhow!("source not opened"));
        }
        if let Some(packet) = self.packets.pop_front() {
            return Ok(Some(packet));
        }
        match self.fail_at_end.take() {
            Some(message) => Err(anyhow!(message)),
            None => Ok(None),
        }
    }
}
