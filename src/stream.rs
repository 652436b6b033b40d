//! Transport packets and stream-level metadata.
//!
//! A `Packet` is one demuxed transport unit: opaque bitstream bytes plus the
//! timing and geometry the container reported for it. Packets are produced by
//! a `PacketSource`, consumed exactly once by the frame assembler, and never
//! decoded inside this crate.

use anyhow::Result;

use crate::{CodecId, TimeBase};

/// One demuxed transport packet.
#[derive(Clone, Debug)]
pub struct Packet {
    /// Raw bitstream bytes, exactly as the demuxer produced them.
    pub data: Vec<u8>,
    /// Presentation timestamp in stream time-base units.
    pub pts: Option<i64>,
    /// Decode timestamp in stream time-base units. Packets without a dts
    /// carry no usable ordering information and are skipped downstream.
    pub dts: Option<i64>,
    /// Packet duration in stream time-base units.
    pub duration: i64,
    pub time_base: TimeBase,
    pub is_keyframe: bool,
    /// Stream dimensions at capture time.
    pub width: u32,
    pub height: u32,
}

impl Packet {
    /// The key frames are grouped by: pts when present, dts otherwise.
    pub fn ordering_key(&self) -> Option<i64> {
        self.pts.or(self.dts)
    }
}

/// Metadata of the selected stream, captured once at open.
#[derive(Clone, Debug)]
pub struct StreamInfo {
    pub index: usize,
    pub codec: CodecId,
    pub time_base: TimeBase,
    /// First presentation timestamp the container reports, if any.
    /// Timestamp mapping treats an absent start time as 0.
    pub start_pts: Option<i64>,
    pub width: u32,
    pub height: u32,
    /// Informational only, logged at open.
    pub duration: Option<i64>,
    pub frames: Option<i64>,
    pub avg_frame_rate: Option<TimeBase>,
}

impl StreamInfo {
    pub fn log_attributes(&self) {
        log::info!("stream attributes:");
        log::info!("  index: {}", self.index);
        log::info!("  codec: {}", self.codec);
        log::info!("  time base: {}", self.time_base);
        log::info!("  start time: {}", fmt_opt(self.start_pts));
        log::info!("  duration: {}", fmt_opt(self.duration));
        log::info!("  frames: {}", fmt_opt(self.frames));
        log::info!("  width: {}", self.width);
        log::info!("  height: {}", self.height);
        match self.avg_frame_rate {
            Some(rate) => log::info!("  average frame rate: {}", rate),
            None => log::info!("  average frame rate: n/a"),
        }
    }
}

fn fmt_opt(value: Option<i64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| v.to_string())
}

/// An ordered, blocking source of transport packets.
///
/// `open` selects the stream and returns its metadata; it fails terminally
/// when the configured stream index does not exist. `next_packet` blocks
/// until a packet is available and returns `Ok(None)` once the stream ends.
pub trait PacketSource {
    fn open(&mut self) -> Result<StreamInfo>;
    fn next_packet(&mut self) -> Result<Option<Packet>>;
}
