//! Camera Relay
//!
//! This crate implements the ingestion front end of a video pipeline: it
//! consumes a live RTSP transport stream, reassembles discrete codec frames
//! from the demuxed packets, attaches wall-clock timestamps anchored at
//! stream-open time, and publishes each frame as a codec-tagged MQTT message.
//!
//! # Module Structure
//!
//! - `ingest`: packet sources (RTSP via FFmpeg demux, synthetic/stub)
//! - `validate`: one-shot start-code bitstream gate
//! - `assemble`: packet-to-frame grouping
//! - `clock`: stream time to wall-clock mapping
//! - `frame`: codec-tagged output messages and the codec router
//! - `publish`: frame publishers (MQTT, in-memory)
//! - `session`: the per-stream state machine driving all stages
//! - `config`: daemon configuration (file + environment)
//!
//! The relay never decodes pixel data: packets flow from the demuxer to the
//! publisher as opaque bitstream bytes.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod assemble;
pub mod clock;
pub mod config;
pub mod frame;
pub mod ingest;
pub mod publish;
pub mod session;
pub mod stream;
pub mod validate;

pub use assemble::{AssembledFrame, AssemblerEvent, FrameAssembler, FramingPolicy};
pub use clock::StreamClock;
pub use config::RelayConfig;
pub use frame::{route, FrameHeader, FrameMessage};
pub use ingest::rtsp::{RtspConfig, RtspSource};
pub use ingest::stub::StubSource;
pub use publish::{FramePublisher, MemoryPublisher, MqttFramePublisher};
pub use session::{Session, SessionState, SessionStats};
pub use stream::{Packet, PacketSource, StreamInfo};
pub use validate::BitstreamValidator;

// -------------------- Codec identifiers --------------------

/// The closed set of codec families the relay can emit.
///
/// Everything outside this enumeration is rejected where foreign identifiers
/// enter the crate: operator configuration (`from_name`) and the codec
/// reported by the opened stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecId {
    H264,
    H265,
    Av1,
}

impl CodecId {
    pub const SUPPORTED: [CodecId; 3] = [CodecId::H264, CodecId::H265, CodecId::Av1];

    /// Parse an operator-supplied codec name.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "h264" => Ok(CodecId::H264),
            "h265" => Ok(CodecId::H265),
            "av1" => Ok(CodecId::Av1),
            other => Err(anyhow!(
                "unsupported video codec: {}. Supported codecs are: h264, h265, av1",
                other
            )),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CodecId::H264 => "h264",
            CodecId::H265 => "h265",
            CodecId::Av1 => "av1",
        }
    }

    /// Whether the family carries start-code (Annex B) delimited bitstreams.
    /// AV1 frames are OBU-framed and have no start codes.
    pub fn uses_start_codes(&self) -> bool {
        match self {
            CodecId::H264 | CodecId::H265 => true,
            CodecId::Av1 => false,
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// -------------------- Time base --------------------

/// Rational scale factor converting stream timestamp units to seconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        TimeBase { num, den }
    }
}

impl fmt::Display for TimeBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_names_round_trip() -> Result<()> {
        for codec in CodecId::SUPPORTED {
            assert_eq!(CodecId::from_name(codec.name())?, codec);
        }
        Ok(())
    }

    #[test]
    fn unknown_codec_is_rejected() {
        let err = CodecId::from_name("mpeg2").unwrap_err();
        assert!(err.to_string().contains("unsupported video codec"));
    }

    #[test]
    fn only_avc_family_uses_start_codes() {
        assert!(CodecId::H264.uses_start_codes());
        assert!(CodecId::H265.uses_start_codes());
        assert!(!CodecId::Av1.uses_start_codes());
    }
}
