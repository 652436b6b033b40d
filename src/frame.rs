//! Codec-tagged output messages.
//!
//! Every assembled frame leaves the relay as exactly one variant of
//! `FrameMessage`, selected by the session's codec. The enum is closed and
//! matched exhaustively in `route`, so an unhandled codec is a compile error
//! rather than a runtime surprise; "unsupported codec" can only occur where
//! foreign identifiers are converted into `CodecId`.
//!
//! Messages serialize to JSON with the frame payload base64-encoded, tagged
//! by a `codec` field.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::assemble::AssembledFrame;
use crate::{CodecId, TimeBase};

/// Envelope carried by every outgoing frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameHeader {
    /// Hierarchical path identifying the originating camera,
    /// e.g. `/camera/192.168.1.20/stream1`.
    pub entity_path: String,
    /// Absolute frame timestamp, microseconds since the Unix epoch.
    pub timestamp_us: u64,
}

impl FrameHeader {
    pub fn new(entity_path: String, timestamp: SystemTime) -> Self {
        let timestamp_us = timestamp
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        FrameHeader {
            entity_path,
            timestamp_us,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameH264 {
    pub header: FrameHeader,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub is_keyframe: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameH265 {
    pub header: FrameHeader,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub is_keyframe: bool,
}

/// The richer variant: AV1 frames additionally carry the raw stream timing
/// of the last packet that contributed to the frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameAv1 {
    pub header: FrameHeader,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub is_keyframe: bool,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub time_base: TimeBase,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum FrameMessage {
    H264(FrameH264),
    H265(FrameH265),
    Av1(FrameAv1),
}

impl FrameMessage {
    pub fn codec(&self) -> CodecId {
        match self {
            FrameMessage::H264(_) => CodecId::H264,
            FrameMessage::H265(_) => CodecId::H265,
            FrameMessage::Av1(_) => CodecId::Av1,
        }
    }

    pub fn header(&self) -> &FrameHeader {
        match self {
            FrameMessage::H264(frame) => &frame.header,
            FrameMessage::H265(frame) => &frame.header,
            FrameMessage::Av1(frame) => &frame.header,
        }
    }

    pub fn data(&self) -> &[u8] {
        match self {
            FrameMessage::H264(frame) => &frame.data,
            FrameMessage::H265(frame) => &frame.data,
            FrameMessage::Av1(frame) => &frame.data,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            FrameMessage::H264(frame) => (frame.width, frame.height),
            FrameMessage::H265(frame) => (frame.width, frame.height),
            FrameMessage::Av1(frame) => (frame.width, frame.height),
        }
    }

    pub fn is_keyframe(&self) -> bool {
        match self {
            FrameMessage::H264(frame) => frame.is_keyframe,
            FrameMessage::H265(frame) => frame.is_keyframe,
            FrameMessage::Av1(frame) => frame.is_keyframe,
        }
    }
}

/// Wrap an assembled frame in the output variant of the session codec.
pub fn route(codec: CodecId, header: FrameHeader, frame: AssembledFrame) -> FrameMessage {
    let AssembledFrame { data, meta } = frame;
    match codec {
        CodecId::H264 => FrameMessage::H264(FrameH264 {
            header,
            data,
            width: meta.width,
            height: meta.height,
            is_keyframe: meta.is_keyframe,
        }),
        CodecId::H265 => FrameMessage::H265(FrameH265 {
            header,
            data,
            width: meta.width,
            height: meta.height,
            is_keyframe: meta.is_keyframe,
        }),
        CodecId::Av1 => FrameMessage::Av1(FrameAv1 {
            header,
            data,
            width: meta.width,
            height: meta.height,
            is_keyframe: meta.is_keyframe,
            pts: meta.pts,
            dts: meta.dts,
            duration: meta.duration,
            time_base: meta.time_base,
        }),
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
