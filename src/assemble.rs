//! Packet-to-frame reassembly.
//!
//! A coded frame can span several transport packets; every packet of one
//! frame carries the same presentation timestamp. The assembler buffers
//! contiguous packets sharing one ordering key (pts, falling back to dts) and
//! emits the buffered group as a complete frame when a packet with a
//! different key arrives.
//!
//! The final group is never closed by a key change. The driving loop MUST
//! call `finish()` at end of stream, or the last frame of the session is
//! lost.

use serde::Deserialize;
use std::time::SystemTime;

use crate::stream::Packet;
use crate::TimeBase;

/// How packet runs are turned into frames.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FramingPolicy {
    /// Buffer packets until the ordering key changes (default). Multi-packet
    /// frames are reassembled faithfully; requires an end-of-stream flush.
    GroupByTimestamp,
    /// Treat every usable packet as a complete frame. Simpler, but splits
    /// multi-packet frames; kept selectable for sources known to emit one
    /// packet per frame.
    PacketPerFrame,
}

impl FramingPolicy {
    pub fn from_name(name: &str) -> anyhow::Result<Self> {
        match name {
            "group_by_timestamp" => Ok(FramingPolicy::GroupByTimestamp),
            "packet_per_frame" => Ok(FramingPolicy::PacketPerFrame),
            other => anyhow::bail!(
                "unknown framing policy: {}. Supported policies are: group_by_timestamp, packet_per_frame",
                other
            ),
        }
    }
}

/// Metadata of an assembled frame, taken from the most recent packet that
/// contributed to it.
#[derive(Clone, Copy, Debug)]
pub struct FrameMeta {
    pub width: u32,
    pub height: u32,
    pub is_keyframe: bool,
    pub timestamp: SystemTime,
    pub pts: Option<i64>,
    pub dts: Option<i64>,
    pub duration: i64,
    pub time_base: TimeBase,
}

impl FrameMeta {
    fn from_packet(packet: &Packet, timestamp: SystemTime) -> Self {
        FrameMeta {
            width: packet.width,
            height: packet.height,
            is_keyframe: packet.is_keyframe,
            timestamp,
            pts: packet.pts,
            dts: packet.dts,
            duration: packet.duration,
            time_base: packet.time_base,
        }
    }
}

/// One complete coded frame: the order-preserving concatenation of the raw
/// bytes of every packet in its run.
#[derive(Clone, Debug)]
pub struct AssembledFrame {
    pub data: Vec<u8>,
    pub meta: FrameMeta,
}

#[derive(Debug)]
pub enum AssemblerEvent {
    /// The packet was buffered (or skipped); no frame boundary was crossed.
    Buffering,
    /// A frame boundary was crossed; the previously buffered group is ready.
    FrameReady(AssembledFrame),
}

#[derive(Debug)]
pub struct FrameAssembler {
    policy: FramingPolicy,
    wait_for_keyframe: bool,
    seen_keyframe: bool,
    buffer: Vec<u8>,
    current_key: Option<i64>,
    pending: Option<FrameMeta>,
}

impl FrameAssembler {
    pub fn new(policy: FramingPolicy, wait_for_keyframe: bool) -> Self {
        FrameAssembler {
            policy,
            wait_for_keyframe,
            seen_keyframe: false,
            buffer: Vec::new(),
            current_key: None,
            pending: None,
        }
    }

    /// Feed one packet and its mapped wall-clock timestamp.
    ///
    /// Packets without a dts carry no ordering information and are skipped
    /// without touching assembler state. With the keyframe gate enabled,
    /// packets before the first keyframe are skipped as well, so the first
    /// emitted frame is always decodable on its own.
    pub fn ingest(&mut self, packet: &Packet, timestamp: SystemTime) -> AssemblerEvent {
        if packet.dts.is_none() {
            log::debug!("skipping packet without dts");
            return AssemblerEvent::Buffering;
        }
        if self.wait_for_keyframe && !self.seen_keyframe {
            if packet.is_keyframe {
                self.seen_keyframe = true;
            } else {
                log::debug!("skipping packet before first keyframe");
                return AssemblerEvent::Buffering;
            }
        }
        let key = match packet.ordering_key() {
            Some(key) => key,
            None => return AssemblerEvent::Buffering,
        };
        let meta = FrameMeta::from_packet(packet, timestamp);

        match self.policy {
            FramingPolicy::PacketPerFrame => AssemblerEvent::FrameReady(AssembledFrame {
                data: packet.data.clone(),
                meta,
            }),
            FramingPolicy::GroupByTimestamp => {
                let ready = match (self.current_key, self.pending) {
                    // Key change closes the open group. The emitted frame
                    // carries the metadata of the group's last packet, and a
                    // fresh buffer replaces the emitted one.
                    (Some(current), Some(prev)) if key != current => Some(AssembledFrame {
                        data: std::mem::take(&mut self.buffer),
                        meta: prev,
                    }),
                    _ => None,
                };
                self.current_key = Some(key);
                self.buffer.extend_from_slice(&packet.data);
                self.pending = Some(meta);
                match ready {
                    Some(frame) => AssemblerEvent::FrameReady(frame),
                    None => AssemblerEvent::Buffering,
                }
            }
        }
    }

    /// Close out the still-open group at end of stream.
    pub fn finish(&mut self) -> Option<AssembledFrame> {
        let meta = self.pending.take()?;
        self.current_key = None;
        Some(AssembledFrame {
            data: std::mem::take(&mut self.buffer),
            meta,
        })
    }

    pub fn has_open_group(&self) -> bool {
        self.pending.is_some()
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}
