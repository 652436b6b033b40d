//! Per-stream session state machine.
//!
//! One `Session` owns all per-stream state and drives a single sequential
//! pass: `Opening -> Validating -> Streaming -> Closed`, with `Closed`
//! reachable from any state on fatal error or shutdown. There is no retry
//! logic here; reconnection policy belongs to whatever supervises the
//! process.

use anyhow::{bail, Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::assemble::{AssembledFrame, AssemblerEvent, FrameAssembler};
use crate::clock::StreamClock;
use crate::config::FramingSettings;
use crate::frame::{route, FrameHeader};
use crate::publish::FramePublisher;
use crate::stream::PacketSource;
use crate::validate::BitstreamValidator;
use crate::CodecId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Opening,
    Validating,
    Streaming,
    Closed,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SessionStats {
    pub packets_seen: u64,
    pub packets_skipped: u64,
    pub frames_published: u64,
}

pub struct Session {
    codec: CodecId,
    entity_path: String,
    framing: FramingSettings,
    state: SessionState,
    shutdown: Arc<AtomicBool>,
}

impl Session {
    pub fn new(codec: CodecId, entity_path: String, framing: FramingSettings) -> Self {
        Session {
            codec,
            entity_path,
            framing,
            state: SessionState::Opening,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Attach an externally owned shutdown flag (set from a signal handler).
    /// The flag is checked between packets; it never interrupts a stage.
    pub fn with_shutdown(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown = flag;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Run one stream session to completion.
    ///
    /// Every packet flows validate -> assemble -> timestamp -> route ->
    /// publish before the next one is read. Returns when the source ends,
    /// shutdown is requested, or a fatal error occurs.
    pub fn run<S, P>(&mut self, source: &mut S, publisher: &mut P) -> Result<SessionStats>
    where
        S: PacketSource,
        P: FramePublisher,
    {
        self.state = SessionState::Opening;
        let info = match source.open().context("open stream source") {
            Ok(info) => info,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e);
            }
        };
        info.log_attributes();

        if info.codec != self.codec {
            self.state = SessionState::Closed;
            bail!(
                "configured codec {} does not match stream codec {}",
                self.codec,
                info.codec
            );
        }
        if info.time_base.den <= 0 || info.time_base.num < 0 {
            self.state = SessionState::Closed;
            bail!("stream reports invalid time base {}", info.time_base);
        }

        // Wall-clock anchor: captured once, before the first packet is read.
        let clock = StreamClock::new(SystemTime::now(), info.start_pts, info.time_base);
        let mut validator = BitstreamValidator::new();
        let mut assembler =
            FrameAssembler::new(self.framing.policy, self.framing.wait_for_keyframe);
        let mut stats = SessionStats::default();

        self.state = SessionState::Validating;
        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                log::info!("shutdown requested, closing stream");
                break;
            }
            let packet = match source.next_packet() {
                Ok(Some(packet)) => packet,
                Ok(None) => break,
                Err(e) => {
                    if assembler.has_open_group() {
                        log::warn!(
                            "stream failed with {} buffered bytes of an unfinished frame",
                            assembler.buffered_len()
                        );
                    }
                    self.state = SessionState::Closed;
                    return Err(e).context("read packet from stream");
                }
            };
            stats.packets_seen += 1;

            if packet.dts.is_none() {
                // No usable ordering information; does not touch assembler
                // state and is not eligible for validation either.
                stats.packets_skipped += 1;
                continue;
            }
            if !validator.is_validated() {
                if let Err(e) = validator.check(self.codec, &packet) {
                    self.state = SessionState::Closed;
                    return Err(e);
                }
                self.state = SessionState::Streaming;
            }

            let key = match packet.ordering_key() {
                Some(key) => key,
                None => continue,
            };
            let timestamp = clock.to_absolute(key);
            match assembler.ingest(&packet, timestamp) {
                AssemblerEvent::Buffering => {}
                AssemblerEvent::FrameReady(frame) => {
                    self.publish_frame(publisher, frame, &mut stats)?;
                }
            }
        }

        // The last group is never closed by a key change; flush it here or
        // the final frame of the session is lost.
        if let Some(frame) = assembler.finish() {
            self.publish_frame(publisher, frame, &mut stats)?;
        }

        self.state = SessionState::Closed;
        log::info!(
            "session closed: {} packets in ({} skipped), {} frames published",
            stats.packets_seen,
            stats.packets_skipped,
            stats.frames_published
        );
        Ok(stats)
    }

    fn publish_frame<P: FramePublisher>(
        &mut self,
        publisher: &mut P,
        frame: AssembledFrame,
        stats: &mut SessionStats,
    ) -> Result<()> {
        let header = FrameHeader::new(self.entity_path.clone(), frame.meta.timestamp);
        let message = route(self.codec, header, frame);
        if let Err(e) = publisher.publish(&message) {
            self.state = SessionState::Closed;
            return Err(e);
        }
        stats.frames_published += 1;
        Ok(())
    }
}
