//! Packet sources.
//!
//! Sources hand demuxed transport packets to the session in arrival order:
//! - `RtspSource`: live RTSP cameras via FFmpeg demuxing (feature
//!   `rtsp-ffmpeg`), with a synthetic backend for `stub://` URLs
//! - `StubSource`: scripted packet sequences for tests
//!
//! Sources never decode. A packet's bytes reach the publisher exactly as the
//! demuxer produced them.

pub mod rtsp;
#[cfg(feature = "rtsp-ffmpeg")]
pub(crate) mod rtsp_ffmpeg;
pub mod stub;

pub use rtsp::RtspSource;
pub use stub::StubSource;
