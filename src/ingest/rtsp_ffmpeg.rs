//! FFmpeg-backed RTSP demuxer.
//!
//! Opens the stream container, selects the configured stream by index, and
//! reads transport packets as-is. Stream geometry comes from the codec
//! parameters; the decoder context is opened only to read metadata, never to
//! decode packets.

use anyhow::{anyhow, Context, Result};
use ffmpeg_next as ffmpeg;

use crate::stream::{Packet, PacketSource, StreamInfo};
use crate::{CodecId, TimeBase};

pub(crate) struct FfmpegRtspSource {
    url: String,
    stream_index: usize,
    input: Option<ffmpeg::format::context::Input>,
    time_base: TimeBase,
    width: u32,
    height: u32,
}

impl FfmpegRtspSource {
    pub(crate) fn new(url: String, stream_index: usize) -> Result<Self> {
        ffmpeg::init().context("initialize ffmpeg")?;
        Ok(FfmpegRtspSource {
            url,
            stream_index,
            input: None,
            time_base: TimeBase::new(0, 1),
            width: 0,
            height: 0,
        })
    }
}

impl PacketSource for FfmpegRtspSource {
    fn open(&mut self) -> Result<StreamInfo> {
        let input = ffmpeg::format::input(&self.url)
            .with_context(|| "failed to open stream input with ffmpeg")?;

        let stream = input
            .streams()
            .find(|s| s.index() == self.stream_index)
            .ok_or_else(|| {
                anyhow!(
                    "configured stream index {} does not exist",
                    self.stream_index
                )
            })?;

        let codec = codec_from_id(stream.parameters().id())?;
        let decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
            .context("load video stream parameters")?
            .decoder()
            .video()
            .context("read video stream geometry")?;

        let time_base = stream.time_base();
        let frames = stream.frames();
        let info = StreamInfo {
            index: stream.index(),
            codec,
            time_base: TimeBase::new(time_base.numerator(), time_base.denominator()),
            start_pts: no_pts_to_none(stream.start_time()),
            width: decoder.width(),
            height: decoder.height(),
            duration: no_pts_to_none(stream.duration()),
            frames: (frames > 0).then_some(frames),
            avg_frame_rate: rational_to_time_base(stream.avg_frame_rate()),
        };

        self.time_base = info.time_base;
        self.width = info.width;
        self.height = info.height;
        self.input = Some(input);
        Ok(info)
    }

    fn next_packet(&mut self) -> Result<Option<Packet>> {
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| anyhow!("source not opened"))?;

        for (stream, packet) in input.packets() {
            if stream.index() != self.stream_index {
                continue;
            }
            return Ok(Some(Packet {
                data: packet.data().map(<[u8]>::to_vec).unwrap_or_default(),
                pts: packet.pts(),
                dts: packet.dts(),
                duration: packet.duration(),
                time_base: self.time_base,
                is_keyframe: packet.is_key(),
                width: self.width,
                height: self.height,
            }));
        }
        Ok(None)
    }
}

fn codec_from_id(id: ffmpeg::codec::Id) -> Result<CodecId> {
    match id {
        ffmpeg::codec::Id::H264 => Ok(CodecId::H264),
        ffmpeg::codec::Id::HEVC => Ok(CodecId::H265),
        ffmpeg::codec::Id::AV1 => Ok(CodecId::Av1),
        other => Err(anyhow!(
            "unsupported stream codec {:?}; supported families are h264, h265, av1",
            other
        )),
    }
}

fn no_pts_to_none(value: i64) -> Option<i64> {
    // FFmpeg reports missing timestamps as AV_NOPTS_VALUE.
    (value != i64::MIN).then_some(value)
}

fn rational_to_time_base(rate: ffmpeg::Rational) -> Option<TimeBase> {
    (rate.denominator() != 0).then(|| TimeBase::new(rate.numerator(), rate.denominator()))
}
