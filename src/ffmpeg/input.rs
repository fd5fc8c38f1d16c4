// 디먹서 - format::context::Input 래퍼

use ffmpeg_next as ffmpeg;
use log::debug;

use super::codec::{FfmpegCodec, FfmpegFrame};
use super::convert::FfmpegConverter;
use crate::backend::{MediaInput, MediaPacket, MediaType, ReadStatus, StreamInfo, TimeBase};
use crate::error::{DecoderError, Result};

/// AV_TIME_BASE (μs)
const AV_TIME_BASE: f64 = 1_000_000.0;

pub struct FfmpegInput {
    ctx: ffmpeg::format::context::Input,
}

impl FfmpegInput {
    pub(super) fn open(source: &str) -> Result<Self> {
        // 포맷은 자동 감지 (로컬 경로, http/rtsp 등 URL)
        let ctx = ffmpeg::format::input(source).map_err(|e| DecoderError::open(source, e))?;
        debug!(
            "[FFMPEG] 열림: {} (format={}, streams={})",
            source,
            ctx.format().name(),
            ctx.nb_streams()
        );
        Ok(Self { ctx })
    }

    fn stream_info(stream: &ffmpeg::format::stream::Stream) -> StreamInfo {
        let parameters = stream.parameters();
        let media_type = match parameters.medium() {
            ffmpeg::media::Type::Video => MediaType::Video,
            ffmpeg::media::Type::Audio => MediaType::Audio,
            _ => MediaType::Other,
        };

        // 해상도/채널/샘플레이트는 코덱 파라미터에서 직접 읽음 (디코더 열기 전)
        let (width, height, channels, sample_rate) = unsafe {
            let par = parameters.as_ptr();
            (
                (*par).width.max(0) as u32,
                (*par).height.max(0) as u32,
                (*par).ch_layout.nb_channels.max(0) as u16,
                (*par).sample_rate.max(0) as u32,
            )
        };

        let time_base = stream.time_base();
        let time_base = TimeBase::new(time_base.numerator(), time_base.denominator());
        let duration_secs = if stream.duration() > 0 {
            Some(time_base.to_seconds(stream.duration()))
        } else {
            None
        };

        StreamInfo {
            index: stream.index(),
            media_type,
            codec: parameters.id().name().to_string(),
            time_base,
            duration_secs,
            width,
            height,
            channels,
            sample_rate,
        }
    }
}

impl MediaInput for FfmpegInput {
    type Packet = ffmpeg::Packet;
    type Frame = FfmpegFrame;
    type Codec = FfmpegCodec;
    type Converter = FfmpegConverter;

    fn streams(&self) -> Vec<StreamInfo> {
        self.ctx.streams().map(|s| Self::stream_info(&s)).collect()
    }

    fn duration_secs(&self) -> Option<f64> {
        let duration = self.ctx.duration();
        if duration > 0 {
            Some(duration as f64 / AV_TIME_BASE)
        } else {
            None
        }
    }

    fn open_codec(&self, stream: &StreamInfo) -> Result<FfmpegCodec> {
        let ff_stream = self
            .ctx
            .stream(stream.index)
            .ok_or_else(|| DecoderError::codec(stream.index, "stream not found"))?;
        FfmpegCodec::open(stream, ff_stream.parameters())
    }

    fn new_packet(&self) -> ffmpeg::Packet {
        ffmpeg::Packet::empty()
    }

    fn read_packet(&mut self, packet: &mut ffmpeg::Packet) -> ReadStatus {
        match packet.read(&mut self.ctx) {
            Ok(()) => ReadStatus::Packet,
            Err(ffmpeg::Error::Eof) => ReadStatus::EndOfStream,
            Err(e) => ReadStatus::Failed(e.to_string()),
        }
    }

    fn seek(&mut self, seconds: f64) -> Result<()> {
        // stream_index = -1 → 타임스탬프는 AV_TIME_BASE (μs) 단위
        let timestamp_us = (seconds.max(0.0) * AV_TIME_BASE) as i64;
        self.ctx
            .seek(timestamp_us, ..timestamp_us)
            .map_err(|e| DecoderError::Seek(format!("{:.3}s: {}", seconds, e)))
    }

    fn converter(&self) -> FfmpegConverter {
        FfmpegConverter::new()
    }
}

impl MediaPacket for ffmpeg::Packet {
    fn stream_index(&self) -> usize {
        self.stream()
    }

    fn pts(&self) -> Option<i64> {
        ffmpeg::Packet::pts(self)
    }

    fn release(&mut self) {
        *self = ffmpeg::Packet::empty();
    }
}
