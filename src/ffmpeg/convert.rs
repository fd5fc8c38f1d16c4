// 프레임 변환 - 스케일러(→ RGB24), 리샘플러(→ packed f32)
// 소스 포맷/해상도가 바뀌면 컨텍스트를 다시 만듦

use ffmpeg_next as ffmpeg;
use ffmpeg_next::software::{resampling, scaling};
use ffmpeg_next::ChannelLayout;
use log::debug;

use super::codec::FfmpegFrame;
use crate::backend::FrameConverter;
use crate::decoder::frame::{AudioChunk, RgbImage};
use crate::error::{DecoderError, Result};

const F32_PACKED: ffmpeg::format::Sample =
    ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Packed);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScalerKey {
    format: ffmpeg::format::Pixel,
    width: u32,
    height: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ResamplerKey {
    format: ffmpeg::format::Sample,
    layout: ChannelLayout,
    rate: u32,
    out_layout: ChannelLayout,
}

pub struct FfmpegConverter {
    scaler: Option<(ScalerKey, scaling::Context)>,
    resampler: Option<(ResamplerKey, resampling::Context)>,
}

impl FfmpegConverter {
    pub(super) fn new() -> Self {
        Self {
            scaler: None,
            resampler: None,
        }
    }

    fn scaler_for(&mut self, frame: &ffmpeg::frame::Video) -> Result<&mut scaling::Context> {
        let key = ScalerKey {
            format: frame.format(),
            width: frame.width(),
            height: frame.height(),
        };

        if self.scaler.as_ref().map(|(k, _)| *k) != Some(key) {
            // 해상도 유지, 색공간만 변환 (속도 우선 FAST_BILINEAR)
            let context = scaling::Context::get(
                key.format,
                key.width,
                key.height,
                ffmpeg::format::Pixel::RGB24,
                key.width,
                key.height,
                scaling::Flags::FAST_BILINEAR,
            )
            .map_err(|e| DecoderError::Convert(format!("Failed to create scaler: {}", e)))?;
            debug!("[CONVERT] scaler {:?} {}x{} → RGB24", key.format, key.width, key.height);
            self.scaler = Some((key, context));
        }

        self.scaler
            .as_mut()
            .map(|(_, context)| context)
            .ok_or_else(|| DecoderError::Convert("scaler unavailable".to_string()))
    }

    fn resampler_for(
        &mut self,
        frame: &ffmpeg::frame::Audio,
        all_channels: bool,
    ) -> Result<&mut resampling::Context> {
        let mut layout = frame.channel_layout();
        if layout.is_empty() {
            // 레이아웃 미지정 소스는 채널 수 기준 기본 레이아웃
            layout = ChannelLayout::default(i32::from(frame.channels()));
        }
        let out_layout = if !all_channels && frame.channels() > 2 {
            ChannelLayout::STEREO
        } else {
            layout
        };
        let key = ResamplerKey {
            format: frame.format(),
            layout,
            rate: frame.rate(),
            out_layout,
        };

        if self.resampler.as_ref().map(|(k, _)| *k) != Some(key) {
            // 샘플레이트는 유지 (리샘플링은 호스트 오디오 파이프라인 몫)
            let context = resampling::Context::get(
                key.format, key.layout, key.rate, F32_PACKED, key.out_layout, key.rate,
            )
            .map_err(|e| DecoderError::Convert(format!("Failed to create resampler: {}", e)))?;
            debug!(
                "[CONVERT] resampler {:?} {}ch {}Hz → f32 packed {}ch",
                key.format,
                frame.channels(),
                key.rate,
                key.out_layout.channels()
            );
            self.resampler = Some((key, context));
        }

        self.resampler
            .as_mut()
            .map(|(_, context)| context)
            .ok_or_else(|| DecoderError::Convert("resampler unavailable".to_string()))
    }
}

fn video_frame(frame: &FfmpegFrame) -> Result<&ffmpeg::frame::Video> {
    match frame {
        FfmpegFrame::Video(frame) => Ok(frame),
        FfmpegFrame::Audio(_) => Err(DecoderError::Convert("expected a video frame".to_string())),
    }
}

fn audio_frame(frame: &FfmpegFrame) -> Result<&ffmpeg::frame::Audio> {
    match frame {
        FfmpegFrame::Audio(frame) => Ok(frame),
        FfmpegFrame::Video(_) => Err(DecoderError::Convert("expected an audio frame".to_string())),
    }
}

impl FrameConverter for FfmpegConverter {
    type Frame = FfmpegFrame;

    fn pts(&self, frame: &FfmpegFrame) -> Option<i64> {
        // 디코더 추정 타임스탬프 우선 (best_effort), 없으면 pts
        match frame {
            FfmpegFrame::Video(frame) => frame.timestamp().or_else(|| frame.pts()),
            FfmpegFrame::Audio(frame) => frame.timestamp().or_else(|| frame.pts()),
        }
    }

    fn to_rgb24(&mut self, frame: &FfmpegFrame) -> Result<RgbImage> {
        let frame = video_frame(frame)?;
        let mut rgb = ffmpeg::frame::Video::empty();
        self.scaler_for(frame)?
            .run(frame, &mut rgb)
            .map_err(|e| DecoderError::Convert(format!("Scale failed: {}", e)))?;

        let width = rgb.width();
        let height = rgb.height();
        let stride = rgb.stride(0);
        let row_len = width as usize * RgbImage::BYTES_PER_PIXEL;
        let data = rgb.data(0);

        if stride < row_len {
            return Err(DecoderError::Convert(format!(
                "Invalid stride: {} < {} (width * 3)",
                stride, row_len
            )));
        }
        let required = (height as usize).saturating_sub(1) * stride + row_len;
        if height > 0 && data.len() < required {
            return Err(DecoderError::Convert(format!(
                "Frame data too small: got {} bytes, need {} ({}x{}, stride={})",
                data.len(),
                required,
                width,
                height,
                stride
            )));
        }

        Ok(RgbImage {
            width,
            height,
            stride,
            data: data[..required.min(data.len())].to_vec(),
            timestamp: None,
        })
    }

    fn describe_audio(&self, frame: &FfmpegFrame) -> Result<AudioChunk> {
        let frame = audio_frame(frame)?;
        Ok(AudioChunk {
            channels: frame.channels(),
            sample_rate: frame.rate(),
            samples_per_channel: frame.samples(),
            samples: Vec::new(),
            timestamp: None,
        })
    }

    fn to_interleaved_f32(&mut self, frame: &FfmpegFrame, all_channels: bool) -> Result<AudioChunk> {
        let frame = audio_frame(frame)?;
        let mut resampled = ffmpeg::frame::Audio::empty();
        self.resampler_for(frame, all_channels)?
            .run(frame, &mut resampled)
            .map_err(|e| DecoderError::Convert(format!("Resample failed: {}", e)))?;

        let channels = resampled.channels();
        let samples_per_channel = resampled.samples();
        let samples: Vec<f32> = resampled
            .data(0)
            .chunks_exact(4)
            .take(samples_per_channel * channels as usize)
            .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(AudioChunk {
            channels,
            sample_rate: frame.rate(),
            samples_per_channel: samples.len() / usize::from(channels.max(1)),
            samples,
            timestamp: None,
        })
    }
}
