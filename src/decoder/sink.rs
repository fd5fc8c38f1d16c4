// Frame Sink - 디코딩된 프레임 소비
// - 비디오: 네이티브 픽셀 포맷 → RGB24 (프레임당 1회 동기 변환)
// - 오디오: AudioPolicy에 따라 메타데이터만 또는 interleaved f32

use std::path::PathBuf;

use log::warn;

use super::frame::{AudioChunk, RgbImage};
use super::ppm;
use crate::backend::{FrameConverter, StreamInfo};
use crate::error::Result;

/// 오디오 경로 정책 (리샘플링 정책은 호스트 오디오 파이프라인 몫)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioPolicy {
    /// 샘플 변환 없음 - 채널/샘플레이트/pts 메타데이터만 전달
    #[default]
    Discard,
    /// packed f32, 샘플레이트 유지
    /// all_channels=false: 3채널 이상은 스테레오 다운믹스
    Interleaved { all_channels: bool },
}

/// 디버그 PPM 덤프 (dir/frame-<n>.ppm)
#[derive(Debug)]
struct FrameDump {
    dir: PathBuf,
    next_index: u64,
}

pub struct FrameSink<C> {
    converter: C,
    audio_policy: AudioPolicy,
    dump: Option<FrameDump>,
}

impl<C: FrameConverter> FrameSink<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            audio_policy: AudioPolicy::default(),
            dump: None,
        }
    }

    pub fn audio_policy(&self) -> AudioPolicy {
        self.audio_policy
    }

    pub fn set_audio_policy(&mut self, policy: AudioPolicy) {
        self.audio_policy = policy;
    }

    /// 변환된 비디오 프레임을 디렉터리에 PPM으로 저장 (None이면 해제)
    pub fn set_frame_dump(&mut self, dir: Option<PathBuf>) {
        self.dump = dir.map(|dir| FrameDump { dir, next_index: 0 });
    }

    /// 비디오 프레임 → RGB24
    pub fn video(&mut self, frame: &C::Frame, stream: &StreamInfo) -> Result<RgbImage> {
        let mut image = self.converter.to_rgb24(frame)?;
        image.timestamp = self
            .converter
            .pts(frame)
            .map(|pts| stream.time_base.to_seconds(pts));

        if let Some(dump) = self.dump.as_mut() {
            let path = dump.dir.join(format!("frame-{}.ppm", dump.next_index));
            dump.next_index += 1;
            // 덤프 실패는 디코딩을 멈추지 않음
            if let Err(e) = ppm::save_ppm(&path, &image) {
                warn!("[SINK] PPM 저장 실패 {}: {}", path.display(), e);
            }
        }

        Ok(image)
    }

    /// 오디오 프레임 → AudioChunk
    pub fn audio(&mut self, frame: &C::Frame, stream: &StreamInfo) -> Result<AudioChunk> {
        let mut chunk = match self.audio_policy {
            AudioPolicy::Discard => self.converter.describe_audio(frame)?,
            AudioPolicy::Interleaved { all_channels } => {
                self.converter.to_interleaved_f32(frame, all_channels)?
            }
        };
        chunk.timestamp = self
            .converter
            .pts(frame)
            .map(|pts| stream.time_base.to_seconds(pts));
        Ok(chunk)
    }
}
