// 디코더 설정 (큐 크기, 디버그 프레임 덤프)

use std::path::PathBuf;

/// PPM 프레임 덤프 디렉터리 환경 변수
pub const FRAME_DUMP_ENV: &str = "FFMPEG_DECODER_FRAME_DUMP";

#[derive(Debug, Clone, PartialEq)]
pub struct DecoderConfig {
    /// 비디오 큐 최대 프레임 수
    pub video_queue_capacity: usize,
    /// 오디오 큐 최대 청크 수
    pub audio_queue_capacity: usize,
    /// Some이면 변환된 비디오 프레임을 frame-<n>.ppm으로 저장
    pub frame_dump_dir: Option<PathBuf>,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            video_queue_capacity: 8,
            audio_queue_capacity: 32,
            frame_dump_dir: None,
        }
    }
}

impl DecoderConfig {
    /// 기본값 + 환경 변수
    pub fn from_env() -> Self {
        Self::default().with_frame_dump(std::env::var_os(FRAME_DUMP_ENV).map(PathBuf::from))
    }

    /// 빈 경로는 덤프 비활성화로 취급
    pub fn with_frame_dump(mut self, dir: Option<PathBuf>) -> Self {
        self.frame_dump_dir = dir.filter(|d| !d.as_os_str().is_empty());
        self
    }
}
