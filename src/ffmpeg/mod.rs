// FFmpeg 백엔드 (ffmpeg-next)
// crate::backend 트레이트의 실제 구현: 디먹서 / 코덱 / 스케일러 / 리샘플러

mod codec;
mod convert;
mod input;

pub use codec::{FfmpegCodec, FfmpegFrame};
pub use convert::FfmpegConverter;
pub use input::FfmpegInput;

use ffmpeg_next as ffmpeg;

use crate::backend::MediaBackend;
use crate::error::{DecoderError, Result};

/// 로컬 파일 경로 또는 URL을 여는 백엔드
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl MediaBackend for FfmpegBackend {
    type Input = FfmpegInput;

    fn open(&self, source: &str) -> Result<FfmpegInput> {
        ffmpeg::init().map_err(|e| DecoderError::open(source, format!("FFmpeg init failed: {}", e)))?;
        FfmpegInput::open(source)
    }
}

/// FFmpeg 자체 로그 레벨 (기본 stderr 출력이 호스트 콘솔을 덮지 않도록)
pub fn set_log_level_warning() {
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Warning);
}
