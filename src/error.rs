// 디코더 에러 타입
// 세션 생성 실패(Open/Codec)와 펌프 실패(Decode)를 구분

use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecoderError>;

#[derive(Error, Debug)]
pub enum DecoderError {
    /// 컨테이너를 열 수 없거나 스트림 정보를 읽지 못함
    #[error("failed to open '{source_url}': {reason}")]
    Open { source_url: String, reason: String },

    /// 선택된 스트림의 디코더를 찾거나 열 수 없음 (세션 생성 전체 실패)
    #[error("codec error on stream #{stream}: {reason}")]
    Codec { stream: usize, reason: String },

    /// send_packet 실패 또는 receive_frame 치명적 실패 (해당 펌프 호출만 실패)
    #[error("decode error: {0}")]
    Decode(String),

    /// 픽셀/샘플 포맷 변환 실패
    #[error("conversion error: {0}")]
    Convert(String),

    #[error("seek error: {0}")]
    Seek(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DecoderError {
    pub fn open(source_url: &str, reason: impl ToString) -> Self {
        Self::Open {
            source_url: source_url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn codec(stream: usize, reason: impl ToString) -> Self {
        Self::Codec {
            stream,
            reason: reason.to_string(),
        }
    }

    /// 세션 생성 단계에서 발생한 에러인지 (Open/Codec)
    pub fn is_creation_error(&self) -> bool {
        matches!(self, Self::Open { .. } | Self::Codec { .. })
    }
}
