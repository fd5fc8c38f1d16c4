// FFI 공통 타입

use crate::error::DecoderError;

/// 에러 코드 (C#과 공유)
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NullPointer = 1,
    InvalidParam = 2,
    InvalidHandle = 3,
    OpenFailed = 4,
    CodecFailed = 5,
    Unknown = 99,
}

impl From<&DecoderError> for ErrorCode {
    fn from(error: &DecoderError) -> Self {
        match error {
            DecoderError::Open { .. } => ErrorCode::OpenFailed,
            DecoderError::Codec { .. } => ErrorCode::CodecFailed,
            _ => ErrorCode::Unknown,
        }
    }
}
