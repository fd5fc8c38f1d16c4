// 디코더 상태 (호스트가 nativeGetDecoderState로 폴링하는 값)

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecoderState {
    InitFail = -1,
    Uninitialized = 0,
    Initialized = 1,
    Decoding = 2,
    Seek = 3,
    Buffering = 4,
    DecodeEof = 5,
    Stop = 6,
}

impl DecoderState {
    /// 알 수 없는 값은 InitFail (호스트의 1 | -1 대기 루프가 끝나도록)
    pub fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Uninitialized,
            1 => Self::Initialized,
            2 => Self::Decoding,
            3 => Self::Seek,
            4 => Self::Buffering,
            5 => Self::DecodeEof,
            6 => Self::Stop,
            _ => Self::InitFail,
        }
    }

    /// start 이후 디코딩 스레드가 돌고 있는 상태
    pub fn is_running(self) -> bool {
        matches!(self, Self::Decoding | Self::Seek | Self::Buffering | Self::DecodeEof)
    }
}
