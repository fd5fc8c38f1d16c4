// FFmpeg 디코더 플러그인
// Rust + ffmpeg-next 기반, Unity 등 호스트 엔진이 native* C 함수로 구동

/// 디버그 로그 매크로: `cargo build --features debug_log` 시에만 출력
/// 평소 릴리스 빌드에서는 컴파일 자체에서 제외됨
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        #[cfg(feature = "debug_log")]
        log::trace!($($arg)*);
    };
}

pub mod backend;
pub mod config;
pub mod decoder;
pub mod error;
pub mod ffi;
pub mod ffmpeg;
pub mod playback;

use std::sync::Once;

// FFI 함수들을 최상위에서 재export
pub use ffi::*;

pub use config::DecoderConfig;
pub use error::{DecoderError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

static INIT: Once = Once::new();

/// 로거 + FFmpeg 로그 레벨 초기화 (여러 번 호출해도 1회만 동작)
pub fn init() {
    INIT.call_once(|| {
        let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
            .try_init();
        ffmpeg::set_log_level_warning();
        log::info!("ffmpeg_decoder_plugin {} initialized", VERSION);
    });
}
