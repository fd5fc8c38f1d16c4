// Decoder FFI - C# 연동 (native* 익스포트)
// 모든 함수는 int 핸들 기준, 모르는 핸들은 기본값 반환 (false, -1, 0으로 채운 출력)

use std::ffi::{c_char, c_void, CStr};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;
use std::time::Duration;

use libc::{c_float, c_int};
use log::{debug, error, info};

use crate::config::DecoderConfig;
use crate::ffi::registry::HandleRegistry;
use crate::ffi::types::ErrorCode;
use crate::ffmpeg::FfmpegBackend;
use crate::playback::{DecoderState, Player};

/// 동기 생성 시 초기화 결과 폴링 간격
const INIT_POLL: Duration = Duration::from_millis(5);

static DECODERS: OnceLock<Mutex<HandleRegistry<Player>>> = OnceLock::new();

fn registry() -> MutexGuard<'static, HandleRegistry<Player>> {
    DECODERS
        .get_or_init(|| Mutex::new(HandleRegistry::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// 핸들로 Player 조회 후 실행, 없으면 default
fn with_player<R>(id: c_int, default: R, f: impl FnOnce(&mut Player) -> R) -> R {
    let mut registry = registry();
    match registry.get_mut(id) {
        Some(player) => f(player),
        None => {
            debug!("[FFI] 알 수 없는 핸들 {}", id);
            default
        }
    }
}

/// 경로 문자열 변환 (NULL/UTF-8/빈 문자열 검사)
unsafe fn source_from_ptr<'a>(path: *const c_char) -> Result<&'a str, ErrorCode> {
    if path.is_null() {
        return Err(ErrorCode::NullPointer);
    }
    match CStr::from_ptr(path).to_str() {
        Ok(s) if !s.is_empty() => Ok(s),
        _ => Err(ErrorCode::InvalidParam),
    }
}

fn create_decoder(path: *const c_char, out_id: *mut c_int, wait: bool) -> c_int {
    crate::init();

    if out_id.is_null() {
        return ErrorCode::NullPointer as c_int;
    }

    let source = match unsafe { source_from_ptr(path) } {
        Ok(source) => source,
        Err(code) => return code as c_int,
    };

    let config = DecoderConfig::from_env();
    let created = registry().insert_with(|id| Player::spawn(FfmpegBackend, id, source, config));
    let id = match created {
        Ok(id) => id,
        Err(e) => {
            error!("[FFI] 디코더 생성 실패 {}: {}", source, e);
            return ErrorCode::from(&e) as c_int;
        }
    };

    unsafe {
        *out_id = id;
    }
    info!("[FFI] 디코더 {} 생성: {}", id, source);

    if !wait {
        return ErrorCode::Success as c_int;
    }

    // 레지스트리 락을 잡은 채 기다리지 않음 (다른 세션 호출이 막히지 않도록)
    loop {
        match with_player(id, DecoderState::InitFail, |p| p.init_state()) {
            DecoderState::Uninitialized => thread::sleep(INIT_POLL),
            DecoderState::InitFail => {
                // 핸들은 남겨둠 (상태 -1 조회 후 호스트가 destroy)
                return with_player(id, ErrorCode::InvalidHandle, |p| {
                    p.take_init_error()
                        .map_or(ErrorCode::Unknown, |e| ErrorCode::from(&e))
                }) as c_int;
            }
            _ => return ErrorCode::Success as c_int,
        }
    }
}

/// 모든 디코더 정지 + 해제
#[no_mangle]
pub extern "C" fn nativeCleanAll() {
    crate::init();
    // 스레드 join은 레지스트리 락 밖에서
    let players = registry().drain();
    info!("[FFI] 전체 정리: {}개", players.len());
    drop(players);
}

/// nativeScheduleDestroyDecoder로 표시된 디코더 해제
#[no_mangle]
pub extern "C" fn nativeCleanDestroyedDecoders() {
    let players = registry().take_where(|p| p.is_stop_requested());
    if !players.is_empty() {
        debug!("[FFI] 예약된 디코더 {}개 해제", players.len());
    }
    drop(players);
}

/// 디코더 생성 (초기화 완료까지 대기)
#[no_mangle]
pub extern "C" fn nativeCreateDecoder(path: *const c_char, id: *mut c_int) -> c_int {
    create_decoder(path, id, true)
}

/// 디코더 생성 (즉시 반환, nativeGetDecoderState로 1 | -1 폴링)
#[no_mangle]
pub extern "C" fn nativeCreateDecoderAsync(path: *const c_char, id: *mut c_int) -> c_int {
    create_decoder(path, id, false)
}

#[no_mangle]
pub extern "C" fn nativeGetDecoderState(id: c_int) -> c_int {
    with_player(id, DecoderState::InitFail, |p| p.init_state()) as c_int
}

#[no_mangle]
pub extern "C" fn nativeStartDecoding(id: c_int) -> bool {
    with_player(id, false, |p| p.start())
}

/// 정지 신호만 보내고 해제는 nativeCleanDestroyedDecoders에서
#[no_mangle]
pub extern "C" fn nativeScheduleDestroyDecoder(id: c_int) {
    with_player(id, (), |p| p.request_stop());
}

#[no_mangle]
pub extern "C" fn nativeDestroyDecoder(id: c_int) {
    let player = registry().remove(id);
    if player.is_some() {
        info!("[FFI] 디코더 {} 해제", id);
    }
    drop(player);
}

#[no_mangle]
pub extern "C" fn nativeIsEOF(id: c_int) -> bool {
    with_player(id, false, |p| p.is_eof())
}

/// 현재 비디오 시각에 표시할 RGB24 프레임 (width*height*3, 패딩 없음)
/// 포인터는 nativeReleaseVideoFrame 전까지 유효
#[no_mangle]
pub extern "C" fn nativeGrabVideoFrame(id: c_int, frame_data: *mut *mut c_void, frame_ready: *mut bool) {
    if frame_data.is_null() || frame_ready.is_null() {
        return;
    }

    let ptr = with_player(id, std::ptr::null_mut(), |p| {
        p.grab_video_frame()
            .map_or(std::ptr::null_mut(), |frame| frame.data.as_ptr() as *mut c_void)
    });

    unsafe {
        *frame_data = ptr;
        *frame_ready = !ptr.is_null();
    }
}

#[no_mangle]
pub extern "C" fn nativeReleaseVideoFrame(id: c_int) {
    with_player(id, (), |p| p.release_video_frame());
}

#[no_mangle]
pub extern "C" fn nativeIsVideoEnabled(id: c_int) -> bool {
    with_player(id, false, |p| p.is_video_enabled())
}

#[no_mangle]
pub extern "C" fn nativeSetVideoEnable(id: c_int, is_enable: bool) {
    with_player(id, (), |p| p.set_video_enabled(is_enable));
}

/// 비디오 포맷 (비디오 스트림 없음/모르는 핸들: 0, 0, -1)
#[no_mangle]
pub extern "C" fn nativeGetVideoFormat(
    id: c_int,
    width: *mut c_int,
    height: *mut c_int,
    total_time: *mut c_float,
) {
    if width.is_null() || height.is_null() || total_time.is_null() {
        return;
    }

    let format = with_player(id, None, |p| p.video_format());
    unsafe {
        match format {
            Some(format) => {
                *width = format.width as c_int;
                *height = format.height as c_int;
                *total_time = format.total_secs as c_float;
            }
            None => {
                *width = 0;
                *height = 0;
                *total_time = -1.0;
            }
        }
    }
}

#[no_mangle]
pub extern "C" fn nativeSetVideoTime(id: c_int, current_time: c_float) {
    with_player(id, (), |p| p.set_video_time(f64::from(current_time)));
}

#[no_mangle]
pub extern "C" fn nativeIsContentReady(id: c_int) -> bool {
    with_player(id, false, |p| p.is_content_ready())
}

#[no_mangle]
pub extern "C" fn nativeIsVideoBufferFull(id: c_int) -> bool {
    with_player(id, false, |p| p.is_video_buffer_full())
}

#[no_mangle]
pub extern "C" fn nativeIsVideoBufferEmpty(id: c_int) -> bool {
    with_player(id, false, |p| p.is_video_buffer_empty())
}

#[no_mangle]
pub extern "C" fn nativeIsAudioEnabled(id: c_int) -> bool {
    with_player(id, false, |p| p.is_audio_enabled())
}

#[no_mangle]
pub extern "C" fn nativeSetAudioEnable(id: c_int, is_enable: bool) {
    with_player(id, (), |p| p.set_audio_enabled(is_enable));
}

/// true: 원본 채널 전부, false: 3채널 이상은 스테레오로 다운믹스
#[no_mangle]
pub extern "C" fn nativeSetAudioAllChDataEnable(id: c_int, is_enable: bool) {
    with_player(id, (), |p| p.set_all_channels(is_enable));
}

/// 오디오 포맷 (오디오 스트림 없음/모르는 핸들: 0, 0, -1)
#[no_mangle]
pub extern "C" fn nativeGetAudioFormat(
    id: c_int,
    channel: *mut c_int,
    frequency: *mut c_int,
    total_time: *mut c_float,
) {
    if channel.is_null() || frequency.is_null() || total_time.is_null() {
        return;
    }

    let format = with_player(id, None, |p| p.audio_format());
    unsafe {
        match format {
            Some(format) => {
                *channel = c_int::from(format.channels);
                *frequency = format.sample_rate as c_int;
                *total_time = format.total_secs as c_float;
            }
            None => {
                *channel = 0;
                *frequency = 0;
                *total_time = -1.0;
            }
        }
    }
}

/// 다음 오디오 청크 (interleaved f32)
/// frame_size = 채널당 샘플 수, 반환값 = 청크 시각(초), 없으면 -1
/// 포인터는 nativeFreeAudioData 전까지 유효
#[no_mangle]
pub extern "C" fn nativeGetAudioData(
    id: c_int,
    audio_data: *mut *mut u8,
    frame_size: *mut c_int,
) -> c_float {
    if audio_data.is_null() || frame_size.is_null() {
        return -1.0;
    }

    let lent = with_player(id, None, |p| {
        p.audio_data().map(|chunk| {
            (
                chunk.samples.as_ptr() as *mut u8,
                chunk.samples_per_channel as c_int,
                chunk.timestamp.unwrap_or(0.0) as c_float,
            )
        })
    });

    unsafe {
        match lent {
            Some((ptr, samples, time)) => {
                *audio_data = ptr;
                *frame_size = samples;
                time
            }
            None => {
                *audio_data = std::ptr::null_mut();
                *frame_size = 0;
                -1.0
            }
        }
    }
}

#[no_mangle]
pub extern "C" fn nativeFreeAudioData(id: c_int) {
    with_player(id, (), |p| p.free_audio_data());
}

#[no_mangle]
pub extern "C" fn nativeSetSeekTime(id: c_int, sec: c_float) {
    with_player(id, (), |p| p.set_seek_time(f64::from(sec)));
}

#[no_mangle]
pub extern "C" fn nativeIsSeekOver(id: c_int) -> bool {
    with_player(id, false, |p| p.is_seek_over())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::fake::{audio_stream, video_stream, FakeBackend, FakeScript, ScriptedPacket};
    use std::ffi::CString;
    use std::time::Instant;

    /// 테스트 전용 핸들 (실제로 생성되는 핸들과 겹치지 않는 음수)
    const UNKNOWN: c_int = -12345;

    #[test]
    fn test_unknown_handle_queries_are_deterministic() {
        assert_eq!(nativeGetDecoderState(UNKNOWN), DecoderState::InitFail as c_int);
        assert!(!nativeStartDecoding(UNKNOWN));
        assert!(!nativeIsEOF(UNKNOWN));
        assert!(!nativeIsVideoEnabled(UNKNOWN));
        assert!(!nativeIsAudioEnabled(UNKNOWN));
        assert!(!nativeIsContentReady(UNKNOWN));
        assert!(!nativeIsVideoBufferFull(UNKNOWN));
        assert!(!nativeIsVideoBufferEmpty(UNKNOWN));
        assert!(!nativeIsSeekOver(UNKNOWN));

        // no-op
        nativeSetVideoEnable(UNKNOWN, true);
        nativeSetAudioEnable(UNKNOWN, true);
        nativeSetAudioAllChDataEnable(UNKNOWN, true);
        nativeSetVideoTime(UNKNOWN, 1.0);
        nativeSetSeekTime(UNKNOWN, 1.0);
        nativeReleaseVideoFrame(UNKNOWN);
        nativeFreeAudioData(UNKNOWN);
        nativeScheduleDestroyDecoder(UNKNOWN);
        nativeDestroyDecoder(UNKNOWN);
        nativeDestroyDecoder(UNKNOWN);
    }

    #[test]
    fn test_unknown_handle_out_params_are_zeroed() {
        let mut ptr: *mut c_void = 1 as *mut c_void;
        let mut ready = true;
        nativeGrabVideoFrame(UNKNOWN, &mut ptr, &mut ready);
        assert!(ptr.is_null());
        assert!(!ready);

        let (mut w, mut h, mut total) = (7, 7, 7.0);
        nativeGetVideoFormat(UNKNOWN, &mut w, &mut h, &mut total);
        assert_eq!((w, h, total), (0, 0, -1.0));

        let (mut ch, mut freq, mut total) = (7, 7, 7.0);
        nativeGetAudioFormat(UNKNOWN, &mut ch, &mut freq, &mut total);
        assert_eq!((ch, freq, total), (0, 0, -1.0));

        let mut data: *mut u8 = 1 as *mut u8;
        let mut size = 7;
        assert_eq!(nativeGetAudioData(UNKNOWN, &mut data, &mut size), -1.0);
        assert!(data.is_null());
        assert_eq!(size, 0);
    }

    #[test]
    fn test_null_pointers_are_rejected() {
        let mut id = -1;
        assert_eq!(
            nativeCreateDecoderAsync(std::ptr::null(), &mut id),
            ErrorCode::NullPointer as c_int
        );
        let path = CString::new("a.mp4").unwrap();
        assert_eq!(
            nativeCreateDecoderAsync(path.as_ptr(), std::ptr::null_mut()),
            ErrorCode::NullPointer as c_int
        );
        assert_eq!(id, -1);

        // 출력 포인터 NULL: 아무것도 쓰지 않음
        nativeGrabVideoFrame(UNKNOWN, std::ptr::null_mut(), std::ptr::null_mut());
        nativeGetVideoFormat(UNKNOWN, std::ptr::null_mut(), std::ptr::null_mut(), std::ptr::null_mut());
        assert_eq!(
            nativeGetAudioData(UNKNOWN, std::ptr::null_mut(), std::ptr::null_mut()),
            -1.0
        );
    }

    #[test]
    fn test_empty_path_is_invalid_param() {
        let mut id = -1;
        let empty = CString::new("").unwrap();
        assert_eq!(
            nativeCreateDecoder(empty.as_ptr(), &mut id),
            ErrorCode::InvalidParam as c_int
        );
        assert_eq!(id, -1);
    }

    #[test]
    fn test_sync_create_of_missing_file_reports_open_failure() {
        let path = CString::new("/nonexistent/ffi-missing.mp4").unwrap();
        let mut id = -1;
        assert_eq!(
            nativeCreateDecoder(path.as_ptr(), &mut id),
            ErrorCode::OpenFailed as c_int
        );
        assert!(id >= 0);
        assert_eq!(nativeGetDecoderState(id), DecoderState::InitFail as c_int);

        nativeDestroyDecoder(id);
        assert_eq!(nativeGetDecoderState(id), DecoderState::InitFail as c_int);
        assert!(!nativeStartDecoding(id));
    }

    fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        condition()
    }

    /// 가짜 백엔드 Player를 전역 레지스트리에 등록
    fn register_fake(source: &str) -> c_int {
        let backend = FakeBackend::new(
            FakeScript::with_streams(vec![video_stream(0, 4, 2), audio_stream(1, 6, 48_000)])
                .packets(vec![
                    ScriptedPacket::new(0, 0),
                    ScriptedPacket::new(1, 0),
                    ScriptedPacket::new(0, 40),
                ]),
        );
        let id = registry()
            .insert_with(|id| Player::spawn(backend, id, source, DecoderConfig::default()))
            .unwrap();
        assert!(wait_until(|| nativeGetDecoderState(id) == DecoderState::Initialized as c_int));
        id
    }

    #[test]
    fn test_dead_and_unknown_handles_leave_live_session_untouched() {
        let live = register_fake("fake://live");
        let doomed = register_fake("fake://doomed");
        assert_ne!(live, doomed);

        assert!(nativeStartDecoding(live));
        assert!(wait_until(|| nativeIsEOF(live)));
        nativeDestroyDecoder(doomed);

        for handle in [doomed, UNKNOWN] {
            assert!(!nativeStartDecoding(handle));
            nativeSetVideoEnable(handle, false);
            nativeSetAudioEnable(handle, false);
            nativeSetAudioAllChDataEnable(handle, true);
            nativeSetVideoTime(handle, 100.0);
            nativeSetSeekTime(handle, 0.0);
            let mut ptr: *mut c_void = std::ptr::null_mut();
            let mut ready = true;
            nativeGrabVideoFrame(handle, &mut ptr, &mut ready);
            assert!(!ready);
            nativeReleaseVideoFrame(handle);
            let mut data: *mut u8 = std::ptr::null_mut();
            let mut size = 0;
            assert_eq!(nativeGetAudioData(handle, &mut data, &mut size), -1.0);
            nativeFreeAudioData(handle);
            nativeScheduleDestroyDecoder(handle);
            nativeDestroyDecoder(handle);
        }
        nativeCleanDestroyedDecoders();

        // 살아있는 세션: 상태, 스위치, 포맷, 큐 모두 그대로
        assert_eq!(nativeGetDecoderState(live), DecoderState::DecodeEof as c_int);
        assert!(nativeIsEOF(live));
        assert!(nativeIsSeekOver(live));
        assert!(nativeIsVideoEnabled(live));
        assert!(nativeIsAudioEnabled(live));

        let (mut w, mut h, mut total) = (0, 0, 0.0);
        nativeGetVideoFormat(live, &mut w, &mut h, &mut total);
        assert_eq!((w, h, total), (4, 2, 10.0));
        let (mut ch, mut freq, mut total) = (0, 0, 0.0);
        nativeGetAudioFormat(live, &mut ch, &mut freq, &mut total);
        assert_eq!((ch, freq, total), (2, 48_000, 10.0));

        // 재생 시각 0 그대로 → 첫 프레임만 due
        assert!(!nativeIsVideoBufferEmpty(live));
        let mut ptr: *mut c_void = std::ptr::null_mut();
        let mut ready = false;
        nativeGrabVideoFrame(live, &mut ptr, &mut ready);
        assert!(ready);
        assert!(!ptr.is_null());
        nativeReleaseVideoFrame(live);

        let mut data: *mut u8 = std::ptr::null_mut();
        let mut size = 0;
        assert_eq!(nativeGetAudioData(live, &mut data, &mut size), 0.0);
        assert!(!data.is_null());
        nativeFreeAudioData(live);

        nativeDestroyDecoder(live);
        assert_eq!(nativeGetDecoderState(live), DecoderState::InitFail as c_int);
    }
}
