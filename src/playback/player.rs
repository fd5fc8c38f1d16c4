//! Player - 세션당 디코딩 스레드 + 비디오/오디오 큐
//!
//! 아키텍처:
//! - 세션은 디코딩 스레드 안에서 열리고 그 스레드만 소유 (펌프는 항상 한 번에 하나)
//! - 디코딩 스레드가 큐에 프레임 push, 큐가 가득 차면 대기
//! - 호스트 스레드는 큐에서 꺼내 빌려주기만 함 (디코딩 대기 없음)
//! - 재생 시계는 호스트가 nativeSetVideoTime으로 지정

use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{error, info, warn};

use super::frame_queue::FrameQueue;
use super::state::DecoderState;
use crate::backend::{MediaBackend, MediaInput};
use crate::config::DecoderConfig;
use crate::decoder::{AudioChunk, AudioPolicy, DecodedFrame, DecoderSession, PumpResult, RgbImage};
use crate::error::{DecoderError, Result};

/// 대기 루프 간격 (start 대기, 큐 가득 참, EOF)
const IDLE_SLEEP: Duration = Duration::from_millis(10);

/// seek 목표 시각 허용 오차 (초)
const SEEK_TOLERANCE_SECS: f64 = 0.001;

/// 경고 로그를 남길 최대 연속 디코딩 에러 수
const MAX_LOGGED_ERRORS: u64 = 10;

/// 스트림 끝 이후 배출 에러가 이만큼 연속되면 남은 프레임은 포기하고 EOF
const MAX_DRAIN_ERRORS: u32 = 10;

/// poison된 Mutex도 내부 값은 계속 사용
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoFormat {
    pub width: u32,
    pub height: u32,
    /// 전체 길이 (초), 모르면 -1
    pub total_secs: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub total_secs: f64,
}

/// seek 요청/완료 세대
/// 요청마다 generation 증가, 디코딩 스레드는 자신이 처리한 세대만 completed로 기록
#[derive(Debug, Default)]
struct SeekState {
    request: Option<f64>,
    generation: u64,
    completed: u64,
}

impl SeekState {
    fn is_over(&self) -> bool {
        self.completed == self.generation
    }

    fn complete(&mut self, generation: u64) {
        self.completed = self.completed.max(generation);
    }
}

#[derive(Debug, Default)]
struct MediaFormat {
    video: Option<VideoFormat>,
    audio: Option<AudioFormat>,
}

/// 호스트 스레드 ↔ 디코딩 스레드 공유 상태
struct Shared {
    state: AtomicI32,
    cancelled: AtomicBool,
    started: AtomicBool,
    eof: AtomicBool,
    video_enabled: AtomicBool,
    audio_enabled: AtomicBool,
    all_channels: AtomicBool,
    content_ready: AtomicBool,
    decode_errors: AtomicU64,
    /// 호스트 재생 시계 (f64 비트)
    video_time: AtomicU64,
    seek: Mutex<SeekState>,
    format: Mutex<MediaFormat>,
    init_error: Mutex<Option<DecoderError>>,
    video_queue: Mutex<FrameQueue<RgbImage>>,
    audio_queue: Mutex<FrameQueue<AudioChunk>>,
}

impl Shared {
    fn new(config: &DecoderConfig) -> Self {
        Self {
            state: AtomicI32::new(DecoderState::Uninitialized as i32),
            cancelled: AtomicBool::new(false),
            started: AtomicBool::new(false),
            eof: AtomicBool::new(false),
            video_enabled: AtomicBool::new(true),
            audio_enabled: AtomicBool::new(true),
            all_channels: AtomicBool::new(false),
            content_ready: AtomicBool::new(false),
            decode_errors: AtomicU64::new(0),
            video_time: AtomicU64::new(0f64.to_bits()),
            seek: Mutex::new(SeekState::default()),
            format: Mutex::new(MediaFormat::default()),
            init_error: Mutex::new(None),
            video_queue: Mutex::new(FrameQueue::new(config.video_queue_capacity)),
            audio_queue: Mutex::new(FrameQueue::new(config.audio_queue_capacity)),
        }
    }

    fn state(&self) -> DecoderState {
        DecoderState::from_i32(self.state.load(Ordering::SeqCst))
    }

    /// 디코딩 스레드용 상태 전이 (Stop 이후에는 무시)
    fn set_state(&self, state: DecoderState) {
        let _ = self
            .state
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                (current != DecoderState::Stop as i32).then_some(state as i32)
            });
    }

    fn transition(&self, from: DecoderState, to: DecoderState) {
        let _ = self.state.compare_exchange(
            from as i32,
            to as i32,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// 호스트 seek 요청 (이전 요청이 남아 있으면 덮어씀)
    fn request_seek(&self, seconds: f64) {
        self.content_ready.store(false, Ordering::SeqCst);
        let mut seek = lock(&self.seek);
        seek.request = Some(seconds.max(0.0));
        seek.generation += 1;
    }

    /// 대기 중인 seek 요청과 그 세대
    fn take_seek_request(&self) -> Option<(f64, u64)> {
        let mut seek = lock(&self.seek);
        let generation = seek.generation;
        seek.request.take().map(|target| (target, generation))
    }

    fn is_seek_over(&self) -> bool {
        lock(&self.seek).is_over()
    }

    fn clear_queues(&self) {
        lock(&self.video_queue).clear();
        lock(&self.audio_queue).clear();
    }

    fn publish_format<I: MediaInput>(&self, session: &DecoderSession<I>) {
        let mut format = lock(&self.format);
        format.video = session.video_stream().map(|s| VideoFormat {
            width: s.width,
            height: s.height,
            total_secs: session.stream_duration_secs(s).unwrap_or(-1.0),
        });
        format.audio = session.audio_stream().map(|s| AudioFormat {
            channels: s.channels,
            sample_rate: s.sample_rate,
            total_secs: session.stream_duration_secs(s).unwrap_or(-1.0),
        });
    }
}

/// 디코딩 스레드 진입점 - 세션 열기 → start 대기 → 디코딩 루프 → 세션 해제
fn decode_thread<B: MediaBackend>(
    backend: B,
    id: i32,
    source: String,
    config: DecoderConfig,
    shared: Arc<Shared>,
) {
    let mut session = match DecoderSession::open(&backend, id, &source) {
        Ok(session) => session,
        Err(e) => {
            error!("[PLAYER {}] 초기화 실패: {}", id, e);
            *lock(&shared.init_error) = Some(e);
            shared.set_state(DecoderState::InitFail);
            return;
        }
    };
    session.set_frame_dump(config.frame_dump_dir);
    shared.publish_format(&session);
    shared.set_state(DecoderState::Initialized);

    while !shared.is_cancelled() && !shared.started.load(Ordering::SeqCst) {
        thread::sleep(IDLE_SLEEP);
    }

    let mut worker = Worker::new(id, session, shared);
    if !worker.shared.is_cancelled() {
        worker.run();
    }
    worker.session.close();
}

struct Worker<I: MediaInput> {
    id: i32,
    session: DecoderSession<I>,
    shared: Arc<Shared>,
    /// 마지막 seek 목표 - 이보다 이른 프레임은 큐에 넣지 않음
    seek_target: Option<f64>,
    /// 처리 중인 seek 세대
    seek_generation: u64,
    video_frames: u64,
    audio_frames: u64,
    /// 스트림 끝 이후 연속 배출 에러
    drain_errors: u32,
}

impl<I: MediaInput> Worker<I> {
    fn new(id: i32, session: DecoderSession<I>, shared: Arc<Shared>) -> Self {
        Self {
            id,
            session,
            shared,
            seek_target: None,
            seek_generation: 0,
            video_frames: 0,
            audio_frames: 0,
            drain_errors: 0,
        }
    }

    fn run(&mut self) {
        info!("[PLAYER {}] 디코딩 시작", self.id);

        while !self.shared.is_cancelled() {
            if self.service_seek() {
                continue;
            }

            self.sync_switches();

            // EOF 보고 후에는 seek 또는 정지만 기다림
            if self.shared.eof.load(Ordering::SeqCst) {
                thread::sleep(IDLE_SLEEP);
                continue;
            }

            if self.queues_full() {
                self.shared
                    .transition(DecoderState::Buffering, DecoderState::Decoding);
                thread::sleep(IDLE_SLEEP);
                continue;
            }

            // 스트림 끝 이후에는 코덱에 남은 프레임 배출
            let draining = self.session.is_end_of_stream();
            let result = if draining {
                self.session.drain()
            } else {
                self.session.pump()
            };

            match result {
                Ok(PumpResult::Frame(frame)) => self.accept(frame),
                Ok(PumpResult::NoFrame) => {}
                Ok(PumpResult::NoPacket) if draining => {
                    self.finish();
                    thread::sleep(IDLE_SLEEP);
                }
                Ok(PumpResult::NoPacket) => {
                    // 일시적 읽기 실패 (스트림 끝이면 다음 루프에서 drain)
                    if !self.session.is_end_of_stream() {
                        thread::sleep(IDLE_SLEEP);
                    }
                }
                Err(e) => {
                    let errors = self.shared.decode_errors.fetch_add(1, Ordering::SeqCst) + 1;
                    if errors <= MAX_LOGGED_ERRORS {
                        warn!("[PLAYER {}] 디코딩 에러 #{}: {}", self.id, errors, e);
                    }
                    if draining {
                        self.drain_errors += 1;
                        if self.drain_errors >= MAX_DRAIN_ERRORS {
                            warn!("[PLAYER {}] 남은 프레임 배출 실패 반복 → EOF", self.id);
                            self.finish();
                        }
                    }
                    thread::sleep(IDLE_SLEEP);
                }
            }
        }

        info!(
            "[PLAYER {}] 디코딩 종료: video={}, audio={}, errors={}",
            self.id,
            self.video_frames,
            self.audio_frames,
            self.shared.decode_errors.load(Ordering::SeqCst)
        );
    }

    /// 대기 중인 seek 요청 처리, 처리했으면 true
    fn service_seek(&mut self) -> bool {
        match self.shared.take_seek_request() {
            Some((target, generation)) => {
                self.seek(target, generation);
                true
            }
            None => false,
        }
    }

    /// 처리 중인 세대의 seek 완료 표시 (그 사이 새 요청이 왔으면 여전히 미완료)
    fn complete_seek(&self) {
        lock(&self.shared.seek).complete(self.seek_generation);
    }

    /// 호스트 스위치(매체 on/off, 전체 채널) 반영
    fn sync_switches(&mut self) {
        self.session
            .set_video_enabled(self.shared.video_enabled.load(Ordering::SeqCst));
        self.session
            .set_audio_enabled(self.shared.audio_enabled.load(Ordering::SeqCst));

        let policy = AudioPolicy::Interleaved {
            all_channels: self.shared.all_channels.load(Ordering::SeqCst),
        };
        if self.session.audio_policy() != policy {
            self.session.set_audio_policy(policy);
        }
    }

    /// 활성 매체 중 하나라도 큐가 가득 차면 대기
    fn queues_full(&self) -> bool {
        let video_full = self.session.video_stream().is_some()
            && self.shared.video_enabled.load(Ordering::SeqCst)
            && lock(&self.shared.video_queue).is_full();
        let audio_full = self.session.audio_stream().is_some()
            && self.shared.audio_enabled.load(Ordering::SeqCst)
            && lock(&self.shared.audio_queue).is_full();
        video_full || audio_full
    }

    fn seek(&mut self, target: f64, generation: u64) {
        self.seek_generation = generation;
        self.drain_errors = 0;
        self.shared.set_state(DecoderState::Seek);
        self.shared.clear_queues();
        self.shared.eof.store(false, Ordering::SeqCst);
        self.shared.content_ready.store(false, Ordering::SeqCst);

        match self.session.seek(target) {
            Ok(()) => self.seek_target = Some(target),
            Err(e) => {
                warn!("[PLAYER {}] seek 실패: {}", self.id, e);
                self.seek_target = None;
                self.complete_seek();
            }
        }
        self.shared.set_state(DecoderState::Buffering);
    }

    fn accept(&mut self, frame: DecodedFrame) {
        {
            // 요청 확인과 완료 기록은 같은 락 안에서
            let mut seek = lock(&self.shared.seek);
            // 새 seek 요청 이후 나온 프레임은 어차피 큐 초기화 대상
            if seek.request.is_some() {
                return;
            }
            if let Some(target) = self.seek_target {
                if frame
                    .timestamp()
                    .is_some_and(|t| t + SEEK_TOLERANCE_SECS < target)
                {
                    return;
                }
                seek.complete(self.seek_generation);
            }
        }

        match frame {
            DecodedFrame::Video(image) => {
                debug_log!("[PLAYER {}] video frame {:?}", self.id, image.timestamp);
                lock(&self.shared.video_queue).push(image.into_packed());
                self.video_frames += 1;
                self.shared.content_ready.store(true, Ordering::SeqCst);
            }
            DecodedFrame::Audio(chunk) => {
                debug_log!("[PLAYER {}] audio chunk {:?}", self.id, chunk.timestamp);
                lock(&self.shared.audio_queue).push(chunk);
                self.audio_frames += 1;
                if self.session.video_stream().is_none() {
                    self.shared.content_ready.store(true, Ordering::SeqCst);
                }
            }
        }
    }

    fn finish(&mut self) {
        if !self.shared.eof.swap(true, Ordering::SeqCst) {
            info!("[PLAYER {}] 스트림 끝", self.id);
            self.complete_seek();
            self.shared.set_state(DecoderState::DecodeEof);
        }
    }
}

/// 세션 1개 재생기 (디코딩 스레드 + 호스트에 빌려준 프레임)
pub struct Player {
    id: i32,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    /// release 전까지 호스트가 포인터를 들고 있는 프레임
    lent_video: Option<RgbImage>,
    lent_audio: Option<AudioChunk>,
}

impl Player {
    /// 디코딩 스레드 시작 (세션 열기는 스레드 안에서 비동기로 진행)
    pub fn spawn<B>(backend: B, id: i32, source: &str, config: DecoderConfig) -> Result<Self>
    where
        B: MediaBackend + Send + 'static,
    {
        let shared = Arc::new(Shared::new(&config));
        let worker = {
            let shared = Arc::clone(&shared);
            let source = source.to_string();
            thread::Builder::new()
                .name(format!("decoder-{}", id))
                .spawn(move || decode_thread(backend, id, source, config, shared))?
        };

        Ok(Self {
            id,
            shared,
            worker: Some(worker),
            lent_video: None,
            lent_audio: None,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn state(&self) -> DecoderState {
        self.shared.state()
    }

    /// 폴링용 상태 - 상태를 남기지 못하고 스레드가 끝났으면 (panic 등) InitFail
    pub fn init_state(&self) -> DecoderState {
        let state = self.state();
        if state != DecoderState::Uninitialized {
            return state;
        }
        if self.worker.as_ref().map_or(true, |w| w.is_finished()) {
            let state = self.state();
            if state == DecoderState::Uninitialized {
                return DecoderState::InitFail;
            }
            return state;
        }
        DecoderState::Uninitialized
    }

    /// 초기화 결과가 나올 때까지 대기 (Initialized 또는 InitFail)
    pub fn wait_initialized(&self) -> DecoderState {
        loop {
            let state = self.init_state();
            if state != DecoderState::Uninitialized {
                return state;
            }
            thread::sleep(IDLE_SLEEP);
        }
    }

    pub fn take_init_error(&self) -> Option<DecoderError> {
        lock(&self.shared.init_error).take()
    }

    /// 디코딩 시작 (초기화 전/실패/정지 상태면 false)
    pub fn start(&self) -> bool {
        match self.state() {
            DecoderState::Initialized => {
                self.shared.started.store(true, Ordering::SeqCst);
                self.shared
                    .transition(DecoderState::Initialized, DecoderState::Buffering);
                info!("[PLAYER {}] start", self.id);
                true
            }
            state => state.is_running(),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.shared.eof.load(Ordering::SeqCst)
    }

    pub fn is_video_enabled(&self) -> bool {
        self.shared.video_enabled.load(Ordering::SeqCst)
    }

    pub fn set_video_enabled(&self, enabled: bool) {
        self.shared.video_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn is_audio_enabled(&self) -> bool {
        self.shared.audio_enabled.load(Ordering::SeqCst)
    }

    pub fn set_audio_enabled(&self, enabled: bool) {
        self.shared.audio_enabled.store(enabled, Ordering::SeqCst);
    }

    /// true: 모든 채널 유지, false: 3채널 이상은 스테레오 다운믹스
    pub fn set_all_channels(&self, enabled: bool) {
        self.shared.all_channels.store(enabled, Ordering::SeqCst);
    }

    pub fn video_format(&self) -> Option<VideoFormat> {
        lock(&self.shared.format).video
    }

    /// 호스트가 받게 될 오디오 포맷 (다운믹스 반영)
    pub fn audio_format(&self) -> Option<AudioFormat> {
        let all_channels = self.shared.all_channels.load(Ordering::SeqCst);
        lock(&self.shared.format).audio.map(|mut format| {
            if !all_channels && format.channels > 2 {
                format.channels = 2;
            }
            format
        })
    }

    pub fn set_video_time(&self, seconds: f64) {
        self.shared
            .video_time
            .store(seconds.to_bits(), Ordering::SeqCst);
    }

    pub fn video_time(&self) -> f64 {
        f64::from_bits(self.shared.video_time.load(Ordering::SeqCst))
    }

    /// 현재 재생 시각에 표시할 프레임 빌려주기
    /// release 전에 다시 호출하면 같은 프레임
    pub fn grab_video_frame(&mut self) -> Option<&RgbImage> {
        if self.lent_video.is_none() {
            let now = self.video_time();
            self.lent_video = lock(&self.shared.video_queue).pop_due(now);
        }
        self.lent_video.as_ref()
    }

    pub fn release_video_frame(&mut self) {
        self.lent_video = None;
    }

    /// 다음 오디오 청크 빌려주기 (free 전에 다시 호출하면 같은 청크)
    pub fn audio_data(&mut self) -> Option<&AudioChunk> {
        if self.lent_audio.is_none() {
            self.lent_audio = lock(&self.shared.audio_queue).pop();
        }
        self.lent_audio.as_ref()
    }

    pub fn free_audio_data(&mut self) {
        self.lent_audio = None;
    }

    /// seek 요청 (디코딩 스레드가 다음 루프에서 처리)
    pub fn set_seek_time(&self, seconds: f64) {
        info!("[PLAYER {}] seek 요청 {:.3}s", self.id, seconds);
        self.shared.request_seek(seconds);
    }

    /// 마지막 seek 요청이 처리되었는지 (요청이 없었으면 true)
    pub fn is_seek_over(&self) -> bool {
        self.shared.is_seek_over()
    }

    /// 지금까지 디코딩 스레드에서 난 에러 수
    pub fn decode_error_count(&self) -> u64 {
        self.shared.decode_errors.load(Ordering::SeqCst)
    }

    pub fn is_content_ready(&self) -> bool {
        self.shared.content_ready.load(Ordering::SeqCst)
    }

    pub fn is_video_buffer_full(&self) -> bool {
        lock(&self.shared.video_queue).is_full()
    }

    pub fn is_video_buffer_empty(&self) -> bool {
        lock(&self.shared.video_queue).is_empty()
    }

    /// 디코딩 스레드에 정지 신호만 보냄 (join은 stop/Drop에서)
    pub fn request_stop(&self) {
        self.shared.cancelled.store(true, Ordering::SeqCst);
        self.shared
            .state
            .store(DecoderState::Stop as i32, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// 디코딩 스레드 종료 + 세션 해제
    pub fn stop(&mut self) {
        if self.worker.is_none() {
            return;
        }

        self.request_stop();

        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                error!("[PLAYER {}] 디코딩 스레드 panic", self.id);
            }
        }

        self.shared.clear_queues();
        info!("[PLAYER {}] 정지", self.id);
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}
