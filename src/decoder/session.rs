// Decoder Session - 미디어 소스 1개 + 선택 스트림(최대 비디오 1, 오디오 1) 소유
// 생성 실패 시 부분 세션을 반환하지 않음 (할당된 것은 모두 Drop으로 해제)

use std::path::PathBuf;

use log::{error, info};

use super::probe::{probe_streams, StreamDescriptor};
use super::sink::{AudioPolicy, FrameSink};
use crate::backend::{MediaBackend, MediaInput, StreamCodec, StreamInfo};
use crate::error::Result;

/// 재사용 디코딩 프레임 버퍼 (선택된 스트림마다 1개)
pub(crate) struct FrameBuffers<F> {
    pub(crate) video: Option<F>,
    pub(crate) audio: Option<F>,
}

pub struct DecoderSession<I: MediaInput> {
    id: i32,
    source: String,
    // 필드 선언 순서 = 해제 순서: 컨테이너 → 패킷 → 프레임 → 비디오 코덱 → 오디오 코덱
    pub(crate) input: I,
    pub(crate) packet: I::Packet,
    pub(crate) frames: FrameBuffers<I::Frame>,
    pub(crate) video: Option<StreamDescriptor<I::Codec>>,
    pub(crate) audio: Option<StreamDescriptor<I::Codec>>,
    pub(crate) sink: FrameSink<I::Converter>,
    pub(crate) video_enabled: bool,
    pub(crate) audio_enabled: bool,
    /// 패킷 소진 (종료 상태, seek으로만 해제)
    pub(crate) end_of_stream: bool,
    /// 코덱에 EOF 전송 완료 (남은 프레임 배출 중)
    pub(crate) draining: bool,
    /// 마지막 receive가 프레임을 냄 (코덱에 출력이 더 남아 있을 수 있음)
    pub(crate) video_pending: bool,
    pub(crate) audio_pending: bool,
    /// 연속 패킷 읽기 실패 횟수
    pub(crate) read_failures: u32,
}

impl<I: MediaInput> DecoderSession<I> {
    /// 소스 열기 → 스트림 probe → 패킷/프레임 버퍼 할당
    pub fn open<B>(backend: &B, id: i32, source: &str) -> Result<Self>
    where
        B: MediaBackend<Input = I>,
    {
        info!("[SESSION {}] 열기: {}", id, source);

        let input = backend.open(source).map_err(|e| {
            error!("[SESSION {}] 소스 열기 실패: {}", id, e);
            e
        })?;

        let streams = probe_streams(&input).map_err(|e| {
            error!("[SESSION {}] 디코더 준비 실패: {}", id, e);
            e
        })?;

        let frames = FrameBuffers {
            video: streams.video.as_ref().map(|s| s.codec.new_frame()),
            audio: streams.audio.as_ref().map(|s| s.codec.new_frame()),
        };
        let packet = input.new_packet();
        let sink = FrameSink::new(input.converter());

        info!(
            "[SESSION {}] 준비 완료 (video={:?}, audio={:?})",
            id,
            streams.video.as_ref().map(|s| s.info.index),
            streams.audio.as_ref().map(|s| s.info.index)
        );

        Ok(Self {
            id,
            source: source.to_string(),
            input,
            packet,
            frames,
            video: streams.video,
            audio: streams.audio,
            sink,
            video_enabled: true,
            audio_enabled: true,
            end_of_stream: false,
            draining: false,
            video_pending: false,
            audio_pending: false,
            read_failures: 0,
        })
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn video_stream(&self) -> Option<&StreamInfo> {
        self.video.as_ref().map(|s| &s.info)
    }

    pub fn audio_stream(&self) -> Option<&StreamInfo> {
        self.audio.as_ref().map(|s| &s.info)
    }

    /// 스트림 길이, 없으면 컨테이너 길이
    pub fn stream_duration_secs(&self, stream: &StreamInfo) -> Option<f64> {
        stream
            .duration_secs
            .filter(|d| *d > 0.0)
            .or_else(|| self.input.duration_secs().filter(|d| *d > 0.0))
    }

    pub fn is_end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    /// 비활성화된 매체의 패킷은 디코딩 없이 버림 (스트림 선택 자체는 유지)
    pub fn set_video_enabled(&mut self, enabled: bool) {
        self.video_enabled = enabled;
    }

    pub fn set_audio_enabled(&mut self, enabled: bool) {
        self.audio_enabled = enabled;
    }

    pub fn audio_policy(&self) -> AudioPolicy {
        self.sink.audio_policy()
    }

    pub fn set_audio_policy(&mut self, policy: AudioPolicy) {
        self.sink.set_audio_policy(policy);
    }

    pub fn set_frame_dump(&mut self, dir: Option<PathBuf>) {
        self.sink.set_frame_dump(dir);
    }

    /// 특정 시간(초)으로 seek + 코덱 버퍼 초기화 (EOF 상태에서 복구)
    pub fn seek(&mut self, seconds: f64) -> Result<()> {
        self.input.seek(seconds)?;
        if let Some(video) = self.video.as_mut() {
            video.codec.flush();
        }
        if let Some(audio) = self.audio.as_mut() {
            audio.codec.flush();
        }
        self.end_of_stream = false;
        self.draining = false;
        self.video_pending = false;
        self.audio_pending = false;
        self.read_failures = 0;
        info!("[SESSION {}] seek {:.3}s", self.id, seconds);
        Ok(())
    }

    /// 세션 종료 - 컨테이너, 패킷, 프레임, 비디오 코덱, 오디오 코덱 순으로 해제
    /// self를 소비하므로 두 번 호출할 수 없음
    pub fn close(self) {
        let Self {
            id,
            input,
            packet,
            frames,
            video,
            audio,
            sink,
            ..
        } = self;

        info!("[SESSION {}] 리소스 해제", id);
        drop(input);
        drop(packet);
        drop(frames);
        drop(video);
        drop(audio);
        drop(sink);
    }
}
