//! 미디어 백엔드 추상화
//!
//! 세션/펌프/싱크 로직은 이 트레이트들만 보고 동작한다.
//! - 실제 구현: `crate::ffmpeg` (ffmpeg-next)
//! - 테스트 구현: `fake` (스크립트 기반 가짜 컨테이너 + 리소스 카운터)
//!
//! 리소스 해제는 Drop에 맡긴다 (컨테이너 핸들, 코덱 컨텍스트, 패킷/프레임 버퍼).

#[cfg(test)]
pub mod fake;

use crate::decoder::frame::{AudioChunk, RgbImage};
use crate::error::Result;

/// 스트림 미디어 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Video,
    Audio,
    Other,
}

/// 스트림 타임베이스 (pts → 초 변환용)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeBase {
    pub num: i32,
    pub den: i32,
}

impl TimeBase {
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    pub fn to_seconds(self, pts: i64) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        pts as f64 * f64::from(self.num) / f64::from(self.den)
    }
}

/// 컨테이너 내 스트림 메타데이터 (probe 시점에 읽음, 이후 읽기 전용)
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: usize,
    pub media_type: MediaType,
    pub codec: String,
    pub time_base: TimeBase,
    pub duration_secs: Option<f64>,
    /// 비디오 전용 (오디오/기타 스트림은 0)
    pub width: u32,
    pub height: u32,
    /// 오디오 전용 (비디오/기타 스트림은 0)
    pub channels: u16,
    pub sample_rate: u32,
}

/// 패킷 읽기 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStatus {
    Packet,
    EndOfStream,
    /// 일시적 읽기 실패 (네트워크 끊김 등) - 종료 상태 아님
    Failed(String),
}

/// receive_frame 결과 ("프레임 없음"과 에러를 구분)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receive {
    Frame,
    NeedInput,
    EndOfStream,
}

/// 소스를 열어 입력 핸들을 만드는 진입점
pub trait MediaBackend {
    type Input: MediaInput;

    /// 로컬 경로 또는 URL 열기 + 헤더/스트림 정보 읽기 (포맷 자동 감지)
    fn open(&self, source: &str) -> Result<Self::Input>;
}

/// 열린 컨테이너 (디먹서)
pub trait MediaInput {
    type Packet: MediaPacket;
    type Frame;
    type Codec: StreamCodec<Packet = Self::Packet, Frame = Self::Frame>;
    type Converter: FrameConverter<Frame = Self::Frame>;

    /// 스트림 순서대로 전체 목록
    fn streams(&self) -> Vec<StreamInfo>;

    /// 컨테이너 전체 길이 (초)
    fn duration_secs(&self) -> Option<f64>;

    /// 스트림 디코더 찾기 + 컨텍스트 할당 + 열기
    fn open_codec(&self, stream: &StreamInfo) -> Result<Self::Codec>;

    fn new_packet(&self) -> Self::Packet;

    /// 패킷 하나 읽기 (재사용 버퍼에 채움)
    fn read_packet(&mut self, packet: &mut Self::Packet) -> ReadStatus;

    fn seek(&mut self, seconds: f64) -> Result<()>;

    fn converter(&self) -> Self::Converter;
}

pub trait MediaPacket {
    fn stream_index(&self) -> usize;

    fn pts(&self) -> Option<i64>;

    /// 페이로드 해제 (버퍼 자체는 다음 read에 재사용)
    fn release(&mut self);
}

/// 열린 코덱 컨텍스트 (send/receive 2단계 디코딩)
pub trait StreamCodec {
    type Packet;
    type Frame;

    fn new_frame(&self) -> Self::Frame;

    fn send_packet(&mut self, packet: &Self::Packet) -> Result<()>;

    fn receive_frame(&mut self, frame: &mut Self::Frame) -> Result<Receive>;

    /// 스트림 끝 알림 (버퍼에 남은 프레임 배출 시작)
    fn send_eof(&mut self) -> Result<()>;

    /// seek 후 내부 버퍼 초기화
    fn flush(&mut self);
}

/// 디코딩된 프레임 → 교환 포맷 변환 (스케일러/리샘플러 보유)
pub trait FrameConverter {
    type Frame;

    fn pts(&self, frame: &Self::Frame) -> Option<i64>;

    /// 네이티브 픽셀 포맷 → RGB24 (변환기 stride 유지)
    fn to_rgb24(&mut self, frame: &Self::Frame) -> Result<RgbImage>;

    /// 샘플 변환 없이 메타데이터만 (채널/샘플레이트/샘플 수)
    fn describe_audio(&self, frame: &Self::Frame) -> Result<AudioChunk>;

    /// packed f32 변환 (샘플레이트 유지)
    /// all_channels=false 이면 3채널 이상 소스는 스테레오로 다운믹스
    fn to_interleaved_f32(&mut self, frame: &Self::Frame, all_channels: bool) -> Result<AudioChunk>;
}
