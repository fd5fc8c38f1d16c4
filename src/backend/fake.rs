//! 테스트용 스크립트 백엔드
//!
//! 컨테이너 내용(스트림 목록, 패킷 순서, 패킷당 디코딩 프레임 수, 실패 주입)을
//! `FakeScript`로 기술한다. 입력/코덱/패킷/프레임은 생성 시 `ResourceCounters`를
//! 올리고 Drop 시 내리므로, 테스트에서 누수 여부를 카운터로 확인할 수 있다.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::sync::Arc;

use super::{
    FrameConverter, MediaBackend, MediaInput, MediaPacket, MediaType, ReadStatus, Receive,
    StreamCodec, StreamInfo, TimeBase,
};
use crate::decoder::frame::{AudioChunk, RgbImage};
use crate::error::{DecoderError, Result};

/// 살아있는 리소스 수
#[derive(Debug, Default)]
pub struct ResourceCounters {
    inputs: AtomicIsize,
    codecs: AtomicIsize,
    packets: AtomicIsize,
    frames: AtomicIsize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LiveCounts {
    pub inputs: isize,
    pub codecs: isize,
    pub packets: isize,
    pub frames: isize,
}

impl ResourceCounters {
    pub fn snapshot(&self) -> LiveCounts {
        LiveCounts {
            inputs: self.inputs.load(Ordering::SeqCst),
            codecs: self.codecs.load(Ordering::SeqCst),
            packets: self.packets.load(Ordering::SeqCst),
            frames: self.frames.load(Ordering::SeqCst),
        }
    }

    fn slot(&self, kind: Kind) -> &AtomicIsize {
        match kind {
            Kind::Input => &self.inputs,
            Kind::Codec => &self.codecs,
            Kind::Packet => &self.packets,
            Kind::Frame => &self.frames,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Input,
    Codec,
    Packet,
    Frame,
}

/// 생성 시 +1, Drop 시 -1
#[derive(Debug)]
struct Live {
    counters: Arc<ResourceCounters>,
    kind: Kind,
}

impl Live {
    fn new(counters: &Arc<ResourceCounters>, kind: Kind) -> Self {
        counters.slot(kind).fetch_add(1, Ordering::SeqCst);
        Self {
            counters: Arc::clone(counters),
            kind,
        }
    }
}

impl Drop for Live {
    fn drop(&mut self) {
        self.counters.slot(self.kind).fetch_sub(1, Ordering::SeqCst);
    }
}

/// 스크립트 패킷 하나
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedPacket {
    pub stream_index: usize,
    pub pts: i64,
    /// send 시 코덱 내부에 쌓이는 프레임 수
    pub frames: usize,
    /// EOF 전송 후에야 나오는 프레임 수 (B-frame 재정렬 지연 흉내)
    pub delayed: usize,
    pub fail_send: bool,
    pub fail_receive: bool,
    /// EOF 전송 후 receive가 계속 실패
    pub fail_drain: bool,
}

impl ScriptedPacket {
    pub fn new(stream_index: usize, pts: i64) -> Self {
        Self {
            stream_index,
            pts,
            frames: 1,
            delayed: 0,
            fail_send: false,
            fail_receive: false,
            fail_drain: false,
        }
    }

    pub fn frames(mut self, frames: usize) -> Self {
        self.frames = frames;
        self
    }

    pub fn delayed(mut self, delayed: usize) -> Self {
        self.delayed = delayed;
        self
    }

    pub fn failing_drain(mut self) -> Self {
        self.fail_drain = true;
        self
    }

    pub fn failing_send(mut self) -> Self {
        self.fail_send = true;
        self
    }

    pub fn failing_receive(mut self) -> Self {
        self.fail_receive = true;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeScript {
    pub streams: Vec<StreamInfo>,
    pub packets: Vec<ScriptedPacket>,
    pub fail_open: bool,
    /// open_codec이 실패하는 스트림 인덱스
    pub failing_codecs: Vec<usize>,
    /// 첫 패킷 전에 발생하는 일시적 읽기 실패 횟수
    pub transient_read_failures: usize,
    pub duration_secs: Option<f64>,
}

impl FakeScript {
    pub fn with_streams(streams: Vec<StreamInfo>) -> Self {
        Self {
            streams,
            ..Self::default()
        }
    }

    pub fn packets(mut self, packets: Vec<ScriptedPacket>) -> Self {
        self.packets = packets;
        self
    }
}

/// 비디오 스트림 (timebase 1/1000 → pts 단위 ms)
pub fn video_stream(index: usize, width: u32, height: u32) -> StreamInfo {
    StreamInfo {
        index,
        media_type: MediaType::Video,
        codec: "fakevideo".to_string(),
        time_base: TimeBase::new(1, 1000),
        duration_secs: Some(10.0),
        width,
        height,
        channels: 0,
        sample_rate: 0,
    }
}

/// 오디오 스트림 (timebase 1/1000)
pub fn audio_stream(index: usize, channels: u16, sample_rate: u32) -> StreamInfo {
    StreamInfo {
        index,
        media_type: MediaType::Audio,
        codec: "fakeaudio".to_string(),
        time_base: TimeBase::new(1, 1000),
        duration_secs: Some(10.0),
        width: 0,
        height: 0,
        channels,
        sample_rate,
    }
}

pub fn data_stream(index: usize) -> StreamInfo {
    StreamInfo {
        index,
        media_type: MediaType::Other,
        codec: "fakedata".to_string(),
        time_base: TimeBase::new(1, 1000),
        duration_secs: None,
        width: 0,
        height: 0,
        channels: 0,
        sample_rate: 0,
    }
}

/// 오디오 프레임당 샘플 수 (채널당)
pub const FAKE_AUDIO_SAMPLES: usize = 256;

#[derive(Debug, Clone)]
pub struct FakeBackend {
    script: FakeScript,
    counters: Arc<ResourceCounters>,
}

impl FakeBackend {
    pub fn new(script: FakeScript) -> Self {
        Self {
            script,
            counters: Arc::new(ResourceCounters::default()),
        }
    }

    pub fn counters(&self) -> Arc<ResourceCounters> {
        Arc::clone(&self.counters)
    }
}

impl MediaBackend for FakeBackend {
    type Input = FakeInput;

    fn open(&self, source: &str) -> Result<FakeInput> {
        if self.script.fail_open {
            return Err(DecoderError::open(source, "scripted open failure"));
        }
        Ok(FakeInput {
            script: self.script.clone(),
            cursor: 0,
            read_failures_left: self.script.transient_read_failures,
            counters: Arc::clone(&self.counters),
            _live: Live::new(&self.counters, Kind::Input),
        })
    }
}

#[derive(Debug)]
pub struct FakeInput {
    script: FakeScript,
    cursor: usize,
    read_failures_left: usize,
    counters: Arc<ResourceCounters>,
    _live: Live,
}

impl FakeInput {
    fn packet_time(&self, packet: &ScriptedPacket) -> f64 {
        self.script
            .streams
            .iter()
            .find(|s| s.index == packet.stream_index)
            .map_or(0.0, |s| s.time_base.to_seconds(packet.pts))
    }
}

impl MediaInput for FakeInput {
    type Packet = FakePacket;
    type Frame = FakeFrame;
    type Codec = FakeCodec;
    type Converter = FakeConverter;

    fn streams(&self) -> Vec<StreamInfo> {
        self.script.streams.clone()
    }

    fn duration_secs(&self) -> Option<f64> {
        self.script.duration_secs
    }

    fn open_codec(&self, stream: &StreamInfo) -> Result<FakeCodec> {
        if self.script.failing_codecs.contains(&stream.index) {
            return Err(DecoderError::codec(stream.index, "scripted codec failure"));
        }
        Ok(FakeCodec {
            info: stream.clone(),
            pending: VecDeque::new(),
            held: VecDeque::new(),
            fail_next_receive: false,
            fail_drain: false,
            eof: false,
            counters: Arc::clone(&self.counters),
            _live: Live::new(&self.counters, Kind::Codec),
        })
    }

    fn new_packet(&self) -> FakePacket {
        FakePacket {
            current: None,
            _live: Live::new(&self.counters, Kind::Packet),
        }
    }

    fn read_packet(&mut self, packet: &mut FakePacket) -> ReadStatus {
        if self.read_failures_left > 0 {
            self.read_failures_left -= 1;
            return ReadStatus::Failed("scripted read failure".to_string());
        }
        match self.script.packets.get(self.cursor) {
            Some(scripted) => {
                packet.current = Some(scripted.clone());
                self.cursor += 1;
                ReadStatus::Packet
            }
            None => ReadStatus::EndOfStream,
        }
    }

    /// 키프레임 seek 흉내: 목표 시각 이전의 마지막 패킷으로 이동
    fn seek(&mut self, seconds: f64) -> Result<()> {
        let mut target = 0;
        for (i, packet) in self.script.packets.iter().enumerate() {
            if self.packet_time(packet) <= seconds {
                target = i;
            }
        }
        self.cursor = target;
        Ok(())
    }

    fn converter(&self) -> FakeConverter {
        FakeConverter
    }
}

#[derive(Debug)]
pub struct FakePacket {
    current: Option<ScriptedPacket>,
    _live: Live,
}

impl FakePacket {
    pub fn is_loaded(&self) -> bool {
        self.current.is_some()
    }
}

impl MediaPacket for FakePacket {
    fn stream_index(&self) -> usize {
        self.current.as_ref().map_or(usize::MAX, |p| p.stream_index)
    }

    fn pts(&self) -> Option<i64> {
        self.current.as_ref().map(|p| p.pts)
    }

    fn release(&mut self) {
        self.current = None;
    }
}

#[derive(Debug)]
pub struct FakeCodec {
    info: StreamInfo,
    pending: VecDeque<i64>,
    /// EOF 전까지 내보내지 않는 프레임
    held: VecDeque<i64>,
    fail_next_receive: bool,
    fail_drain: bool,
    eof: bool,
    counters: Arc<ResourceCounters>,
    _live: Live,
}

impl StreamCodec for FakeCodec {
    type Packet = FakePacket;
    type Frame = FakeFrame;

    fn new_frame(&self) -> FakeFrame {
        FakeFrame {
            info: self.info.clone(),
            pts: None,
            filled: false,
            _live: Live::new(&self.counters, Kind::Frame),
        }
    }

    fn send_packet(&mut self, packet: &FakePacket) -> Result<()> {
        let scripted = packet
            .current
            .as_ref()
            .ok_or_else(|| DecoderError::Decode("empty packet".to_string()))?;
        // 실제 디코더처럼 출력이 남아 있으면 입력 거부 (EAGAIN)
        if !self.pending.is_empty() {
            return Err(DecoderError::Decode(
                "send_packet: output pending, receive first".to_string(),
            ));
        }
        if scripted.fail_send {
            return Err(DecoderError::Decode("scripted send failure".to_string()));
        }
        for i in 0..scripted.frames {
            self.pending.push_back(scripted.pts + i as i64);
        }
        for i in 0..scripted.delayed {
            self.held.push_back(scripted.pts + (scripted.frames + i) as i64);
        }
        self.fail_next_receive = scripted.fail_receive;
        self.fail_drain |= scripted.fail_drain;
        Ok(())
    }

    fn receive_frame(&mut self, frame: &mut FakeFrame) -> Result<Receive> {
        if self.fail_next_receive {
            self.fail_next_receive = false;
            return Err(DecoderError::Decode("scripted receive failure".to_string()));
        }
        if self.eof && self.fail_drain {
            return Err(DecoderError::Decode("scripted drain failure".to_string()));
        }
        match self.pending.pop_front() {
            Some(pts) => {
                frame.pts = Some(pts);
                frame.filled = true;
                Ok(Receive::Frame)
            }
            None if self.eof => Ok(Receive::EndOfStream),
            None => Ok(Receive::NeedInput),
        }
    }

    fn send_eof(&mut self) -> Result<()> {
        self.eof = true;
        self.pending.append(&mut self.held);
        Ok(())
    }

    fn flush(&mut self) {
        self.pending.clear();
        self.held.clear();
        self.eof = false;
    }
}

#[derive(Debug)]
pub struct FakeFrame {
    info: StreamInfo,
    pts: Option<i64>,
    filled: bool,
    _live: Live,
}

/// 스트림 정보 기반으로 결정적인 출력 생성
#[derive(Debug, Default)]
pub struct FakeConverter;

impl FakeConverter {
    /// 테스트에서 패킹 경로를 타도록 행마다 4바이트 패딩
    pub const STRIDE_PADDING: usize = 4;
}

impl FrameConverter for FakeConverter {
    type Frame = FakeFrame;

    fn pts(&self, frame: &FakeFrame) -> Option<i64> {
        frame.pts
    }

    fn to_rgb24(&mut self, frame: &FakeFrame) -> Result<RgbImage> {
        if !frame.filled || frame.info.media_type != MediaType::Video {
            return Err(DecoderError::Convert("not a decoded video frame".to_string()));
        }
        let width = frame.info.width;
        let height = frame.info.height;
        let stride = width as usize * 3 + Self::STRIDE_PADDING;
        let fill = frame.pts.unwrap_or(0) as u8;
        Ok(RgbImage {
            width,
            height,
            stride,
            data: vec![fill; stride * height as usize],
            timestamp: None,
        })
    }

    fn describe_audio(&self, frame: &FakeFrame) -> Result<AudioChunk> {
        if !frame.filled || frame.info.media_type != MediaType::Audio {
            return Err(DecoderError::Convert("not a decoded audio frame".to_string()));
        }
        Ok(AudioChunk {
            channels: frame.info.channels,
            sample_rate: frame.info.sample_rate,
            samples_per_channel: FAKE_AUDIO_SAMPLES,
            samples: Vec::new(),
            timestamp: None,
        })
    }

    fn to_interleaved_f32(&mut self, frame: &FakeFrame, all_channels: bool) -> Result<AudioChunk> {
        let mut chunk = self.describe_audio(frame)?;
        if !all_channels && chunk.channels > 2 {
            chunk.channels = 2;
        }
        chunk.samples = vec![0.25; FAKE_AUDIO_SAMPLES * chunk.channels as usize];
        Ok(chunk)
    }
}
