// 스트림 디코더 - 비디오/오디오 코덱 컨텍스트

use ffmpeg_next as ffmpeg;
use ffmpeg_next::ffi;

use crate::backend::{MediaType, Receive, StreamCodec, StreamInfo};
use crate::error::{DecoderError, Result};

/// 디코더당 최대 스레드 수
const MAX_DECODER_THREADS: usize = 4;

pub enum FfmpegCodec {
    Video(ffmpeg::codec::decoder::Video),
    Audio(ffmpeg::codec::decoder::Audio),
}

/// 디코딩 프레임 버퍼 (매체별 타입)
pub enum FfmpegFrame {
    Video(ffmpeg::frame::Video),
    Audio(ffmpeg::frame::Audio),
}

impl FfmpegCodec {
    pub(super) fn open(
        stream: &StreamInfo,
        parameters: ffmpeg::codec::Parameters,
    ) -> Result<Self> {
        let mut context = ffmpeg::codec::context::Context::from_parameters(parameters)
            .map_err(|e| DecoderError::codec(stream.index, format!("Failed to create context: {}", e)))?;

        if let Ok(parallelism) = std::thread::available_parallelism() {
            context.set_threading(ffmpeg::threading::Config {
                kind: ffmpeg::threading::Type::Frame,
                count: parallelism.get().min(MAX_DECODER_THREADS),
            });
        }

        match stream.media_type {
            MediaType::Video => context
                .decoder()
                .video()
                .map(FfmpegCodec::Video)
                .map_err(|e| {
                    DecoderError::codec(stream.index, format!("{} video decoder: {}", stream.codec, e))
                }),
            MediaType::Audio => context
                .decoder()
                .audio()
                .map(FfmpegCodec::Audio)
                .map_err(|e| {
                    DecoderError::codec(stream.index, format!("{} audio decoder: {}", stream.codec, e))
                }),
            MediaType::Other => Err(DecoderError::codec(stream.index, "not a video/audio stream")),
        }
    }

    fn opened(&mut self) -> &mut ffmpeg::codec::decoder::Opened {
        match self {
            Self::Video(decoder) => &mut **decoder,
            Self::Audio(decoder) => &mut **decoder,
        }
    }
}

impl StreamCodec for FfmpegCodec {
    type Packet = ffmpeg::Packet;
    type Frame = FfmpegFrame;

    fn new_frame(&self) -> FfmpegFrame {
        match self {
            Self::Video(_) => FfmpegFrame::Video(ffmpeg::frame::Video::empty()),
            Self::Audio(_) => FfmpegFrame::Audio(ffmpeg::frame::Audio::empty()),
        }
    }

    fn send_packet(&mut self, packet: &ffmpeg::Packet) -> Result<()> {
        self.opened()
            .send_packet(packet)
            .map_err(|e| DecoderError::Decode(format!("send_packet: {}", e)))
    }

    fn receive_frame(&mut self, frame: &mut FfmpegFrame) -> Result<Receive> {
        let result = match (self, frame) {
            (Self::Video(decoder), FfmpegFrame::Video(frame)) => decoder.receive_frame(frame),
            (Self::Audio(decoder), FfmpegFrame::Audio(frame)) => decoder.receive_frame(frame),
            _ => return Err(DecoderError::Decode("frame buffer medium mismatch".to_string())),
        };

        match result {
            Ok(()) => Ok(Receive::Frame),
            // EAGAIN: 디코더가 입력을 더 필요로 함 (에러 아님)
            Err(ffmpeg::Error::Other { errno }) if errno == ffi::EAGAIN => Ok(Receive::NeedInput),
            Err(ffmpeg::Error::Eof) => Ok(Receive::EndOfStream),
            Err(e) => Err(DecoderError::Decode(format!("receive_frame: {}", e))),
        }
    }

    fn send_eof(&mut self) -> Result<()> {
        match self.opened().send_eof() {
            // 이미 EOF 전송됨
            Ok(()) | Err(ffmpeg::Error::Eof) => Ok(()),
            Err(e) => Err(DecoderError::Decode(format!("send_eof: {}", e))),
        }
    }

    fn flush(&mut self) {
        self.opened().flush();
    }
}
