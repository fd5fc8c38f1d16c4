// Decode Pump - 호출 1회당 최대 1프레임 생산
// 코덱에 출력이 남아 있으면 그것부터 꺼내고, 없을 때만 새 패킷 1개를 읽어 디코더로 전달

use log::{info, warn};

use super::frame::DecodedFrame;
use super::session::DecoderSession;
use crate::backend::{MediaInput, MediaPacket, ReadStatus, Receive, StreamCodec};
use crate::error::Result;

/// 이 횟수만큼 연속으로 읽기에 실패하면 스트림 끝으로 간주 (끊긴 네트워크 소스 등)
pub const MAX_CONSECUTIVE_READ_FAILURES: u32 = 300;

/// 펌프 1회 결과
#[derive(Debug, Clone, PartialEq)]
pub enum PumpResult {
    /// 읽을 패킷 없음 (스트림 끝 또는 일시적 읽기 실패)
    NoPacket,
    /// 패킷은 소비했지만 완성된 프레임 없음 (디코더가 입력 더 필요, 버린 패킷)
    NoFrame,
    Frame(DecodedFrame),
}

/// send 1회 + receive 최대 1회
/// 프레임을 받으면 true, 디코더가 입력을 더 원하거나 끝이면 false
pub(crate) fn decode_packet<C: StreamCodec>(
    codec: &mut C,
    packet: &C::Packet,
    frame: &mut C::Frame,
) -> Result<bool> {
    codec.send_packet(packet)?;
    receive_one(codec, frame)
}

fn receive_one<C: StreamCodec>(codec: &mut C, frame: &mut C::Frame) -> Result<bool> {
    match codec.receive_frame(frame)? {
        Receive::Frame => Ok(true),
        Receive::NeedInput | Receive::EndOfStream => Ok(false),
    }
}

impl<I: MediaInput> DecoderSession<I> {
    /// 프레임 1개 생산 시도
    /// - 이전 패킷에서 남은 프레임이 있으면 패킷을 읽지 않고 그것을 반환
    /// - 스트림 끝: NoPacket (이후 호출도 계속 NoPacket, seek으로만 해제)
    /// - 선택되지 않았거나 비활성화된 스트림의 패킷: NoFrame
    /// - send/receive/변환 실패: Err (세션은 계속 사용 가능)
    pub fn pump(&mut self) -> Result<PumpResult> {
        if self.end_of_stream {
            return Ok(PumpResult::NoPacket);
        }

        if let Some(frame) = self.receive_pending()? {
            return Ok(PumpResult::Frame(frame));
        }

        match self.input.read_packet(&mut self.packet) {
            ReadStatus::Packet => self.read_failures = 0,
            ReadStatus::EndOfStream => {
                info!("[PUMP {}] 스트림 끝", self.id());
                self.end_of_stream = true;
                return Ok(PumpResult::NoPacket);
            }
            ReadStatus::Failed(reason) => {
                self.read_failures += 1;
                warn!(
                    "[PUMP {}] 패킷 읽기 실패 ({}회 연속): {}",
                    self.id(),
                    self.read_failures,
                    reason
                );
                if self.read_failures >= MAX_CONSECUTIVE_READ_FAILURES {
                    warn!("[PUMP {}] 읽기 실패가 계속됨 → 스트림 끝으로 처리", self.id());
                    self.end_of_stream = true;
                }
                return Ok(PumpResult::NoPacket);
            }
        }

        let result = self.decode_current_packet();
        // 결과와 관계없이 패킷 페이로드는 매번 해제
        self.packet.release();
        result
    }

    /// 코덱에 남은 출력 꺼내기 (활성 매체만, 없으면 pending 해제)
    /// 에러가 나도 pending은 해제 (같은 에러 반복 방지)
    fn receive_pending(&mut self) -> Result<Option<DecodedFrame>> {
        if self.video_pending && self.video_enabled {
            self.video_pending = false;
            if let (Some(stream), Some(frame)) = (self.video.as_mut(), self.frames.video.as_mut()) {
                if receive_one(&mut stream.codec, frame)? {
                    self.video_pending = true;
                    let image = self.sink.video(frame, &stream.info)?;
                    return Ok(Some(DecodedFrame::Video(image)));
                }
            }
        }

        if self.audio_pending && self.audio_enabled {
            self.audio_pending = false;
            if let (Some(stream), Some(frame)) = (self.audio.as_mut(), self.frames.audio.as_mut()) {
                if receive_one(&mut stream.codec, frame)? {
                    self.audio_pending = true;
                    let chunk = self.sink.audio(frame, &stream.info)?;
                    return Ok(Some(DecodedFrame::Audio(chunk)));
                }
            }
        }

        Ok(None)
    }

    fn decode_current_packet(&mut self) -> Result<PumpResult> {
        let index = self.packet.stream_index();
        debug_log!(
            "[PUMP {}] packet stream={} pts={:?}",
            self.id(),
            index,
            self.packet.pts()
        );

        if self.video.as_ref().is_some_and(|s| s.info.index == index) {
            if !self.video_enabled {
                return Ok(PumpResult::NoFrame);
            }
            let (Some(stream), Some(frame)) = (self.video.as_mut(), self.frames.video.as_mut())
            else {
                return Ok(PumpResult::NoFrame);
            };
            if !decode_packet(&mut stream.codec, &self.packet, frame)? {
                return Ok(PumpResult::NoFrame);
            }
            self.video_pending = true;
            let image = self.sink.video(frame, &stream.info)?;
            return Ok(PumpResult::Frame(DecodedFrame::Video(image)));
        }

        if self.audio.as_ref().is_some_and(|s| s.info.index == index) {
            if !self.audio_enabled {
                return Ok(PumpResult::NoFrame);
            }
            let (Some(stream), Some(frame)) = (self.audio.as_mut(), self.frames.audio.as_mut())
            else {
                return Ok(PumpResult::NoFrame);
            };
            if !decode_packet(&mut stream.codec, &self.packet, frame)? {
                return Ok(PumpResult::NoFrame);
            }
            self.audio_pending = true;
            let chunk = self.sink.audio(frame, &stream.info)?;
            return Ok(PumpResult::Frame(DecodedFrame::Audio(chunk)));
        }

        // 선택되지 않은 스트림 (자막, 데이터, 두 번째 트랙 등)
        Ok(PumpResult::NoFrame)
    }

    /// 스트림 끝 이후 코덱 버퍼에 남은 프레임을 호출당 1개씩 배출
    /// 남은 프레임이 없으면 NoPacket, 스트림 끝 전에는 NoFrame
    pub fn drain(&mut self) -> Result<PumpResult> {
        if !self.end_of_stream {
            return Ok(PumpResult::NoFrame);
        }

        if !self.draining {
            // EOF 전송 전에 대기 중인 출력부터
            if let Some(frame) = self.receive_pending()? {
                return Ok(PumpResult::Frame(frame));
            }
            self.draining = true;
            let id = self.id();
            for stream in [self.video.as_mut(), self.audio.as_mut()].into_iter().flatten() {
                if let Err(e) = stream.codec.send_eof() {
                    warn!("[PUMP {}] 스트림 #{} EOF 전송 실패: {}", id, stream.info.index, e);
                }
            }
        }

        if self.video_enabled {
            if let (Some(stream), Some(frame)) = (self.video.as_mut(), self.frames.video.as_mut()) {
                if receive_one(&mut stream.codec, frame)? {
                    let image = self.sink.video(frame, &stream.info)?;
                    return Ok(PumpResult::Frame(DecodedFrame::Video(image)));
                }
            }
        }

        if self.audio_enabled {
            if let (Some(stream), Some(frame)) = (self.audio.as_mut(), self.frames.audio.as_mut()) {
                if receive_one(&mut stream.codec, frame)? {
                    let chunk = self.sink.audio(frame, &stream.info)?;
                    return Ok(PumpResult::Frame(DecodedFrame::Audio(chunk)));
                }
            }
        }

        Ok(PumpResult::NoPacket)
    }
}
