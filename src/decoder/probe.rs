// Stream Prober - 스트림 1회 순회, 미디어 타입별 첫 스트림만 선택
// 멀티트랙은 지원하지 않음 (첫 비디오 + 첫 오디오)

use log::{debug, info};

use crate::backend::{MediaInput, MediaType, StreamInfo};
use crate::error::Result;

/// 선택된 스트림 (인덱스/코덱/열린 코덱 컨텍스트) - open 이후 변경 불가
pub struct StreamDescriptor<C> {
    pub info: StreamInfo,
    pub(crate) codec: C,
}

pub struct SelectedStreams<C> {
    pub video: Option<StreamDescriptor<C>>,
    pub audio: Option<StreamDescriptor<C>>,
}

/// 첫 비디오/첫 오디오 스트림 선택 + 디코더 열기
/// 선택된 스트림의 디코더 실패는 전체 실패 (이미 연 코덱은 Drop으로 해제)
pub fn probe_streams<I: MediaInput>(input: &I) -> Result<SelectedStreams<I::Codec>> {
    let mut selected = SelectedStreams {
        video: None,
        audio: None,
    };

    for stream in input.streams() {
        let slot = match stream.media_type {
            MediaType::Video => &mut selected.video,
            MediaType::Audio => &mut selected.audio,
            MediaType::Other => {
                debug!("[PROBE] 스트림 #{} ({}) 건너뜀: 비디오/오디오 아님", stream.index, stream.codec);
                continue;
            }
        };

        if slot.is_some() {
            debug!(
                "[PROBE] 스트림 #{} ({:?}) 건너뜀: 이미 선택된 스트림 있음",
                stream.index, stream.media_type
            );
            continue;
        }

        let codec = input.open_codec(&stream)?;
        info!(
            "[PROBE] {:?} 스트림 #{} 선택 (codec={})",
            stream.media_type, stream.index, stream.codec
        );
        *slot = Some(StreamDescriptor { info: stream, codec });
    }

    Ok(selected)
}
