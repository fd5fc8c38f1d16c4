// 디코딩 결과 프레임 (소유권이 호출자에게 넘어가는 독립 값)
// 세션의 재사용 패킷/프레임 버퍼와는 메모리를 공유하지 않음

use crate::backend::MediaType;

/// RGB24 이미지 (행 단위 stride, stride >= width * 3)
#[derive(Debug, Clone, PartialEq)]
pub struct RgbImage {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<u8>,
    /// 표시 시각 (초)
    pub timestamp: Option<f64>,
}

impl RgbImage {
    pub const BYTES_PER_PIXEL: usize = 3;

    /// 의미 있는 행 길이 (width * 3)
    pub fn row_len(&self) -> usize {
        self.width as usize * Self::BYTES_PER_PIXEL
    }

    /// y번째 행 (stride 패딩 제외)
    pub fn row(&self, y: usize) -> &[u8] {
        let start = y * self.stride;
        &self.data[start..start + self.row_len()]
    }

    pub fn is_packed(&self) -> bool {
        self.stride == self.row_len()
    }

    /// 패딩 없는 연속 버퍼로 변환 (호스트 텍스처 업로드용: w*h*3 바이트)
    pub fn into_packed(self) -> RgbImage {
        if self.is_packed() {
            return self;
        }

        let row_len = self.row_len();
        let mut data = Vec::with_capacity(row_len * self.height as usize);
        for y in 0..self.height as usize {
            data.extend_from_slice(self.row(y));
        }

        RgbImage {
            width: self.width,
            height: self.height,
            stride: row_len,
            data,
            timestamp: self.timestamp,
        }
    }
}

/// 오디오 청크 (interleaved f32)
/// samples가 비어 있으면 메타데이터 전용 (AudioPolicy::Discard)
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub channels: u16,
    pub sample_rate: u32,
    pub samples_per_channel: usize,
    pub samples: Vec<f32>,
    pub timestamp: Option<f64>,
}

impl AudioChunk {
    pub fn has_samples(&self) -> bool {
        !self.samples.is_empty()
    }

    /// 청크 길이 (초)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples_per_channel as f64 / f64::from(self.sample_rate)
    }
}

/// 펌프 1회당 최대 1개 생산되는 프레임
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedFrame {
    Video(RgbImage),
    Audio(AudioChunk),
}

impl DecodedFrame {
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Video(_) => MediaType::Video,
            Self::Audio(_) => MediaType::Audio,
        }
    }

    pub fn timestamp(&self) -> Option<f64> {
        match self {
            Self::Video(image) => image.timestamp,
            Self::Audio(chunk) => chunk.timestamp,
        }
    }
}
