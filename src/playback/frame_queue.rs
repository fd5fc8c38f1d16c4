//! 디코딩 결과 큐 (디코딩 스레드 → 호스트)
//! Mutex로 감싸서 사용, 용량은 세션 설정값

use std::collections::VecDeque;

use crate::decoder::{AudioChunk, RgbImage};

/// 표시 시각(초)을 가진 큐 원소
pub trait Timed {
    fn time(&self) -> Option<f64>;
}

impl Timed for RgbImage {
    fn time(&self) -> Option<f64> {
        self.timestamp
    }
}

impl Timed for AudioChunk {
    fn time(&self) -> Option<f64> {
        self.timestamp
    }
}

/// 시각 정보 없는 프레임은 항상 due
fn is_due<T: Timed>(frame: &T, now: f64) -> bool {
    frame.time().map_or(true, |t| t <= now)
}

pub struct FrameQueue<T> {
    buffer: VecDeque<T>,
    max_len: usize,
}

impl<T: Timed> FrameQueue<T> {
    pub fn new(capacity: usize) -> Self {
        let max_len = capacity.max(1);
        Self {
            buffer: VecDeque::with_capacity(max_len),
            max_len,
        }
    }

    /// 큐에 추가 (용량 초과 시 가장 오래된 것 evict)
    pub fn push(&mut self, frame: T) {
        while self.buffer.len() >= self.max_len {
            let _ = self.buffer.pop_front();
        }
        self.buffer.push_back(frame);
    }

    /// now 시점에 표시할 프레임 꺼내기
    /// 뒤 프레임도 이미 due면 앞 프레임은 지나간 것으로 보고 버림
    pub fn pop_due(&mut self, now: f64) -> Option<T> {
        if !self.buffer.front().is_some_and(|f| is_due(f, now)) {
            return None;
        }
        while self.buffer.get(1).is_some_and(|f| is_due(f, now)) {
            let _ = self.buffer.pop_front();
        }
        self.buffer.pop_front()
    }

    /// 가장 오래된 원소 제거 후 반환
    pub fn pop(&mut self) -> Option<T> {
        self.buffer.pop_front()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.buffer.len() >= self.max_len
    }
}
