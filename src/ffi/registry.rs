// 핸들 레지스트리 - C# int 핸들 ↔ 세션 객체
// 핸들은 0부터 증가, 제거된 핸들은 재사용하지 않음

use std::collections::HashMap;

pub struct HandleRegistry<T> {
    entries: HashMap<i32, T>,
    next_handle: i32,
}

impl<T> Default for HandleRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> HandleRegistry<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_handle: 0,
        }
    }

    /// 음수가 아닌 다음 빈 핸들 (i32::MAX 이후 0으로 돌아가며 사용 중인 것은 건너뜀)
    fn allocate(&mut self) -> i32 {
        loop {
            let handle = self.next_handle;
            self.next_handle = if handle == i32::MAX { 0 } else { handle + 1 };
            if !self.entries.contains_key(&handle) {
                return handle;
            }
        }
    }

    /// 핸들을 먼저 정하고 객체 생성 (생성 실패 시 등록하지 않음)
    pub fn insert_with<E>(&mut self, make: impl FnOnce(i32) -> Result<T, E>) -> Result<i32, E> {
        let handle = self.allocate();
        let value = make(handle)?;
        self.entries.insert(handle, value);
        Ok(handle)
    }

    pub fn get(&self, handle: i32) -> Option<&T> {
        self.entries.get(&handle)
    }

    pub fn get_mut(&mut self, handle: i32) -> Option<&mut T> {
        self.entries.get_mut(&handle)
    }

    pub fn contains(&self, handle: i32) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn remove(&mut self, handle: i32) -> Option<T> {
        self.entries.remove(&handle)
    }

    /// 조건에 맞는 항목을 꺼냄 (해제는 호출자가 락 밖에서)
    pub fn take_where(&mut self, mut predicate: impl FnMut(&T) -> bool) -> Vec<(i32, T)> {
        let handles: Vec<i32> = self
            .entries
            .iter()
            .filter(|(_, value)| predicate(value))
            .map(|(handle, _)| *handle)
            .collect();
        handles
            .into_iter()
            .filter_map(|handle| self.entries.remove(&handle).map(|value| (handle, value)))
            .collect()
    }

    pub fn drain(&mut self) -> Vec<(i32, T)> {
        self.entries.drain().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
