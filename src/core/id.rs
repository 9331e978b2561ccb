use crate::core::session::SessionId;

/// 会话编号分配器
///
/// 只在单一逻辑线程上使用，一个计数器即可保证单调且不重复。
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> SessionId {
        self.last += 1;
        SessionId(self.last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_ids_strictly_increasing() {
        let mut ids = IdAllocator::new();
        let issued: Vec<SessionId> = (0..100).map(|_| ids.next()).collect();
        assert!(issued.windows(2).all(|w| w[0] < w[1]));
        let unique: HashSet<_> = issued.iter().collect();
        assert_eq!(unique.len(), issued.len());
    }

    #[test]
    fn test_first_id_is_one() {
        let mut ids = IdAllocator::new();
        assert_eq!(ids.next(), SessionId(1));
        assert_eq!(ids.next(), SessionId(2));
    }
}
