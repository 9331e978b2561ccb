use serde::{Deserialize, Serialize};
use std::fmt;

/// 会话（标签）编号，由 `IdAllocator` 单调递增分配
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 会话状态
///
/// `Idle → Resolving → Downloading → {Completed | Failed | Cancelled}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,
    Resolving,
    Downloading,
    Completed,
    Failed(String),
    Cancelled,
}

impl SessionState {
    /// 终止状态：不再处理任何推送消息
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed(_) | SessionState::Cancelled
        )
    }

    /// 持有后台订阅的状态
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Resolving | SessionState::Downloading)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Resolving => write!(f, "resolving"),
            SessionState::Downloading => write!(f, "downloading"),
            SessionState::Completed => write!(f, "completed"),
            SessionState::Failed(msg) => write!(f, "failed: {}", msg),
            SessionState::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// 一个用户可见的下载会话
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub uri: String,
    pub state: SessionState,
    pub display_name: String,
}

impl Session {
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            uri: String::new(),
            state: SessionState::Idle,
            display_name: format!("Tab {}", id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!SessionState::Idle.is_terminal());
        assert!(!SessionState::Resolving.is_terminal());
        assert!(!SessionState::Downloading.is_terminal());
        assert!(SessionState::Completed.is_terminal());
        assert!(SessionState::Failed("boom".to_string()).is_terminal());
        assert!(SessionState::Cancelled.is_terminal());
    }

    #[test]
    fn test_new_session_is_idle() {
        let session = Session::new(SessionId(3));
        assert_eq!(session.state, SessionState::Idle);
        assert_eq!(session.display_name, "Tab 3");
        assert!(session.uri.is_empty());
    }
}
