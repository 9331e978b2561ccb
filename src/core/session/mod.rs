//! `session` 模块包含单个下载会话（标签）的全部逻辑
//!
//! - `state`: 会话数据与状态 `SessionState`
//! - `controller`: 纯状态机 `SessionController`
//! - `actor`: 驱动异步流程的 `SessionActor`
//! - `messages` / `handlers`: Actor 消息及其处理器

pub mod state;
pub mod controller;
pub mod actor;
pub mod messages;
mod handlers;

pub use actor::SessionActor;
pub use controller::{SessionController, StartTicket};
pub use messages::{CancelDownload, Close, PickSource, QuerySession, SessionInfo, StartDownload};
pub use state::{Session, SessionId, SessionState};
