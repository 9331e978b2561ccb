//! Core: 会话状态机、推送消息规范化、视图投影以及标签管理

pub mod backend;
pub mod error;
pub mod id;
pub mod registry;
pub mod session;
pub mod snapshot;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, Dialogs, FileFilter, StreamSink};
pub use error::{DownloadError, SessionError};
pub use id::IdAllocator;
pub use registry::{
    ActiveSession, CancelSession, CloseSession, CreateSession, ListSessions, PickSessionSource,
    QuerySessionById, SetActive, StartSession, TabInfo, TabRegistryActor,
};
pub use session::{Session, SessionId, SessionState};
