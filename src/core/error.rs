use thiserror::Error;
use std::io;

use crate::core::session::{SessionId, SessionState};

/// 会话层错误：只影响所属会话，从不导致进程退出
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("输入无效: {0}")]
    Validation(String),

    #[error("会话正在进行中: {0}")]
    AlreadyActive(SessionState),

    #[error("会话不存在: {0}")]
    UnknownSession(SessionId),

    #[error("会话已关闭: {0}")]
    Mailbox(String),
}

impl From<actix::MailboxError> for SessionError {
    fn from(error: actix::MailboxError) -> Self {
        SessionError::Mailbox(error.to_string())
    }
}

/// 后台下载任务错误
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("网络错误: {0}")]
    NetworkError(String),

    #[error("IO错误: {0}")]
    IoError(#[from] io::Error),

    #[error("无效的URL: {0}")]
    InvalidUrl(String),

    #[error("不支持的协议: {0}")]
    UnsupportedProtocol(String),

    #[error("服务器错误: {0}")]
    ServerError(String),

    #[error("already in progress: {0}")]
    AlreadyInProgress(String),

    #[error("下载被取消")]
    Cancelled,

    #[error("未知错误: {0}")]
    Unknown(String),
}

impl From<String> for DownloadError {
    fn from(error: String) -> Self {
        DownloadError::Unknown(error)
    }
}

impl From<&str> for DownloadError {
    fn from(error: &str) -> Self {
        DownloadError::Unknown(error.to_string())
    }
}

pub type DownloadResult<T> = Result<T, DownloadError>;
