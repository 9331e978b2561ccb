//! 外部协作者边界：下载后台、文件对话框以及推送通道

use async_trait::async_trait;
use futures::channel::mpsc::UnboundedSender;
use serde_json::Value;
use std::path::PathBuf;

use crate::core::error::DownloadError;
use crate::core::session::SessionId;

/// 推送通道：绑定到某个会话，后台通过它发送进度消息
#[derive(Debug, Clone)]
pub struct StreamSink {
    session: SessionId,
    tx: UnboundedSender<Value>,
}

impl StreamSink {
    pub fn new(session: SessionId, tx: UnboundedSender<Value>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// 订阅已被解除时返回 false，后台应停止推送
    pub fn send(&self, value: Value) -> bool {
        self.tx.unbounded_send(value).is_ok()
    }

    #[cfg(test)]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// 下载后台命令
#[async_trait(?Send)]
pub trait Backend {
    async fn resolve_name(&self, uri: &str) -> Result<String, DownloadError>;

    /// 任务结束（成功或失败）前可以通过 `sink` 推送任意条消息
    async fn start_task(&self, uri: &str, output: &str, sink: StreamSink) -> Result<(), DownloadError>;

    /// 尽力而为，调用方忽略结果
    async fn stop_task(&self, uri: &str) -> Result<(), DownloadError>;
}

/// 文件选择过滤器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn torrent() -> Self {
        Self {
            name: "Torrent Files".to_string(),
            extensions: vec!["torrent".to_string()],
        }
    }

    pub fn matches(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }
}

/// 目录/文件选择对话框，用户取消时返回 `None`
#[async_trait(?Send)]
pub trait Dialogs {
    async fn pick_directory(&self) -> Option<PathBuf>;
    async fn pick_file(&self, filters: &[FileFilter]) -> Option<PathBuf>;
}
