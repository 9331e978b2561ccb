use actix::Message;
use serde_json::Value;

use crate::core::backend::StreamSink;
use crate::core::error::SessionError;
use crate::core::view::SessionView;
use super::state::Session;

/// 启动下载
pub struct StartDownload {
    pub uri: String,
}
impl Message for StartDownload { type Result = Result<(), SessionError>; }

/// 取消下载，返回是否发生了状态转换
pub struct CancelDownload;
impl Message for CancelDownload { type Result = bool; }

/// 通过文件对话框选择种子文件作为下载地址
pub struct PickSource;
impl Message for PickSource { type Result = Option<String>; }

/// 关闭会话：先取消，再停止 actor
pub struct Close;
impl Message for Close { type Result = (); }

/// 查询会话及其当前视图
pub struct QuerySession;
impl Message for QuerySession { type Result = SessionInfo; }

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub session: Session,
    pub view: SessionView,
    /// 正在选择目录或解析名称，尚未进入 Downloading
    pub pending: bool,
}

// ================== 内部消息：异步启动流程回报，外部不应发送 ==================

pub struct AbortStart {
    pub run: u64,
}
impl Message for AbortStart { type Result = (); }

pub struct EnterResolving {
    pub run: u64,
}
impl Message for EnterResolving { type Result = bool; }

pub struct EnterDownloading {
    pub run: u64,
    pub name: Option<String>,
}
impl Message for EnterDownloading { type Result = Option<StreamSink>; }

pub struct FinishRun {
    pub run: u64,
    pub result: Result<(), String>,
}
impl Message for FinishRun { type Result = (); }

/// 推送通道中的一条消息，带上所属的 run
pub struct Inbound {
    pub run: u64,
    pub value: Value,
}
