use actix::prelude::*;
use futures::future::join_all;
use log::{debug, info};
use std::rc::Rc;

use crate::core::backend::{Backend, Dialogs};
use crate::core::error::SessionError;
use crate::core::id::IdAllocator;
use crate::core::session::{
    CancelDownload, Close, PickSource, QuerySession, Session, SessionActor, SessionId, SessionInfo,
    StartDownload,
};
use crate::ui::RenderAdapter;

// ================== 消息定义 ==================

/// 新建会话，可选择立即设为可见
pub struct CreateSession {
    pub auto_activate: bool,
}
impl Message for CreateSession { type Result = Session; }

/// 关闭会话，返回是否真的移除了会话
pub struct CloseSession {
    pub id: SessionId,
}
impl Message for CloseSession { type Result = bool; }

/// 切换可见会话，只影响显示
pub struct SetActive {
    pub id: SessionId,
}
impl Message for SetActive { type Result = bool; }

/// 当前可见会话
pub struct ActiveSession;
impl Message for ActiveSession { type Result = Option<SessionId>; }

/// 在指定会话中启动下载
pub struct StartSession {
    pub id: SessionId,
    pub uri: String,
}
impl Message for StartSession { type Result = Result<(), SessionError>; }

/// 取消指定会话的下载
pub struct CancelSession {
    pub id: SessionId,
}
impl Message for CancelSession { type Result = Result<bool, SessionError>; }

/// 为指定会话选择种子文件
pub struct PickSessionSource {
    pub id: SessionId,
}
impl Message for PickSessionSource { type Result = Result<Option<String>, SessionError>; }

/// 查询指定会话
pub struct QuerySessionById {
    pub id: SessionId,
}
impl Message for QuerySessionById { type Result = Result<SessionInfo, SessionError>; }

/// 按创建顺序列出所有会话
pub struct ListSessions;
impl Message for ListSessions { type Result = Vec<TabInfo>; }

#[derive(Debug, Clone)]
pub struct TabInfo {
    pub info: SessionInfo,
    pub active: bool,
}

// ================== 标签管理 Actor ==================

struct Tab {
    id: SessionId,
    addr: Addr<SessionActor>,
}

/// 管理所有会话及可见会话的选择
pub struct TabRegistryActor {
    ids: IdAllocator,
    tabs: Vec<Tab>,
    active: Option<SessionId>,
    backend: Rc<dyn Backend>,
    dialogs: Rc<dyn Dialogs>,
    adapter: Box<dyn RenderAdapter>,
    label_len: usize,
}

impl Actor for TabRegistryActor {
    type Context = Context<Self>;
}

impl TabRegistryActor {
    pub fn new(
        ids: IdAllocator,
        backend: Rc<dyn Backend>,
        dialogs: Rc<dyn Dialogs>,
        adapter: Box<dyn RenderAdapter>,
        label_len: usize,
    ) -> Self {
        Self {
            ids,
            tabs: Vec::new(),
            active: None,
            backend,
            dialogs,
            adapter,
            label_len,
        }
    }

    fn session_addr(&self, id: SessionId) -> Result<Addr<SessionActor>, SessionError> {
        self.tabs
            .iter()
            .find(|tab| tab.id == id)
            .map(|tab| tab.addr.clone())
            .ok_or(SessionError::UnknownSession(id))
    }

    fn activate(&mut self, id: Option<SessionId>) {
        self.active = id;
        self.adapter.activate(id);
    }
}

impl Handler<CreateSession> for TabRegistryActor {
    type Result = MessageResult<CreateSession>;
    fn handle(&mut self, msg: CreateSession, _ctx: &mut Self::Context) -> Self::Result {
        let id = self.ids.next();
        let renderer = self.adapter.attach(id);
        let addr = SessionActor::new(
            id,
            self.label_len,
            self.backend.clone(),
            self.dialogs.clone(),
            renderer,
        )
        .start();
        self.tabs.push(Tab { id, addr });
        info!("新建会话 {}", id);

        if msg.auto_activate || self.active.is_none() {
            self.activate(Some(id));
        }
        MessageResult(Session::new(id))
    }
}

impl Handler<CloseSession> for TabRegistryActor {
    type Result = bool;
    fn handle(&mut self, msg: CloseSession, _ctx: &mut Self::Context) -> bool {
        let Some(pos) = self.tabs.iter().position(|tab| tab.id == msg.id) else {
            debug!("会话 {} 已关闭或不存在", msg.id);
            return false;
        };
        let tab = self.tabs.remove(pos);
        // 会话自己负责取消后台任务，这里不等待结果
        tab.addr.do_send(Close);
        info!("关闭会话 {}", msg.id);

        if self.active == Some(msg.id) {
            let next = self.tabs.last().map(|tab| tab.id);
            self.activate(next);
        }
        true
    }
}

impl Handler<SetActive> for TabRegistryActor {
    type Result = bool;
    fn handle(&mut self, msg: SetActive, _ctx: &mut Self::Context) -> bool {
        if self.active == Some(msg.id) {
            return true;
        }
        if !self.tabs.iter().any(|tab| tab.id == msg.id) {
            return false;
        }
        self.activate(Some(msg.id));
        true
    }
}

impl Handler<ActiveSession> for TabRegistryActor {
    type Result = Option<SessionId>;
    fn handle(&mut self, _msg: ActiveSession, _ctx: &mut Self::Context) -> Self::Result {
        self.active
    }
}

impl Handler<StartSession> for TabRegistryActor {
    type Result = ResponseFuture<Result<(), SessionError>>;
    fn handle(&mut self, msg: StartSession, _ctx: &mut Self::Context) -> Self::Result {
        let addr = self.session_addr(msg.id);
        Box::pin(async move { addr?.send(StartDownload { uri: msg.uri }).await? })
    }
}

impl Handler<CancelSession> for TabRegistryActor {
    type Result = ResponseFuture<Result<bool, SessionError>>;
    fn handle(&mut self, msg: CancelSession, _ctx: &mut Self::Context) -> Self::Result {
        let addr = self.session_addr(msg.id);
        Box::pin(async move { Ok(addr?.send(CancelDownload).await?) })
    }
}

impl Handler<PickSessionSource> for TabRegistryActor {
    type Result = ResponseFuture<Result<Option<String>, SessionError>>;
    fn handle(&mut self, msg: PickSessionSource, _ctx: &mut Self::Context) -> Self::Result {
        let addr = self.session_addr(msg.id);
        Box::pin(async move { Ok(addr?.send(PickSource).await?) })
    }
}

impl Handler<QuerySessionById> for TabRegistryActor {
    type Result = ResponseFuture<Result<SessionInfo, SessionError>>;
    fn handle(&mut self, msg: QuerySessionById, _ctx: &mut Self::Context) -> Self::Result {
        let addr = self.session_addr(msg.id);
        Box::pin(async move { Ok(addr?.send(QuerySession).await?) })
    }
}

impl Handler<ListSessions> for TabRegistryActor {
    type Result = ResponseFuture<Vec<TabInfo>>;
    fn handle(&mut self, _msg: ListSessions, _ctx: &mut Self::Context) -> Self::Result {
        let active = self.active;
        let queries: Vec<_> = self.tabs.iter().map(|tab| tab.addr.send(QuerySession)).collect();
        Box::pin(async move {
            join_all(queries)
                .await
                .into_iter()
                .filter_map(Result::ok)
                .map(|info| TabInfo {
                    active: active == Some(info.session.id),
                    info,
                })
                .collect()
        })
    }
}
