use actix::prelude::*;
use log::{debug, warn};
use std::rc::Rc;

use crate::core::backend::{Backend, Dialogs};
use crate::ui::Renderer;
use super::controller::{SessionController, StartTicket};
use super::messages::{AbortStart, EnterDownloading, EnterResolving, FinishRun};
use super::state::SessionId;

/// 单会话 Actor
///
/// 状态只在 handler 中修改；后台调用放在 `actix::spawn` 的任务里，
/// 通过带 run 编号的消息把结果送回来。
pub struct SessionActor {
    pub(super) controller: SessionController,
    pub(super) subscription: Option<SpawnHandle>,
    pub(super) backend: Rc<dyn Backend>,
    pub(super) dialogs: Rc<dyn Dialogs>,
    pub(super) renderer: Box<dyn Renderer>,
}

impl Actor for SessionActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        self.render();
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        debug!("[session {}] actor 已停止", self.controller.session().id);
        self.renderer.closed();
    }
}

impl SessionActor {
    pub fn new(
        id: SessionId,
        label_len: usize,
        backend: Rc<dyn Backend>,
        dialogs: Rc<dyn Dialogs>,
        renderer: Box<dyn Renderer>,
    ) -> Self {
        Self {
            controller: SessionController::new(id, label_len),
            subscription: None,
            backend,
            dialogs,
            renderer,
        }
    }

    pub(super) fn render(&mut self) {
        let view = self.controller.view();
        self.renderer.render(&view);
    }

    /// 解除推送订阅，之后通道里剩余的消息不会再到达 handler
    pub(super) fn detach(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.subscription.take() {
            ctx.cancel_future(handle);
        }
    }

    /// 本地取消立即生效；后台停止请求是分离任务，结果有意丢弃
    pub(super) fn cancel(&mut self, ctx: &mut Context<Self>) -> bool {
        let Some(uri) = self.controller.cancel() else {
            return false;
        };
        self.detach(ctx);
        self.render();

        let backend = self.backend.clone();
        let id = self.controller.session().id;
        actix::spawn(async move {
            if let Err(e) = backend.stop_task(&uri).await {
                debug!("[session {}] 停止请求失败（已忽略）: {}", id, e);
            }
        });
        true
    }
}

/// 启动流程：选择目录 → 解析名称 → 启动任务 → 回报结果
pub(super) async fn drive_start(
    addr: Addr<SessionActor>,
    backend: Rc<dyn Backend>,
    dialogs: Rc<dyn Dialogs>,
    ticket: StartTicket,
) {
    let StartTicket { run, uri } = ticket;

    let Some(output) = dialogs.pick_directory().await else {
        addr.do_send(AbortStart { run });
        return;
    };

    if !matches!(addr.send(EnterResolving { run }).await, Ok(true)) {
        return;
    }

    let name = match backend.resolve_name(&uri).await {
        Ok(name) => Some(name),
        Err(e) => {
            warn!("名称解析失败，使用默认标签: {} ({})", uri, e);
            None
        }
    };

    let sink = match addr.send(EnterDownloading { run, name }).await {
        Ok(Some(sink)) => sink,
        _ => return,
    };

    let output = output.to_string_lossy().into_owned();
    let result = backend
        .start_task(&uri, &output, sink)
        .await
        .map_err(|e| e.to_string());
    addr.do_send(FinishRun { run, result });
}
