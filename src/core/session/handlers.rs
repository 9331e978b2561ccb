use actix::prelude::*;
use futures::channel::mpsc;
use futures::StreamExt;
use log::debug;

use crate::core::backend::{FileFilter, StreamSink};
use crate::core::error::SessionError;
use super::actor::{drive_start, SessionActor};
use super::messages::*;

impl Handler<StartDownload> for SessionActor {
    type Result = Result<(), SessionError>;
    fn handle(&mut self, msg: StartDownload, ctx: &mut Self::Context) -> Self::Result {
        let ticket = self.controller.begin_start(&msg.uri)?;
        actix::spawn(drive_start(
            ctx.address(),
            self.backend.clone(),
            self.dialogs.clone(),
            ticket,
        ));
        Ok(())
    }
}

impl Handler<CancelDownload> for SessionActor {
    type Result = bool;
    fn handle(&mut self, _msg: CancelDownload, ctx: &mut Self::Context) -> bool {
        self.cancel(ctx)
    }
}

impl Handler<PickSource> for SessionActor {
    type Result = ResponseActFuture<Self, Option<String>>;
    fn handle(&mut self, _msg: PickSource, _ctx: &mut Self::Context) -> Self::Result {
        let dialogs = self.dialogs.clone();
        Box::pin(
            async move { dialogs.pick_file(&[FileFilter::torrent()]).await }
                .into_actor(self)
                .map(|picked, act, _ctx| {
                    let path = picked?.to_string_lossy().into_owned();
                    if act.controller.set_uri(path.clone()) {
                        act.render();
                        Some(path)
                    } else {
                        None
                    }
                }),
        )
    }
}

impl Handler<Close> for SessionActor {
    type Result = ();
    fn handle(&mut self, _msg: Close, ctx: &mut Self::Context) {
        self.cancel(ctx);
        ctx.stop();
    }
}

impl Handler<QuerySession> for SessionActor {
    type Result = MessageResult<QuerySession>;
    fn handle(&mut self, _msg: QuerySession, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(SessionInfo {
            session: self.controller.session().clone(),
            view: self.controller.view(),
            pending: self.controller.is_starting(),
        })
    }
}

impl Handler<AbortStart> for SessionActor {
    type Result = ();
    fn handle(&mut self, msg: AbortStart, _ctx: &mut Self::Context) {
        self.controller.abort_start(msg.run);
    }
}

impl Handler<EnterResolving> for SessionActor {
    type Result = bool;
    fn handle(&mut self, msg: EnterResolving, _ctx: &mut Self::Context) -> bool {
        let entered = self.controller.enter_resolving(msg.run);
        if entered {
            self.render();
        }
        entered
    }
}

impl Handler<EnterDownloading> for SessionActor {
    type Result = Option<StreamSink>;
    fn handle(&mut self, msg: EnterDownloading, ctx: &mut Self::Context) -> Self::Result {
        let run = msg.run;
        if !self.controller.enter_downloading(run, msg.name) {
            return None;
        }

        // 每个会话同一时间只有一个订阅
        self.detach(ctx);
        let (tx, rx) = mpsc::unbounded();
        let handle = ctx.add_stream(rx.map(move |value| Inbound { run, value }));
        self.subscription = Some(handle);
        self.render();
        Some(StreamSink::new(self.controller.session().id, tx))
    }
}

impl Handler<FinishRun> for SessionActor {
    type Result = ();
    fn handle(&mut self, msg: FinishRun, ctx: &mut Self::Context) {
        if self.controller.finish(msg.run, msg.result) {
            self.detach(ctx);
            self.render();
        }
    }
}

impl StreamHandler<Inbound> for SessionActor {
    fn handle(&mut self, item: Inbound, _ctx: &mut Self::Context) {
        if self.controller.accept(item.run, &item.value) {
            self.render();
        }
    }

    // 后台关闭通道不代表会话结束，结果由 FinishRun 决定
    fn finished(&mut self, _ctx: &mut Self::Context) {
        debug!("[session {}] 推送通道已关闭", self.controller.session().id);
    }
}
