//! 测试替身：脚本化的后台、对话框以及记录渲染结果的适配器

use actix::prelude::*;
use async_trait::async_trait;
use futures::channel::oneshot;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::Duration;

use crate::core::backend::{Backend, Dialogs, FileFilter, StreamSink};
use crate::core::error::DownloadError;
use crate::core::session::{QuerySession, SessionActor, SessionId, SessionInfo};
use crate::core::view::SessionView;
use crate::ui::{RenderAdapter, Renderer};

pub const MAGNET: &str = "magnet:?xt=urn:btih:0123456789abcdef&dn=ubuntu.iso";

/// 后台替身：`start_task` 一直挂起，直到测试调用 `finish`
#[derive(Default)]
pub struct ScriptedBackend {
    pub fail_resolve: Cell<bool>,
    pub fail_stop: Cell<bool>,
    calls: RefCell<Vec<String>>,
    sink: RefCell<Option<StreamSink>>,
    finisher: RefCell<Option<oneshot::Sender<Result<(), DownloadError>>>>,
}

impl ScriptedBackend {
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.finisher.borrow().is_some()
    }

    pub fn push(&self, value: Value) -> bool {
        self.sink
            .borrow()
            .as_ref()
            .map(|sink| sink.send(value))
            .unwrap_or(false)
    }

    pub fn finish(&self, result: Result<(), DownloadError>) {
        if let Some(tx) = self.finisher.borrow_mut().take() {
            let _ = tx.send(result);
        }
    }
}

#[async_trait(?Send)]
impl Backend for ScriptedBackend {
    async fn resolve_name(&self, uri: &str) -> Result<String, DownloadError> {
        self.calls.borrow_mut().push(format!("resolve {}", uri));
        if self.fail_resolve.get() {
            Err(DownloadError::Unknown("no metadata".to_string()))
        } else {
            Ok("ubuntu.iso".to_string())
        }
    }

    async fn start_task(&self, uri: &str, output: &str, sink: StreamSink) -> Result<(), DownloadError> {
        self.calls.borrow_mut().push(format!("start {} {}", uri, output));
        let (tx, rx) = oneshot::channel();
        *self.sink.borrow_mut() = Some(sink);
        *self.finisher.borrow_mut() = Some(tx);
        rx.await.unwrap_or(Err(DownloadError::Cancelled))
    }

    async fn stop_task(&self, uri: &str) -> Result<(), DownloadError> {
        self.calls.borrow_mut().push(format!("stop {}", uri));
        if self.fail_stop.get() {
            Err("stop failed".into())
        } else {
            Ok(())
        }
    }
}

/// 对话框替身，`None` 表示用户取消
#[derive(Default)]
pub struct ScriptedDialogs {
    pub directory: RefCell<Option<PathBuf>>,
    pub file: RefCell<Option<PathBuf>>,
    pub picks: Cell<usize>,
}

impl ScriptedDialogs {
    pub fn with_directory(dir: impl AsRef<Path>) -> Self {
        Self {
            directory: RefCell::new(Some(dir.as_ref().to_path_buf())),
            ..Self::default()
        }
    }
}

#[async_trait(?Send)]
impl Dialogs for ScriptedDialogs {
    async fn pick_directory(&self) -> Option<PathBuf> {
        self.picks.set(self.picks.get() + 1);
        self.directory.borrow().clone()
    }

    async fn pick_file(&self, filters: &[FileFilter]) -> Option<PathBuf> {
        self.picks.set(self.picks.get() + 1);
        self.file
            .borrow()
            .clone()
            .filter(|path| filters.iter().any(|f| f.matches(path)))
    }
}

/// 记录所有渲染帧、关闭与激活事件
#[derive(Clone, Default)]
pub struct CapturingAdapter {
    pub frames: Rc<RefCell<Vec<SessionView>>>,
    pub closed: Rc<RefCell<Vec<SessionId>>>,
    pub activations: Rc<RefCell<Vec<Option<SessionId>>>>,
}

impl CapturingAdapter {
    pub fn last_frame(&self, id: SessionId) -> Option<SessionView> {
        self.frames.borrow().iter().rev().find(|v| v.id == id).cloned()
    }

    pub fn frame_count(&self, id: SessionId) -> usize {
        self.frames.borrow().iter().filter(|v| v.id == id).count()
    }

    pub fn is_closed(&self, id: SessionId) -> bool {
        self.closed.borrow().contains(&id)
    }
}

struct CapturingRenderer {
    id: SessionId,
    adapter: CapturingAdapter,
}

impl Renderer for CapturingRenderer {
    fn render(&mut self, view: &SessionView) {
        self.adapter.frames.borrow_mut().push(view.clone());
    }

    fn closed(&mut self) {
        self.adapter.closed.borrow_mut().push(self.id);
    }
}

impl RenderAdapter for CapturingAdapter {
    fn attach(&self, id: SessionId) -> Box<dyn Renderer> {
        Box::new(CapturingRenderer {
            id,
            adapter: self.clone(),
        })
    }

    fn activate(&self, id: Option<SessionId>) {
        self.activations.borrow_mut().push(id);
    }
}

/// 单会话测试环境，必须在 actix 系统内创建
pub struct Harness {
    pub backend: Rc<ScriptedBackend>,
    pub dialogs: Rc<ScriptedDialogs>,
    pub adapter: CapturingAdapter,
    pub addr: Addr<SessionActor>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_dialogs(ScriptedDialogs::with_directory("/downloads"))
    }

    pub fn with_dialogs(dialogs: ScriptedDialogs) -> Self {
        let backend = Rc::new(ScriptedBackend::default());
        let dialogs = Rc::new(dialogs);
        let adapter = CapturingAdapter::default();
        let addr = SessionActor::new(
            SessionId(1),
            12,
            backend.clone(),
            dialogs.clone(),
            adapter.attach(SessionId(1)),
        )
        .start();
        Self { backend, dialogs, adapter, addr }
    }

    pub async fn info(&self) -> SessionInfo {
        self.addr.send(QuerySession).await.expect("session actor alive")
    }

    pub async fn wait_for(&self, pred: impl Fn(&SessionInfo) -> bool) -> SessionInfo {
        for _ in 0..500 {
            let info = self.info().await;
            if pred(&info) {
                return info;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("session never reached the expected condition");
    }
}

pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    for _ in 0..500 {
        if cond() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

/// 让已排队的消息与分离任务跑完
pub async fn settle() {
    for _ in 0..10 {
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
