use log::{debug, info, warn};
use serde_json::Value;

use crate::core::error::SessionError;
use crate::core::snapshot::{normalize, StreamUpdate};
use crate::core::view::{project, SessionView};
use super::state::{Session, SessionId, SessionState};

/// 一次启动的凭据，异步流程的每一步都要带着 `run` 回到控制器
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartTicket {
    pub run: u64,
    pub uri: String,
}

/// 单会话状态机
///
/// 只负责状态转换与快照的接收/丢弃，不做任何 IO。异步步骤由
/// `SessionActor` 驱动，每一步都以 `run` 校验，过期的回调一律丢弃。
#[derive(Debug)]
pub struct SessionController {
    session: Session,
    run: u64,
    starting: bool,
    latest: Option<StreamUpdate>,
    high_water: u64,
    label_len: usize,
}

impl SessionController {
    pub fn new(id: SessionId, label_len: usize) -> Self {
        Self {
            session: Session::new(id),
            run: 0,
            starting: false,
            latest: None,
            high_water: 0,
            label_len,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn state(&self) -> &SessionState {
        &self.session.state
    }

    #[cfg(test)]
    pub fn run(&self) -> u64 {
        self.run
    }

    pub fn is_starting(&self) -> bool {
        self.starting
    }

    pub fn view(&self) -> SessionView {
        project(&self.session, self.latest.as_ref())
    }

    /// 校验输入并占用会话；会话已在运行（或正在选择目录）时拒绝
    pub fn begin_start(&mut self, uri: &str) -> Result<StartTicket, SessionError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(SessionError::Validation(
                "Magnet link or .torrent file path is required".to_string(),
            ));
        }
        if self.starting || self.session.state.is_active() {
            return Err(SessionError::AlreadyActive(self.session.state.clone()));
        }

        self.run += 1;
        self.starting = true;
        self.session.uri = uri.to_string();
        Ok(StartTicket {
            run: self.run,
            uri: self.session.uri.clone(),
        })
    }

    /// 用户取消了目录选择，状态保持不变
    pub fn abort_start(&mut self, run: u64) -> bool {
        if run != self.run || !self.starting {
            return false;
        }
        self.starting = false;
        info!("[session {}] 未选择输出目录，放弃启动", self.session.id);
        true
    }

    pub fn enter_resolving(&mut self, run: u64) -> bool {
        if run != self.run || !self.starting {
            debug!("[session {}] 丢弃过期的启动回调 (run {})", self.session.id, run);
            return false;
        }
        self.starting = false;
        self.latest = None;
        self.high_water = 0;
        self.session.state = SessionState::Resolving;
        info!("[session {}] 解析名称: {}", self.session.id, self.session.uri);
        true
    }

    /// 名称解析失败不影响流程，使用地址前缀作为显示名
    pub fn enter_downloading(&mut self, run: u64, name: Option<String>) -> bool {
        if run != self.run || self.session.state != SessionState::Resolving {
            debug!("[session {}] 丢弃过期的解析结果 (run {})", self.session.id, run);
            return false;
        }
        self.session.display_name = match name.map(|n| n.trim().to_string()) {
            Some(name) if !name.is_empty() => name,
            _ => self.fallback_label(),
        };
        self.session.state = SessionState::Downloading;
        info!("[session {}] 开始下载: {}", self.session.id, self.session.display_name);
        true
    }

    /// 只有 `Downloading` 状态下的当前 run 才接收推送
    pub fn accept(&mut self, run: u64, value: &Value) -> bool {
        if run != self.run || self.session.state != SessionState::Downloading {
            debug!("[session {}] 丢弃推送消息 (run {}, 状态 {})", self.session.id, run, self.session.state);
            return false;
        }

        let mut update = normalize(value);
        if let StreamUpdate::Snapshot(snapshot) = &mut update {
            if let Some(downloaded) = snapshot.progress.downloaded {
                if downloaded < self.high_water {
                    debug!(
                        "[session {}] 已下载字节回退 {} -> {}，保持 {}",
                        self.session.id, self.high_water, downloaded, self.high_water
                    );
                    snapshot.progress.downloaded = Some(self.high_water);
                } else {
                    self.high_water = downloaded;
                }
            }
        }
        self.latest = Some(update);
        true
    }

    pub fn finish(&mut self, run: u64, result: Result<(), String>) -> bool {
        if run != self.run || !self.session.state.is_active() {
            debug!("[session {}] 丢弃过期的任务结果 (run {})", self.session.id, run);
            return false;
        }
        self.session.state = match result {
            Ok(()) => {
                info!("[session {}] 下载完成: {}", self.session.id, self.session.display_name);
                SessionState::Completed
            }
            Err(msg) => {
                warn!("[session {}] 下载失败: {}", self.session.id, msg);
                SessionState::Failed(msg)
            }
        };
        true
    }

    /// 本地立即进入 `Cancelled`；返回需要通知后台停止的地址
    pub fn cancel(&mut self) -> Option<String> {
        if self.session.state.is_active() {
            self.session.state = SessionState::Cancelled;
            info!("[session {}] 已取消", self.session.id);
            return Some(self.session.uri.clone());
        }
        if self.starting {
            // 目录选择尚未返回，作废这次启动
            self.starting = false;
            self.run += 1;
        }
        None
    }

    /// 用选择的种子文件替换地址，会话运行中时不允许
    pub fn set_uri(&mut self, uri: String) -> bool {
        if self.starting || self.session.state.is_active() {
            return false;
        }
        self.session.uri = uri;
        true
    }

    fn fallback_label(&self) -> String {
        let label: String = self.session.uri.chars().take(self.label_len).collect();
        if label.is_empty() {
            format!("Tab {}", self.session.id)
        } else {
            label
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::{assert_err, assert_ok};

    const MAGNET: &str = "magnet:?xt=urn:btih:0123456789abcdef";

    fn controller() -> SessionController {
        SessionController::new(SessionId(1), 12)
    }

    fn downloading(ctl: &mut SessionController) -> u64 {
        let ticket = assert_ok!(ctl.begin_start(MAGNET));
        assert!(ctl.enter_resolving(ticket.run));
        assert!(ctl.enter_downloading(ticket.run, Some("ubuntu.iso".to_string())));
        ticket.run
    }

    fn progress(downloaded: u64, total: u64) -> Value {
        json!({ "bytes": { "downloaded": downloaded, "total": total }, "peers": {} })
    }

    #[test]
    fn test_blank_uri_is_rejected() {
        let mut ctl = controller();
        let err = assert_err!(ctl.begin_start("   "));
        assert!(matches!(err, SessionError::Validation(_)));
        assert_eq!(ctl.state(), &SessionState::Idle);
        assert_eq!(ctl.run(), 0);
    }

    #[test]
    fn test_abort_keeps_idle() {
        let mut ctl = controller();
        let ticket = assert_ok!(ctl.begin_start(MAGNET));
        assert!(ctl.is_starting());
        assert!(ctl.abort_start(ticket.run));
        assert!(!ctl.is_starting());
        assert_eq!(ctl.state(), &SessionState::Idle);
        assert!(!ctl.enter_resolving(ticket.run));
        // 可以再次启动
        assert_ok!(ctl.begin_start(MAGNET));
    }

    #[test]
    fn test_double_start_rejected() {
        let mut ctl = controller();
        assert_ok!(ctl.begin_start(MAGNET));
        assert!(matches!(ctl.begin_start(MAGNET), Err(SessionError::AlreadyActive(SessionState::Idle))));

        let mut ctl = controller();
        downloading(&mut ctl);
        assert!(matches!(
            ctl.begin_start(MAGNET),
            Err(SessionError::AlreadyActive(SessionState::Downloading))
        ));
    }

    #[test]
    fn test_resolution_failure_uses_fallback_label() {
        let mut ctl = controller();
        let ticket = assert_ok!(ctl.begin_start(MAGNET));
        assert!(ctl.enter_resolving(ticket.run));
        assert_eq!(ctl.state(), &SessionState::Resolving);
        assert!(ctl.enter_downloading(ticket.run, None));
        assert_eq!(ctl.state(), &SessionState::Downloading);
        assert_eq!(ctl.session().display_name, "magnet:?xt=u");
    }

    #[test]
    fn test_messages_only_accepted_while_downloading() {
        let mut ctl = controller();
        let ticket = assert_ok!(ctl.begin_start(MAGNET));
        assert!(!ctl.accept(ticket.run, &progress(1, 2)));
        assert!(ctl.enter_resolving(ticket.run));
        assert!(!ctl.accept(ticket.run, &progress(1, 2)));
        assert!(ctl.enter_downloading(ticket.run, None));
        assert!(ctl.accept(ticket.run, &progress(1, 2)));
        assert!(!ctl.accept(ticket.run + 1, &progress(2, 2)));
        assert_eq!(ctl.view().percent, 50.0);
    }

    #[test]
    fn test_cancel_discards_later_messages() {
        let mut ctl = controller();
        let run = downloading(&mut ctl);
        assert!(ctl.accept(run, &progress(100, 400)));
        assert_eq!(ctl.cancel().as_deref(), Some(MAGNET));
        assert_eq!(ctl.state(), &SessionState::Cancelled);

        let before = ctl.view();
        assert!(!ctl.accept(run, &progress(400, 400)));
        assert!(!ctl.finish(run, Ok(())));
        assert_eq!(ctl.view(), before);
        assert_eq!(ctl.cancel(), None);
    }

    #[test]
    fn test_cancel_while_picking_invalidates_run() {
        let mut ctl = controller();
        let ticket = assert_ok!(ctl.begin_start(MAGNET));
        assert_eq!(ctl.cancel(), None);
        assert!(!ctl.enter_resolving(ticket.run));
        assert_eq!(ctl.state(), &SessionState::Idle);
    }

    #[test]
    fn test_downloaded_never_decreases() {
        let mut ctl = controller();
        let run = downloading(&mut ctl);
        assert!(ctl.accept(run, &progress(300, 400)));
        assert!(ctl.accept(run, &progress(100, 400)));
        assert_eq!(ctl.view().percent, 75.0);
    }

    #[test]
    fn test_finish_and_restart() {
        let mut ctl = controller();
        let run = downloading(&mut ctl);
        assert!(ctl.finish(run, Err("no peers".to_string())));
        assert_eq!(ctl.state(), &SessionState::Failed("no peers".to_string()));
        assert_eq!(ctl.view().summary, "Download failed: no peers");

        let run = downloading(&mut ctl);
        assert!(ctl.finish(run, Ok(())));
        assert_eq!(ctl.state(), &SessionState::Completed);
        let view = ctl.view();
        assert!(view.peers.is_empty());
        assert_eq!(view.summary, "Download complete: ubuntu.iso");
    }

    #[test]
    fn test_set_uri_only_when_stable() {
        let mut ctl = controller();
        assert!(ctl.set_uri("/tmp/a.torrent".to_string()));
        assert_eq!(ctl.session().uri, "/tmp/a.torrent");
        downloading(&mut ctl);
        assert!(!ctl.set_uri("/tmp/b.torrent".to_string()));
        assert_eq!(ctl.session().uri, MAGNET);
    }
}
