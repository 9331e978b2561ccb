//! UI: 渲染适配器接口与终端实现
//!
//! 视图数据由 `core::view` 纯函数计算，这里只负责把它画出来。
//! 每个会话拿到自己的 `Renderer` 句柄，不通过全局查找定位界面元素。

mod progress;

pub use progress::TerminalAdapter;
pub use crate::core::view::{render_text, PeerRow, SessionView};

use crate::core::session::SessionId;

/// 单个会话的渲染句柄
pub trait Renderer {
    fn render(&mut self, view: &SessionView);

    /// 会话关闭时调用一次
    fn closed(&mut self) {}
}

/// 为新会话创建渲染句柄，并接收可见标签的切换
pub trait RenderAdapter {
    fn attach(&self, id: SessionId) -> Box<dyn Renderer>;

    fn activate(&self, _id: Option<SessionId>) {}
}

pub fn print_error(message: &str) {
    eprintln!("✗ {}", message);
}
