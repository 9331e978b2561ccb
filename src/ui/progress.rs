use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::core::session::SessionId;
use super::{RenderAdapter, Renderer, SessionView};

const BAR_TEMPLATE: &str = "{prefix:.bold} [{bar:30.cyan/blue}] {pos:>3}% {wide_msg}";

struct Slot {
    bar: ProgressBar,
    label: String,
}

/// 所有进度条及当前可见标签
#[derive(Default)]
struct Bars {
    active: Option<SessionId>,
    slots: HashMap<SessionId, Slot>,
}

impl Bars {
    fn refresh_prefix(&self, id: SessionId) {
        if let Some(slot) = self.slots.get(&id) {
            let marker = if self.active == Some(id) { '>' } else { ' ' };
            slot.bar.set_prefix(format!("{}{} {}", marker, id, slot.label));
        }
    }
}

/// 终端渲染适配器：每个会话一个进度条
#[derive(Clone)]
pub struct TerminalAdapter {
    multi: MultiProgress,
    bars: Rc<RefCell<Bars>>,
}

impl TerminalAdapter {
    pub fn new() -> Self {
        Self::with_multi(MultiProgress::new())
    }

    fn with_multi(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Rc::new(RefCell::new(Bars::default())),
        }
    }

    /// 在进度条上方打印一行，不打乱进度条
    pub fn println(&self, line: &str) {
        if self.multi.println(line).is_err() {
            println!("{}", line);
        }
    }
}

impl Default for TerminalAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderAdapter for TerminalAdapter {
    fn attach(&self, id: SessionId) -> Box<dyn Renderer> {
        let bar = self.multi.add(ProgressBar::new(100));
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        self.bars.borrow_mut().slots.insert(
            id,
            Slot {
                bar: bar.clone(),
                label: String::new(),
            },
        );
        Box::new(TerminalRenderer {
            id,
            bar,
            bars: self.bars.clone(),
        })
    }

    // 只重画新旧两个标签的前缀，已结束的进度条也会更新
    fn activate(&self, id: Option<SessionId>) {
        let mut bars = self.bars.borrow_mut();
        let previous = std::mem::replace(&mut bars.active, id);
        for changed in [previous, id].into_iter().flatten() {
            bars.refresh_prefix(changed);
        }
    }
}

struct TerminalRenderer {
    id: SessionId,
    bar: ProgressBar,
    bars: Rc<RefCell<Bars>>,
}

impl Renderer for TerminalRenderer {
    fn render(&mut self, view: &SessionView) {
        {
            let mut bars = self.bars.borrow_mut();
            if let Some(slot) = bars.slots.get_mut(&self.id) {
                slot.label = view.label.clone();
            }
            bars.refresh_prefix(self.id);
        }
        self.bar.set_position(view.percent.round() as u64);

        let message = match &view.raw {
            Some(raw) => raw.clone(),
            None if view.peers.is_empty() => view.summary.clone(),
            None => format!("{} | {} peers", view.summary, view.peers.len()),
        };
        if view.state.is_terminal() {
            self.bar.abandon_with_message(message);
        } else {
            self.bar.set_message(message);
        }
    }

    fn closed(&mut self) {
        self.bars.borrow_mut().slots.remove(&self.id);
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::{Session, SessionState};
    use crate::core::view::project;
    use indicatif::ProgressDrawTarget;

    fn hidden() -> TerminalAdapter {
        TerminalAdapter::with_multi(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    fn prefix(adapter: &TerminalAdapter, id: u64) -> String {
        adapter.bars.borrow().slots[&SessionId(id)].bar.prefix()
    }

    #[test]
    fn test_activation_redraws_marker_without_new_snapshot() {
        let adapter = hidden();
        let mut first = adapter.attach(SessionId(1));
        let mut second = adapter.attach(SessionId(2));

        let mut done = Session::new(SessionId(1));
        done.state = SessionState::Completed;
        first.render(&project(&done, None));
        second.render(&project(&Session::new(SessionId(2)), None));

        adapter.activate(Some(SessionId(1)));
        assert_eq!(prefix(&adapter, 1), ">1 Tab 1");
        assert_eq!(prefix(&adapter, 2), " 2 Tab 2");

        adapter.activate(Some(SessionId(2)));
        assert_eq!(prefix(&adapter, 1), " 1 Tab 1");
        assert_eq!(prefix(&adapter, 2), ">2 Tab 2");
    }

    #[test]
    fn test_closed_bar_is_forgotten() {
        let adapter = hidden();
        let mut renderer = adapter.attach(SessionId(7));
        renderer.closed();
        assert!(adapter.bars.borrow().slots.is_empty());
        // 关闭后切换到该标签不会出错
        adapter.activate(Some(SessionId(7)));
    }
}
