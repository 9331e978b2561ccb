//! 视图投影：由会话状态与最新快照计算可渲染的数据，不产生任何副作用

use serde::Serialize;

use crate::core::session::{Session, SessionId, SessionState};
use crate::core::snapshot::{ByteProgress, PeerRecord, StreamUpdate};

pub const UNKNOWN: &str = "unknown";
pub const NOT_AVAILABLE: &str = "n/a";

/// 节点表的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerRow {
    pub address: String,
    pub client: String,
    pub origin: String,
    pub downloaded: String,
    pub uploaded: String,
}

/// 单个会话的渲染数据
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub label: String,
    pub title: String,
    pub state: SessionState,
    pub percent: f64,
    pub summary: String,
    pub peers: Vec<PeerRow>,
    pub raw: Option<String>,
}

pub fn project(session: &Session, latest: Option<&StreamUpdate>) -> SessionView {
    let mut view = SessionView {
        id: session.id,
        label: session.display_name.clone(),
        title: title_for(&session.state).to_string(),
        state: session.state.clone(),
        percent: 0.0,
        summary: String::new(),
        peers: Vec::new(),
        raw: None,
    };

    if let Some(StreamUpdate::Snapshot(snapshot)) = latest {
        view.percent = snapshot.progress.percent();
    }

    // 终止状态只显示一行结果，不显示节点表
    match &session.state {
        SessionState::Completed => {
            view.percent = 100.0;
            view.summary = format!("Download complete: {}", session.display_name);
            return view;
        }
        SessionState::Failed(msg) => {
            view.summary = format!("Download failed: {}", msg);
            return view;
        }
        SessionState::Cancelled => {
            view.summary = "Download cancelled".to_string();
            return view;
        }
        SessionState::Idle => return view,
        SessionState::Resolving => {
            view.summary = format!("Resolving {}", session.uri);
            return view;
        }
        SessionState::Downloading => {}
    }

    match latest {
        Some(StreamUpdate::Snapshot(snapshot)) => {
            view.summary = progress_summary(&snapshot.progress);
            view.peers = peer_rows(snapshot.peers.values());
        }
        Some(StreamUpdate::Raw(text)) => {
            view.summary = UNKNOWN.to_string();
            view.raw = Some(text.clone());
        }
        None => view.summary = "Waiting for first update".to_string(),
    }
    view
}

fn title_for(state: &SessionState) -> &'static str {
    match state {
        SessionState::Idle => "Ready",
        SessionState::Resolving | SessionState::Downloading => "Download in progress",
        SessionState::Completed => "Download finished",
        SessionState::Failed(_) => "Download failed",
        SessionState::Cancelled => "Download cancelled",
    }
}

/// 人类可读的字节进度
pub fn progress_summary(progress: &ByteProgress) -> String {
    let Some(downloaded) = progress.downloaded else {
        return UNKNOWN.to_string();
    };
    match progress.total {
        Some(total) if total > 0 => format!(
            "{} / {} ({:.1}%)",
            format_size(downloaded),
            format_size(total),
            progress.percent()
        ),
        _ => format!("{} / unknown size", format_size(downloaded)),
    }
}

/// 节点按地址字典序排列，保证每次渲染顺序一致
pub fn peer_rows<'a>(peers: impl IntoIterator<Item = &'a PeerRecord>) -> Vec<PeerRow> {
    let mut rows: Vec<PeerRow> = peers
        .into_iter()
        .map(|peer| PeerRow {
            address: peer.address.clone(),
            client: peer.client.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            origin: peer.origin.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            downloaded: format_counter(peer.downloaded_bytes),
            uploaded: format_counter(peer.uploaded_bytes),
        })
        .collect();
    rows.sort_by(|a, b| a.address.cmp(&b.address));
    rows
}

fn format_counter(bytes: Option<u64>) -> String {
    bytes.map(format_size).unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// 1024 进制；不足 10 个单位保留一位小数，否则取整
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;
    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    // 四舍五入后进位到 1024 时换用下一个单位
    if rounded(size) >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if rounded(size) < 10.0 {
        format!("{:.1} {}", size, UNITS[unit_index])
    } else {
        format!("{:.0} {}", size, UNITS[unit_index])
    }
}

/// 按显示精度取整：不足 10 保留一位小数
fn rounded(size: f64) -> f64 {
    let tenths = (size * 10.0).round() / 10.0;
    if tenths < 10.0 {
        tenths
    } else {
        size.round()
    }
}

/// 文本形式：标题、摘要与节点表
pub fn render_text(view: &SessionView) -> String {
    let mut out = format!("[{}] {} - {}\n{}\n", view.id, view.label, view.title, view.summary);
    if let Some(raw) = &view.raw {
        out.push_str(raw);
        out.push('\n');
    }
    if view.peers.is_empty() {
        return out;
    }

    let header = ["ADDRESS", "CLIENT", "ORIGIN", "DOWNLOADED", "UPLOADED"];
    let cells: Vec<[&str; 5]> = view
        .peers
        .iter()
        .map(|r| [r.address.as_str(), r.client.as_str(), r.origin.as_str(), r.downloaded.as_str(), r.uploaded.as_str()])
        .collect();
    let mut widths = header.map(str::len);
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    for row in std::iter::once(&header).chain(cells.iter()) {
        let line: Vec<String> = row
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect();
        out.push_str(line.join("  ").trim_end());
        out.push('\n');
    }
    out
}
