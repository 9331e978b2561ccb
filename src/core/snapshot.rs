//! 推送消息规范化：把后台推送的任意 JSON 值转换为 `Snapshot` 或原始文本
//!
//! 规范化对所有输入都是全函数，缺失或类型不符的字段记为“未知”，从不返回错误。

use serde_json::Value;
use std::collections::HashMap;

/// 字节进度，`None` 表示该字段缺失或无法识别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ByteProgress {
    pub downloaded: Option<u64>,
    pub total: Option<u64>,
}

impl ByteProgress {
    #[cfg(test)]
    pub fn new(downloaded: u64, total: u64) -> Self {
        Self {
            downloaded: Some(downloaded),
            total: Some(total),
        }
    }

    pub fn percent(&self) -> f64 {
        percent(self.downloaded.unwrap_or(0), self.total.unwrap_or(0))
    }
}

/// 百分比计算，`total == 0` 视为大小未知
pub fn percent(downloaded: u64, total: u64) -> f64 {
    if total > 0 {
        (downloaded as f64 / total as f64 * 100.0).clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// 单个节点的遥测信息；`origin` 不做枚举假设，按原样保留
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
    pub address: String,
    pub origin: Option<String>,
    pub client: Option<String>,
    pub downloaded_bytes: Option<u64>,
    pub uploaded_bytes: Option<u64>,
}

/// 一次完整的进度快照，下一次快照整体替换它
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Snapshot {
    pub progress: ByteProgress,
    pub peers: HashMap<String, PeerRecord>,
}

/// 规范化结果
#[derive(Debug, Clone, PartialEq)]
pub enum StreamUpdate {
    Snapshot(Snapshot),
    Raw(String),
}

pub fn normalize(value: &Value) -> StreamUpdate {
    match value {
        Value::Object(map) if map.contains_key("bytes") || map.contains_key("peers") => {
            StreamUpdate::Snapshot(Snapshot {
                progress: ByteProgress {
                    downloaded: read_u64(value.pointer("/bytes/downloaded")),
                    total: read_u64(value.pointer("/bytes/total")),
                },
                peers: read_peers(map.get("peers")),
            })
        }
        Value::String(text) => StreamUpdate::Raw(text.clone()),
        other => StreamUpdate::Raw(other.to_string()),
    }
}

fn read_u64(value: Option<&Value>) -> Option<u64> {
    let value = value?;
    if let Some(n) = value.as_u64() {
        return Some(n);
    }
    // 浮点计数向下取整，负数与 NaN 视为未知
    value
        .as_f64()
        .filter(|n| n.is_finite() && *n >= 0.0)
        .map(|n| n as u64)
}

fn read_text(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
}

fn read_peers(value: Option<&Value>) -> HashMap<String, PeerRecord> {
    let Some(Value::Object(peers)) = value else {
        return HashMap::new();
    };
    peers
        .iter()
        .map(|(address, peer)| {
            let record = PeerRecord {
                address: address.clone(),
                origin: read_text(peer.get("origin")),
                client: read_text(peer.get("client")),
                downloaded_bytes: read_u64(peer.pointer("/download/bytes_received")),
                uploaded_bytes: read_u64(peer.pointer("/upload/bytes_sent")),
            };
            (address.clone(), record)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snapshot(update: StreamUpdate) -> Snapshot {
        match update {
            StreamUpdate::Snapshot(s) => s,
            StreamUpdate::Raw(text) => panic!("expected snapshot, got raw {text:?}"),
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(123, 0), 0.0);
        assert_eq!(percent(500, 500), 100.0);
        assert_eq!(percent(750, 500), 100.0);
        assert_eq!(percent(250, 1000), 25.0);
        assert_eq!(ByteProgress::default().percent(), 0.0);
    }

    #[test]
    fn test_canonical_shape() {
        let value = json!({
            "bytes": { "downloaded": 512, "total": 2048 },
            "peers": {
                "10.0.0.1:6881": {
                    "origin": "tracker",
                    "client": "qBittorrent 4.6",
                    "download": { "bytes_received": 1024 },
                    "upload": { "bytes_sent": 16 }
                }
            }
        });
        let s = snapshot(normalize(&value));
        assert_eq!(s.progress, ByteProgress::new(512, 2048));
        let peer = &s.peers["10.0.0.1:6881"];
        assert_eq!(peer.origin.as_deref(), Some("tracker"));
        assert_eq!(peer.client.as_deref(), Some("qBittorrent 4.6"));
        assert_eq!(peer.downloaded_bytes, Some(1024));
        assert_eq!(peer.uploaded_bytes, Some(16));
    }

    #[test]
    fn test_partial_shape_uses_unknown_markers() {
        let value = json!({
            "bytes": { "downloaded": "lots" },
            "peers": {
                "a": { "origin": 5 },
                "b": "garbage"
            }
        });
        let s = snapshot(normalize(&value));
        assert_eq!(s.progress.downloaded, None);
        assert_eq!(s.progress.total, None);
        assert_eq!(s.peers.len(), 2);
        let b = &s.peers["b"];
        assert_eq!(b.origin, None);
        assert_eq!(b.client, None);
        assert_eq!(b.downloaded_bytes, None);
        assert_eq!(b.uploaded_bytes, None);
    }

    #[test]
    fn test_peers_only_and_bad_peer_map() {
        let s = snapshot(normalize(&json!({ "peers": {} })));
        assert_eq!(s.progress, ByteProgress::default());
        assert!(s.peers.is_empty());

        let s = snapshot(normalize(&json!({ "bytes": { "downloaded": 1.9, "total": -4 }, "peers": [1, 2] })));
        assert_eq!(s.progress.downloaded, Some(1));
        assert_eq!(s.progress.total, None);
        assert!(s.peers.is_empty());
    }

    #[test]
    fn test_non_snapshot_values_become_raw_text() {
        assert_eq!(
            normalize(&json!("Failed to start: boom")),
            StreamUpdate::Raw("Failed to start: boom".to_string())
        );
        assert_eq!(normalize(&Value::Null), StreamUpdate::Raw("null".to_string()));
        assert_eq!(normalize(&json!(42)), StreamUpdate::Raw("42".to_string()));
        assert_eq!(
            normalize(&json!({ "unrelated": true })),
            StreamUpdate::Raw("{\"unrelated\":true}".to_string())
        );
        assert!(matches!(normalize(&json!([1, "x"])), StreamUpdate::Raw(_)));
    }
}
