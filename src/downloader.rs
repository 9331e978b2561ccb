//! 基于 awc 的 HTTP 下载后台
//!
//! 实现 `Backend` 接口：磁力链接和种子文件只能解析名称，实际下载只支持 http(s)。
//! 进度以推送消息的标准结构发送，远端主机作为唯一的“节点”。

use async_trait::async_trait;
use chrono::Local;
use futures::StreamExt;
use log::{debug, info, log_enabled, warn, Level};
use serde::Serialize;
use std::cell::{Cell, RefCell};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::Notify;
use url::Url;

use crate::config::Config;
use crate::core::backend::{Backend, StreamSink};
use crate::core::error::{DownloadError, DownloadResult};
use crate::utils::validator::{classify, filename_from_url, magnet_display_name, metainfo_stem, UriKind};

const HTTP_ORIGIN: &str = "http";
const SNAPSHOT_DUMP_EVERY: usize = 10;

/// 推送消息结构
#[derive(Debug, Serialize)]
pub struct WireSnapshot {
    pub bytes: WireBytes,
    pub peers: BTreeMap<String, WirePeer>,
}

#[derive(Debug, Serialize)]
pub struct WireBytes {
    pub downloaded: u64,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct WirePeer {
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    pub download: WireDownload,
    pub upload: WireUpload,
}

#[derive(Debug, Serialize)]
pub struct WireDownload {
    pub bytes_received: u64,
}

#[derive(Debug, Serialize)]
pub struct WireUpload {
    pub bytes_sent: u64,
}

/// 单个远端的进度，用于生成推送消息
struct Remote {
    address: String,
    client: Option<String>,
    total: u64,
}

impl Remote {
    fn snapshot(&self, downloaded: u64) -> WireSnapshot {
        let peer = WirePeer {
            origin: HTTP_ORIGIN.to_string(),
            client: self.client.clone(),
            download: WireDownload { bytes_received: downloaded },
            upload: WireUpload { bytes_sent: 0 },
        };
        WireSnapshot {
            bytes: WireBytes { downloaded, total: self.total },
            peers: BTreeMap::from([(self.address.clone(), peer)]),
        }
    }
}

/// 单个任务的取消信号
#[derive(Default)]
struct CancelToken {
    cancelled: Cell<bool>,
    notify: Notify,
}

impl CancelToken {
    fn cancel(&self) {
        self.cancelled.set(true);
        // 没有等待者时保留许可，稍后的 cancelled() 立即返回
        self.notify.notify_one();
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }

    async fn cancelled(&self) {
        if !self.cancelled.get() {
            self.notify.notified().await;
        }
    }
}

pub struct HttpBackend {
    client: awc::Client,
    interval: Duration,
    /// 进行中的任务，值为取消信号
    active: RefCell<HashMap<String, Rc<CancelToken>>>,
}

impl HttpBackend {
    pub fn new(config: &Config) -> Self {
        let client = awc::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .finish();
        Self {
            client,
            interval: Duration::from_millis(config.snapshot_interval_ms),
            active: RefCell::new(HashMap::new()),
        }
    }

    /// 下载到 `path`；文件创建成功后置位 `created`，调用方据此清理残留文件
    async fn download(
        &self,
        uri: &str,
        path: &Path,
        sink: &StreamSink,
        created: &Cell<bool>,
    ) -> DownloadResult<()> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .map_err(|e| DownloadError::NetworkError(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DownloadError::ServerError(response.status().to_string()));
        }

        let remote = Remote {
            address: remote_address(uri),
            client: response
                .headers()
                .get("server")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
            total: response
                .headers()
                .get("content-length")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
                .unwrap_or(0),
        };

        // 不覆盖已有文件
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await?;
        created.set(true);
        info!("[http] {} -> {}", uri, path.display());

        let mut body = Box::pin(response);
        let mut downloaded = 0u64;
        let mut emitted = 0usize;
        let mut last_emit: Option<Instant> = None;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| DownloadError::NetworkError(e.to_string()))?;
            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;

            if last_emit.map_or(true, |t| t.elapsed() >= self.interval) {
                emit(sink, &remote, downloaded, &mut emitted);
                last_emit = Some(Instant::now());
            }
        }
        file.flush().await?;
        emit(sink, &remote, downloaded, &mut emitted);
        Ok(())
    }
}

/// 保存路径：地址中的文件名，取不到时按时间戳命名
fn target_path(uri: &str, output: &str) -> PathBuf {
    let file_name = filename_from_url(uri)
        .unwrap_or_else(|| format!("download_{}", Local::now().timestamp()));
    Path::new(output).join(file_name)
}

fn emit(sink: &StreamSink, remote: &Remote, downloaded: u64, emitted: &mut usize) {
    let snapshot = remote.snapshot(downloaded);
    // 每推送 10 次在调试日志中记录一次快照
    *emitted = emitted.wrapping_add(1);
    if *emitted % SNAPSHOT_DUMP_EVERY == 0 && log_enabled!(Level::Debug) {
        debug!("[http] 会话 {} 快照: {:?}", sink.session(), snapshot);
    }

    let value = serde_json::to_value(&snapshot)
        .unwrap_or_else(|e| serde_json::Value::String(e.to_string()));
    if !sink.send(value) {
        debug!("[http] 会话 {} 已解除订阅", sink.session());
    }
}

fn remote_address(uri: &str) -> String {
    Url::parse(uri)
        .ok()
        .and_then(|url| {
            let host = url.host_str()?.to_string();
            Some(match url.port_or_known_default() {
                Some(port) => format!("{}:{}", host, port),
                None => host,
            })
        })
        .unwrap_or_else(|| uri.to_string())
}

#[async_trait(?Send)]
impl Backend for HttpBackend {
    async fn resolve_name(&self, uri: &str) -> DownloadResult<String> {
        let name = match classify(uri) {
            UriKind::Magnet => magnet_display_name(uri),
            UriKind::Http => filename_from_url(uri),
            UriKind::MetainfoFile => metainfo_stem(uri),
            UriKind::Unknown => None,
        };
        name.ok_or_else(|| DownloadError::InvalidUrl(uri.to_string()))
    }

    async fn start_task(&self, uri: &str, output: &str, sink: StreamSink) -> DownloadResult<()> {
        match classify(uri) {
            UriKind::Http => {}
            UriKind::Magnet => return Err(DownloadError::UnsupportedProtocol("magnet".to_string())),
            UriKind::MetainfoFile => return Err(DownloadError::UnsupportedProtocol("torrent".to_string())),
            UriKind::Unknown => return Err(DownloadError::InvalidUrl(uri.to_string())),
        }

        // 同一个地址只允许一个任务
        let token = match self.active.borrow_mut().entry(uri.to_string()) {
            Entry::Occupied(_) => return Err(DownloadError::AlreadyInProgress(uri.to_string())),
            Entry::Vacant(entry) => entry.insert(Rc::new(CancelToken::default())).clone(),
        };

        let path = target_path(uri, output);
        let created = Cell::new(false);
        // 停止信号先到时丢弃下载 future，连接与文件句柄随之释放
        let result = tokio::select! {
            result = self.download(uri, &path, &sink, &created) => result,
            _ = token.cancelled() => Err(DownloadError::Cancelled),
        };
        let result = match result {
            Err(_) if token.is_cancelled() => Err(DownloadError::Cancelled),
            other => other,
        };

        // 未完成的文件不保留，重新开始时可以再次创建
        if result.is_err() && created.get() {
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("[http] 无法删除未完成的文件 {}: {}", path.display(), e);
            }
        }

        // stop_task 可能已经移除了令牌，甚至同一地址已经重新启动
        let mut active = self.active.borrow_mut();
        if active.get(uri).map_or(false, |current| Rc::ptr_eq(current, &token)) {
            active.remove(uri);
        }
        result
    }

    async fn stop_task(&self, uri: &str) -> DownloadResult<()> {
        if let Some(token) = self.active.borrow_mut().remove(uri) {
            token.cancel();
            info!("[http] 停止下载: {}", uri);
        }
        Ok(())
    }
}
